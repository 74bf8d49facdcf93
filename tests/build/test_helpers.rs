//! Shared fixtures for build BDD scenarios.

use std::sync::Arc;

use kiln::test_support::{
    FakeSshEndpoint, RecordingUi, ScriptedDriver, ScriptedProvisioner, StaticKeyGenerator,
    build_settings,
};
use kiln::{BuildError, BuildSettings, Storage};
use rstest::fixture;

/// Everything a build scenario arranges, runs, and inspects.
#[derive(Clone, Debug)]
pub struct BuildWorld {
    pub settings: BuildSettings,
    pub driver: ScriptedDriver,
    pub provisioner: ScriptedProvisioner,
    pub keys: StaticKeyGenerator,
    pub ui: RecordingUi,
    pub outcome: Option<Result<Vec<Storage>, BuildError>>,
    _ssh: Arc<FakeSshEndpoint>,
}

#[fixture]
pub fn build_world() -> BuildWorld {
    let ssh = FakeSshEndpoint::bind();
    let mut settings = build_settings();
    settings.ssh_port = ssh.port();
    BuildWorld {
        settings,
        driver: ScriptedDriver::new(),
        provisioner: ScriptedProvisioner::succeeding(),
        keys: StaticKeyGenerator::default(),
        ui: RecordingUi::new(),
        outcome: None,
        _ssh: Arc::new(ssh),
    }
}
