//! Shared state threaded through the build steps.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cancel::Cancellation;
use crate::config::BuildSettings;
use crate::driver::{Driver, Storage};
use crate::error::BuildError;
use crate::runner::StepAction;
use crate::ssh::SshKeyPair;
use crate::ui::Ui;

/// Generated-data key for the build server identifier.
pub const SERVER_UUID_KEY: &str = "ServerUUID";
/// Generated-data key for the build server title.
pub const SERVER_TITLE_KEY: &str = "ServerTitle";
/// Generated-data key for the build server address.
pub const SERVER_IP_KEY: &str = "ServerIP";

/// Facts about the build server recorded once it exists.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerFacts {
    /// Provider identifier; always present so cleanup can find the server.
    pub uuid: String,
    /// Server title, empty when creation timed out before it was known.
    pub title: String,
    /// Public IPv4 address used for provisioning.
    pub address: Option<String>,
}

/// Key/value outputs exposed on the artifact.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GeneratedData(BTreeMap<String, String>);

impl GeneratedData {
    /// Records `value` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value recorded under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// State owned by the runner and lent to one step at a time.
pub struct BuildContext {
    /// Validated build settings.
    pub settings: Arc<BuildSettings>,
    /// Driver used while steps run; observes cancellation.
    pub driver: Arc<dyn Driver>,
    /// Driver used by cleanups so teardown survives cancellation.
    pub cleanup_driver: Arc<dyn Driver>,
    /// Progress sink.
    pub ui: Arc<dyn Ui>,
    /// Cancellation observed between steps and inside waits.
    pub cancellation: Cancellation,
    /// Temporary key pair for the build server.
    pub ssh_keys: Option<SshKeyPair>,
    /// Build server facts.
    pub server: Option<ServerFacts>,
    /// Clone storages awaiting deletion, in creation order.
    pub clone_storage_ids: Vec<String>,
    /// Templates produced so far.
    pub templates: Vec<Storage>,
    /// Templates the provider created but never reported online.
    pub stranded_template_ids: Vec<String>,
    /// Outputs exposed on the artifact.
    pub generated: GeneratedData,
    /// Error that halted the build.
    pub error: Option<BuildError>,
}

impl BuildContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(
        settings: Arc<BuildSettings>,
        driver: Arc<dyn Driver>,
        ui: Arc<dyn Ui>,
        cancellation: Cancellation,
    ) -> Self {
        Self {
            settings,
            cleanup_driver: Arc::clone(&driver),
            driver,
            ui,
            cancellation,
            ssh_keys: None,
            server: None,
            clone_storage_ids: Vec::new(),
            templates: Vec::new(),
            stranded_template_ids: Vec::new(),
            generated: GeneratedData::default(),
            error: None,
        }
    }

    /// Uses a separate driver for cleanups.
    #[must_use]
    pub fn with_cleanup_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.cleanup_driver = driver;
        self
    }

    /// Records `err` as the halting error, reports it, and returns
    /// [`StepAction::Halt`]. The first recorded error wins.
    pub fn halt(&mut self, err: impl Into<BuildError>) -> StepAction {
        let err = err.into();
        self.ui.error(&err.to_string());
        if self.error.is_none() {
            self.error = Some(err);
        }
        StepAction::Halt
    }

    /// Reports whether a step has halted the build.
    #[must_use]
    pub const fn halted(&self) -> bool {
        self.error.is_some()
    }
}
