//! Step-level behaviour against the scripted driver.

use std::sync::Arc;

use camino::Utf8PathBuf;
use kiln::context::{SERVER_IP_KEY, SERVER_UUID_KEY};
use kiln::steps::{
    StepCreateServer, StepCreateSshKey, StepCreateTemplate, StepProvision, StepStopServer,
};
use kiln::test_support::{
    DriverCall, DriverOp, RecordingUi, ScriptedDriver, ScriptedProvisioner, StaticKeyGenerator,
    build_settings,
};
use kiln::{
    BuildContext, BuildError, BuildSettings, Cancellation, CreateServerRequest, Driver,
    DriverError, NetworkInterface, ResourceKind, ServerFacts, ServerState, Step, StepAction,
    SshKeyPair,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Harness {
    driver: ScriptedDriver,
    ui: RecordingUi,
}

impl Harness {
    fn context(&self, settings: BuildSettings) -> BuildContext {
        BuildContext::new(
            Arc::new(settings),
            Arc::new(self.driver.clone()),
            Arc::new(self.ui.clone()),
            Cancellation::never(),
        )
    }

    /// Creates a server directly through the driver and records it the way
    /// the create step would.
    async fn with_server(&self, ctx: &mut BuildContext) -> String {
        let request = CreateServerRequest {
            source_storage: String::from("S1"),
            zone: ctx.settings.zone.clone(),
            prefix: ctx.settings.template_prefix.clone(),
            login_user: String::from("root"),
            ssh_public_key: None,
            storage_size: 25,
            networking: vec![NetworkInterface::public_ipv4()],
        };
        let server = self
            .driver
            .create_server(&request)
            .await
            .unwrap_or_else(|err| panic!("create server: {err}"));
        ctx.server = Some(ServerFacts {
            uuid: server.uuid.clone(),
            title: server.title.clone(),
            address: server.public_ipv4().map(str::to_owned),
        });
        server.uuid
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        driver: ScriptedDriver::new(),
        ui: RecordingUi::new(),
    }
}

fn keys() -> SshKeyPair {
    SshKeyPair {
        public_key: String::from("ssh-ed25519 AAAA kiln-test"),
        private_key: String::from("private"),
    }
}

fn settings_with_clones(zones: &[&str]) -> BuildSettings {
    let mut settings = build_settings();
    settings.clone_zones = zones.iter().map(|zone| (*zone).to_owned()).collect();
    settings
}

#[rstest]
#[tokio::test]
async fn failed_second_clone_deletes_only_the_first(harness: Harness) {
    let mut ctx = harness.context(settings_with_clones(&["z2", "z3"]));
    harness.with_server(&mut ctx).await;
    harness.driver.fail_nth(
        DriverOp::CloneStorage,
        2,
        DriverError::CreateFailed {
            resource: ResourceKind::Storage,
            message: String::from("STORAGE_RESOURCES_UNAVAILABLE"),
        },
    );
    let step = StepCreateTemplate;

    let action = step.run(&mut ctx).await;
    assert_eq!(action, StepAction::Halt);
    assert_eq!(ctx.clone_storage_ids, vec![String::from("clone-3")]);

    let errors = step.cleanup(&mut ctx).await;
    assert!(errors.is_empty(), "cleanup errors: {errors:?}");

    let deletes: Vec<DriverCall> = harness
        .driver
        .calls()
        .into_iter()
        .filter(|call| call.op() == DriverOp::DeleteTemplate)
        .collect();
    assert_eq!(deletes, vec![DriverCall::DeleteTemplate(String::from("clone-3"))]);
    assert_eq!(harness.driver.count(DriverOp::Templatize), 0);
    assert!(
        harness.driver.storage("disk-2").is_some(),
        "boot disk must be left alone"
    );
}

#[rstest]
#[tokio::test]
async fn templates_every_zone_and_keeps_them_on_success(harness: Harness) {
    let mut ctx = harness.context(settings_with_clones(&["de-fra1", "uk-lon1"]));
    harness.with_server(&mut ctx).await;
    let step = StepCreateTemplate;

    assert_eq!(step.run(&mut ctx).await, StepAction::Continue);
    let zones: Vec<&str> = ctx.templates.iter().map(|t| t.zone.as_str()).collect();
    assert_eq!(zones, vec!["z1", "de-fra1", "uk-lon1"]);
    let titles: Vec<&str> = ctx.templates.iter().map(|t| t.title.as_str()).collect();
    let first = titles.first().copied().unwrap_or_default();
    assert!(
        titles.iter().all(|title| title.starts_with("img-") && *title == first),
        "templates share one title: {titles:?}"
    );

    let errors = step.cleanup(&mut ctx).await;
    assert!(errors.is_empty(), "cleanup errors: {errors:?}");
    for template in &ctx.templates {
        assert!(harness.driver.storage(&template.uuid).is_some());
    }
    for clone in &ctx.clone_storage_ids {
        assert!(harness.driver.storage(clone).is_none(), "clone {clone} left behind");
    }
}

#[rstest]
#[tokio::test]
async fn halted_template_step_deletes_partial_templates(harness: Harness) {
    let mut ctx = harness.context(settings_with_clones(&["de-fra1"]));
    harness.with_server(&mut ctx).await;
    harness.driver.fail_nth(
        DriverOp::Templatize,
        2,
        DriverError::Provider {
            message: String::from("connection reset"),
        },
    );
    let step = StepCreateTemplate;

    assert_eq!(step.run(&mut ctx).await, StepAction::Halt);
    assert_eq!(ctx.templates.len(), 1);
    let partial = ctx
        .templates
        .first()
        .map(|template| template.uuid.clone())
        .unwrap_or_default();

    let errors = step.cleanup(&mut ctx).await;
    assert!(errors.is_empty(), "cleanup errors: {errors:?}");
    assert!(
        harness.driver.storage(&partial).is_none(),
        "template {partial} left behind"
    );
    assert_eq!(
        harness.driver.count(DriverOp::DeleteTemplate),
        2,
        "the clone and the partial template are deleted"
    );
}

#[rstest]
#[tokio::test]
async fn template_left_unsettled_is_deleted_on_halt(harness: Harness) {
    let mut ctx = harness.context(build_settings());
    harness.with_server(&mut ctx).await;
    harness.driver.fail(
        DriverOp::Templatize,
        DriverError::Unsettled {
            resource: ResourceKind::Template,
            id: String::from("template-9"),
            message: String::from("provider error: INTERNAL_ERROR (HTTP 500)"),
        },
    );
    let step = StepCreateTemplate;

    assert_eq!(step.run(&mut ctx).await, StepAction::Halt);
    assert!(ctx.templates.is_empty());
    assert_eq!(ctx.stranded_template_ids, vec![String::from("template-9")]);
    assert!(harness.driver.storage("template-9").is_some());

    let errors = step.cleanup(&mut ctx).await;
    assert!(errors.is_empty(), "cleanup errors: {errors:?}");
    assert!(harness.driver.storage("template-9").is_none());
}

#[rstest]
#[case::ssh_key(|| Box::new(StepCreateSshKey::new(Arc::new(StaticKeyGenerator::default()))) as Box<dyn Step>)]
#[case::create_server(|| Box::new(StepCreateServer) as Box<dyn Step>)]
#[case::provision(|| Box::new(StepProvision::new(Arc::new(ScriptedProvisioner::succeeding()))) as Box<dyn Step>)]
#[case::stop_server(|| Box::new(StepStopServer) as Box<dyn Step>)]
#[case::create_template(|| Box::new(StepCreateTemplate) as Box<dyn Step>)]
#[tokio::test]
async fn cleanup_without_resources_makes_no_driver_calls(
    harness: Harness,
    #[case] make_step: fn() -> Box<dyn Step>,
) {
    let mut ctx = harness.context(build_settings());
    let step = make_step();

    let errors = step.cleanup(&mut ctx).await;

    assert!(errors.is_empty(), "cleanup errors: {errors:?}");
    assert!(harness.driver.calls().is_empty(), "calls: {:?}", harness.driver.calls());
}

#[rstest]
#[tokio::test]
async fn create_server_records_facts_and_cleans_up(harness: Harness) {
    let mut ctx = harness.context(build_settings());
    ctx.ssh_keys = Some(keys());
    let step = StepCreateServer;

    assert_eq!(step.run(&mut ctx).await, StepAction::Continue);
    assert_eq!(ctx.generated.get(SERVER_UUID_KEY), Some("server-1"));
    assert_eq!(ctx.generated.get(SERVER_IP_KEY), Some("127.0.0.1"));

    let errors = step.cleanup(&mut ctx).await;
    assert!(errors.is_empty(), "cleanup errors: {errors:?}");
    assert_eq!(
        harness.driver.ops(),
        vec![
            DriverOp::LocateSourceStorage,
            DriverOp::CreateServer,
            DriverOp::StopServer,
            DriverOp::DeleteServer,
        ]
    );
    assert!(harness.driver.live_servers().is_empty());
}

#[rstest]
#[tokio::test]
async fn create_server_timeout_still_cleans_up_the_server(harness: Harness) {
    harness.driver.fail(
        DriverOp::CreateServer,
        DriverError::StateTimeout {
            resource: ResourceKind::Server,
            id: String::from("server-9"),
            target: String::from("reach started"),
            last_state: String::from("maintenance"),
        },
    );
    let mut ctx = harness.context(build_settings());
    ctx.ssh_keys = Some(keys());
    let step = StepCreateServer;

    assert_eq!(step.run(&mut ctx).await, StepAction::Halt);
    assert_eq!(
        ctx.server.as_ref().map(|server| server.uuid.as_str()),
        Some("server-9")
    );

    step.cleanup(&mut ctx).await;
    assert!(harness.driver.live_servers().is_empty());
}

#[rstest]
#[tokio::test]
async fn create_server_poll_failure_still_cleans_up_the_server(harness: Harness) {
    harness.driver.fail(
        DriverOp::CreateServer,
        DriverError::Unsettled {
            resource: ResourceKind::Server,
            id: String::from("server-9"),
            message: String::from("provider error: SERVICE_UNAVAILABLE: try again (HTTP 503)"),
        },
    );
    let mut ctx = harness.context(build_settings());
    ctx.ssh_keys = Some(keys());
    let step = StepCreateServer;

    assert_eq!(step.run(&mut ctx).await, StepAction::Halt);
    assert_eq!(
        ctx.server.as_ref().map(|server| server.uuid.as_str()),
        Some("server-9")
    );

    let errors = step.cleanup(&mut ctx).await;
    assert!(errors.is_empty(), "cleanup errors: {errors:?}");
    let calls = harness.driver.calls();
    assert!(calls.contains(&DriverCall::StopServer(String::from("server-9"))));
    assert!(calls.contains(&DriverCall::DeleteServer(String::from("server-9"))));
    assert!(harness.driver.live_servers().is_empty());
}

#[rstest]
#[tokio::test]
async fn create_server_without_public_address_halts(harness: Harness) {
    let driver = harness.driver.clone().without_public_address();
    let mut ctx = harness.context(build_settings());
    ctx.ssh_keys = Some(keys());
    let step = StepCreateServer;

    assert_eq!(step.run(&mut ctx).await, StepAction::Halt);
    assert!(
        matches!(
            ctx.error,
            Some(BuildError::Driver(DriverError::NotFound {
                resource: ResourceKind::Server,
                ..
            }))
        ),
        "unexpected error: {:?}",
        ctx.error
    );

    step.cleanup(&mut ctx).await;
    assert!(driver.live_servers().is_empty());
}

#[rstest]
#[tokio::test]
async fn create_server_requires_keys(harness: Harness) {
    let mut ctx = harness.context(build_settings());

    assert_eq!(StepCreateServer.run(&mut ctx).await, StepAction::Halt);
    assert!(matches!(ctx.error, Some(BuildError::MissingState { .. })));
    assert!(harness.driver.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn stop_step_stops_the_server(harness: Harness) {
    let mut ctx = harness.context(build_settings());
    let id = harness.with_server(&mut ctx).await;

    assert_eq!(StepStopServer.run(&mut ctx).await, StepAction::Continue);
    assert_eq!(harness.driver.server_state(&id), Some(ServerState::Stopped));
}

#[rstest]
#[tokio::test]
async fn key_step_writes_debug_key(harness: Harness) {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("temp dir: {err}"));
    let path = Utf8PathBuf::from_path_buf(dir.path().join("keys").join("debug"))
        .unwrap_or_else(|path| panic!("non-utf8 temp path: {}", path.display()));
    let mut settings = build_settings();
    settings.debug_key_path = Some(path.clone());
    let mut ctx = harness.context(settings);
    let step = StepCreateSshKey::new(Arc::new(StaticKeyGenerator::default()));

    assert_eq!(step.run(&mut ctx).await, StepAction::Continue);

    let written = std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("read key: {err}"));
    assert_eq!(
        Some(written.as_str()),
        ctx.ssh_keys.as_ref().map(|keys| keys.private_key.as_str())
    );
}

#[rstest]
#[tokio::test]
async fn key_step_failure_halts_with_key_error(harness: Harness) {
    let mut ctx = harness.context(build_settings());
    let step = StepCreateSshKey::new(Arc::new(StaticKeyGenerator::failing("ssh-keygen missing")));

    assert_eq!(step.run(&mut ctx).await, StepAction::Halt);
    assert!(
        matches!(ctx.error, Some(BuildError::KeyGeneration { ref message }) if message.contains("ssh-keygen missing")),
        "unexpected error: {:?}",
        ctx.error
    );
}
