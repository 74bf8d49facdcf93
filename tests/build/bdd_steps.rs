//! BDD step definitions for the `kiln build` pipeline.

use std::sync::Arc;

use kiln::test_support::{DriverCall, DriverOp, ScriptedProvisioner};
use kiln::{BuildError, Builder, Cancellation, DriverError, StorageSelector};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::BuildWorld;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a source storage \"{source}\" in zone \"{zone}\" with prefix \"{prefix}\"")]
fn source_storage(
    mut build_world: BuildWorld,
    source: String,
    zone: String,
    prefix: String,
) -> BuildWorld {
    build_world.settings.source = StorageSelector::by_uuid(source);
    build_world.settings.zone = zone;
    build_world.settings.template_prefix = prefix;
    build_world
}

#[given("no source storage is selected")]
fn no_source_storage(mut build_world: BuildWorld) -> BuildWorld {
    build_world.settings.source = StorageSelector::default();
    build_world
}

#[given("provisioning fails")]
fn provisioning_fails(mut build_world: BuildWorld) -> BuildWorld {
    build_world.provisioner = ScriptedProvisioner::failing("apt-get exited with status 100");
    build_world
}

#[when("I run the build")]
fn run_build(mut build_world: BuildWorld) -> Result<BuildWorld, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let builder = Builder::new(
        build_world.settings.clone(),
        Arc::new(build_world.driver.clone()),
        Arc::new(build_world.keys.clone()),
        Arc::new(build_world.provisioner.clone()),
    )
    .with_ui(Arc::new(build_world.ui.clone()));

    let result = runtime.block_on(async move { builder.run(Cancellation::never()).await });
    build_world.outcome = Some(result.map(|artifact| artifact.templates().to_vec()));
    Ok(build_world)
}

fn failure(build_world: &BuildWorld) -> Result<&BuildError, StepError> {
    match &build_world.outcome {
        Some(Err(err)) => Ok(err),
        Some(Ok(templates)) => Err(StepError::Assertion(format!(
            "expected failure, got {} template(s)",
            templates.len()
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the build produces one template titled with prefix \"{prefix}\"")]
fn one_template(build_world: &BuildWorld, prefix: String) -> Result<(), StepError> {
    let templates = match &build_world.outcome {
        Some(Ok(templates)) => templates,
        Some(Err(err)) => {
            return Err(StepError::Assertion(format!(
                "expected success, got failure: {err}"
            )));
        }
        None => return Err(StepError::Assertion(String::from("missing outcome"))),
    };
    let [template] = templates.as_slice() else {
        return Err(StepError::Assertion(format!(
            "expected one template, got {}",
            templates.len()
        )));
    };
    if !template.title.starts_with(&format!("{prefix}-")) {
        return Err(StepError::Assertion(format!(
            "template title {:?} does not start with {prefix}-",
            template.title
        )));
    }
    if build_world.driver.storage(&template.uuid).is_none() {
        return Err(StepError::Assertion(String::from(
            "template should survive a completed build",
        )));
    }
    Ok(())
}

#[then("the template was made from the build server disk")]
fn template_from_server_disk(build_world: &BuildWorld) -> Result<(), StepError> {
    let calls = build_world.driver.calls();
    let boot_disk_of = calls.iter().find_map(|call| match call {
        DriverCall::BootDisk(server) => Some(server.clone()),
        _ => None,
    });
    let templatized = calls.iter().find_map(|call| match call {
        DriverCall::Templatize { storage_id, .. } => Some(storage_id.clone()),
        _ => None,
    });
    let created_from = calls.iter().find_map(|call| match call {
        DriverCall::CreateServer { source_storage, .. } => Some(source_storage.clone()),
        _ => None,
    });

    match (boot_disk_of, templatized, created_from) {
        (Some(server), Some(disk), Some(source))
            if server.starts_with("server-") && disk.starts_with("disk-") && source == "S1" =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "unexpected server/disk/source chain: {other:?}"
        ))),
    }
}

#[then("no build server remains")]
fn no_server_remains(build_world: &BuildWorld) -> Result<(), StepError> {
    let live = build_world.driver.live_servers();
    if live.is_empty() && build_world.driver.count(DriverOp::DeleteServer) == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected the server to be deleted once, live servers: {live:?}"
        )))
    }
}

#[then("no template exists")]
fn no_template_exists(build_world: &BuildWorld) -> Result<(), StepError> {
    let live = build_world.driver.live_storages();
    if live == vec![String::from("S1")] && build_world.driver.count(DriverOp::Templatize) == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "only the source storage should remain, found {live:?}"
        )))
    }
}

#[then("the build fails with a provisioning error")]
fn provisioning_error(build_world: &BuildWorld) -> Result<(), StepError> {
    match failure(build_world)? {
        BuildError::ProvisioningFailed { message } if message.contains("status 100") => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a provisioning failure, got {other:?}"
        ))),
    }
}

#[then("the build fails because the source storage was not found")]
fn source_not_found(build_world: &BuildWorld) -> Result<(), StepError> {
    match failure(build_world)? {
        BuildError::Driver(DriverError::NotFound { .. }) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a not-found error, got {other:?}"
        ))),
    }
}

#[then("no server creation was attempted")]
fn no_server_created(build_world: &BuildWorld) -> Result<(), StepError> {
    let ops = build_world.driver.ops();
    if ops == vec![DriverOp::LocateSourceStorage] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected only the source lookup, got {ops:?}"
        )))
    }
}
