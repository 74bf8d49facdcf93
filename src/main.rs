//! Binary entry point for the Kiln CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use kiln::{
    BuildConfig, BuildError, Builder, ConfigError, DriverError, SshKeygen, SshProvisioner,
    UpCloudDriver, cancellation_pair,
};

mod cli;

use cli::{BuildCommand, Cli};

/// Environment variable holding the tracing filter directives.
const LOG_ENV: &str = "KILN_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Build(command) => run_build(command).await,
    }
}

async fn run_build(command: BuildCommand) -> Result<(), CliError> {
    let mut config = BuildConfig::load_without_cli_args()?;
    apply_overrides(&mut config, command);
    let settings = config.settings()?;
    let credentials = config.credentials()?;

    let (handle, cancellation) = cancellation_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling build");
            handle.cancel();
        }
    });

    // Teardown keeps a driver that ignores the interrupt so it can finish.
    let cleanup_driver = UpCloudDriver::new(credentials, settings.state_timeout)?;
    let driver = cleanup_driver
        .clone()
        .with_cancellation(cancellation.clone());
    let provisioner = SshProvisioner::system(settings.provision_commands.clone());

    let builder = Builder::new(
        settings,
        Arc::new(driver),
        Arc::new(SshKeygen::system()),
        Arc::new(provisioner),
    )
    .with_cleanup_driver(Arc::new(cleanup_driver));
    let artifact = builder.run(cancellation).await?;

    writeln!(io::stdout(), "{artifact}").ok();
    Ok(())
}

fn apply_overrides(config: &mut BuildConfig, command: BuildCommand) {
    let BuildCommand {
        zone,
        storage_uuid,
        storage_name,
        template_prefix,
        clone_zones,
        provision_commands,
    } = command;

    if zone.is_some() {
        config.zone = zone;
    }
    if storage_uuid.is_some() {
        config.storage_uuid = storage_uuid;
    }
    if storage_name.is_some() {
        config.storage_name = storage_name;
    }
    if let Some(prefix) = template_prefix {
        config.template_prefix = prefix;
    }
    if !clone_zones.is_empty() {
        config.clone_zones = clone_zones;
    }
    if !provision_commands.is_empty() {
        config.provision_commands = provision_commands;
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
