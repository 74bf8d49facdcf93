//! Running setup commands on the build server.

use std::ffi::OsString;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use shell_escape::unix::escape;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};

use crate::cancel::Cancellation;

use super::command::{CommandError, CommandRunner, ProcessCommandRunner};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default interval between SSH port probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Connection details for the build server.
#[derive(Clone)]
pub struct ProvisionTarget {
    /// Server address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Private key in OpenSSH PEM format.
    pub private_key: String,
}

impl std::fmt::Debug for ProvisionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Errors raised while reaching or provisioning the server.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the SSH port never accepts a connection.
    #[error("ssh port {host}:{port} not reachable within {timeout_secs}s")]
    Unreachable {
        /// Server address.
        host: String,
        /// SSH port.
        port: u16,
        /// Seconds waited.
        timeout_secs: u64,
    },
    /// Raised when cancellation interrupts the wait.
    #[error("provisioning cancelled")]
    Cancelled,
    /// Raised when the ssh client cannot be started.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// Raised when a remote command exits unsuccessfully.
    #[error("command `{command}` failed: {message}")]
    CommandFailed {
        /// Command as configured.
        command: String,
        /// Exit status and stderr.
        message: String,
    },
    /// Raised when the private key cannot be staged on disk.
    #[error("failed to stage private key: {0}")]
    KeyFile(String),
    /// Raised when the blocking task running ssh panicked.
    #[error("provisioning task failed: {0}")]
    Task(String),
}

/// Waits until `host:port` accepts TCP connections.
///
/// # Errors
///
/// Returns [`ProvisionError::Unreachable`] once `limit` elapses and
/// [`ProvisionError::Cancelled`] when `cancellation` fires first.
pub async fn wait_for_port(
    host: &str,
    port: u16,
    limit: Duration,
    probe_interval: Duration,
    cancellation: &Cancellation,
) -> Result<(), ProvisionError> {
    let deadline = Instant::now() + limit;
    loop {
        if cancellation.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }
        let connect = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await;
        if matches!(connect, Ok(Ok(_))) {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ProvisionError::Unreachable {
                host: host.to_owned(),
                port,
                timeout_secs: limit.as_secs(),
            });
        }
        tokio::select! {
            () = sleep(probe_interval.min(deadline - now)) => {}
            () = cancellation.cancelled() => return Err(ProvisionError::Cancelled),
        }
    }
}

/// Future returned by [`Provisioner::provision`].
pub type ProvisionFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>>;

/// Configures the build server once it is reachable.
pub trait Provisioner: Send + Sync {
    /// Runs the provisioning work against `target`.
    fn provision<'a>(&'a self, target: &'a ProvisionTarget) -> ProvisionFuture<'a>;
}

/// [`Provisioner`] that runs each command with the system `ssh` client.
#[derive(Clone, Debug)]
pub struct SshProvisioner<R: CommandRunner = ProcessCommandRunner> {
    runner: Arc<R>,
    commands: Vec<String>,
    program: String,
}

impl SshProvisioner<ProcessCommandRunner> {
    /// Runs `commands` with the `ssh` found on `PATH`.
    #[must_use]
    pub fn system(commands: Vec<String>) -> Self {
        Self::new(ProcessCommandRunner, commands)
    }
}

impl<R: CommandRunner + 'static> SshProvisioner<R> {
    /// Runs `commands` through `runner`.
    #[must_use]
    pub fn new(runner: R, commands: Vec<String>) -> Self {
        Self {
            runner: Arc::new(runner),
            commands,
            program: String::from("ssh"),
        }
    }

    fn ssh_args(target: &ProvisionTarget, key_path: &Utf8Path, command: &str) -> Vec<OsString> {
        let remote = format!("sh -c {}", escape(command.into()));
        vec![
            OsString::from("-p"),
            OsString::from(target.port.to_string()),
            OsString::from("-i"),
            OsString::from(key_path.as_str()),
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
            OsString::from("-o"),
            OsString::from("StrictHostKeyChecking=no"),
            OsString::from("-o"),
            OsString::from("UserKnownHostsFile=/dev/null"),
            OsString::from(format!("{}@{}", target.username, target.host)),
            OsString::from(remote),
        ]
    }

    fn provision_blocking(
        runner: &R,
        program: &str,
        commands: &[String],
        target: &ProvisionTarget,
    ) -> Result<(), ProvisionError> {
        let mut key_file = tempfile::Builder::new()
            .prefix("kiln-key-")
            .tempfile()
            .map_err(|err| ProvisionError::KeyFile(err.to_string()))?;
        key_file
            .write_all(target.private_key.as_bytes())
            .and_then(|()| key_file.flush())
            .map_err(|err| ProvisionError::KeyFile(err.to_string()))?;
        let key_path = Utf8Path::from_path(key_file.path()).ok_or_else(|| {
            ProvisionError::KeyFile(String::from("temporary key path is not UTF-8"))
        })?;

        for command in commands {
            tracing::info!(host = %target.host, command = %command, "running provisioning command");
            let args = Self::ssh_args(target, key_path, command);
            let output = runner.run(program, &args)?;
            if !output.is_success() {
                return Err(ProvisionError::CommandFailed {
                    command: command.clone(),
                    message: output.failure_summary(),
                });
            }
        }
        Ok(())
    }
}

impl<R: CommandRunner + 'static> Provisioner for SshProvisioner<R> {
    fn provision<'a>(&'a self, target: &'a ProvisionTarget) -> ProvisionFuture<'a> {
        Box::pin(async move {
            if self.commands.is_empty() {
                return Ok(());
            }
            let runner = Arc::clone(&self.runner);
            let program = self.program.clone();
            let commands = self.commands.clone();
            let target = target.clone();
            tokio::task::spawn_blocking(move || {
                Self::provision_blocking(&runner, &program, &commands, &target)
            })
            .await
            .map_err(|err| ProvisionError::Task(err.to_string()))?
        })
    }
}
