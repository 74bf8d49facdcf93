//! External command execution behind a test-friendly trait.

use std::ffi::OsString;
use std::process::Command;

use thiserror::Error;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Describes a failed run for error messages.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let status = self
            .code
            .map_or_else(|| String::from("no exit status"), |code| format!("exit status {code}"));
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{status}: {stderr}")
        }
    }
}

/// Errors raised when a command cannot be started.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when the program cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error message.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
///
/// Implementations block; async callers run them on the blocking pool.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| CommandError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
