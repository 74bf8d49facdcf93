//! Errors that halt a build.

use thiserror::Error;

use crate::driver::DriverError;

/// Reason a build halted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BuildError {
    /// A driver operation failed.
    #[error(transparent)]
    Driver(DriverError),
    /// The provisioner could not reach the server or a command failed.
    #[error("provisioning failed: {message}")]
    ProvisioningFailed {
        /// Description of the failure.
        message: String,
    },
    /// The temporary SSH key pair could not be generated.
    #[error("failed to generate ssh key pair: {message}")]
    KeyGeneration {
        /// Description of the failure.
        message: String,
    },
    /// A step ran without a fact an earlier step should have recorded.
    #[error("build state is missing {fact}")]
    MissingState {
        /// Name of the absent fact.
        fact: &'static str,
    },
    /// Cancellation was requested.
    #[error("build cancelled")]
    Cancelled,
}

impl From<DriverError> for BuildError {
    fn from(value: DriverError) -> Self {
        match value {
            DriverError::Cancelled { .. } => Self::Cancelled,
            other => Self::Driver(other),
        }
    }
}
