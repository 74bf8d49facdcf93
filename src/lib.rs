//! Core library for the Kiln image builder.
//!
//! Kiln boots a disposable UpCloud server from a source storage, provisions
//! it over SSH, stops it, and turns its disk into storage templates in one or
//! more zones. Every resource it creates is torn down again when the build
//! fails, except for the templates a completed build hands back.

pub mod artifact;
pub mod builder;
pub mod cancel;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod naming;
pub mod network;
pub mod runner;
pub mod ssh;
pub mod steps;
#[cfg(test)]
mod test_helpers;
pub mod test_support;
pub mod ui;
pub mod upcloud;
pub mod wait;

pub use artifact::{Artifact, BUILDER_ID};
pub use builder::Builder;
pub use cancel::{CancelHandle, Cancellation, cancellation_pair};
pub use config::{BuildConfig, BuildSettings, ConfigError};
pub use context::{BuildContext, GeneratedData, ServerFacts};
pub use driver::{
    CreateServerRequest, Driver, DriverError, ResourceKind, Server, ServerState, Storage,
    StorageDevice, StorageSelector, StorageState, StorageType,
};
pub use error::BuildError;
pub use network::{AddressFamily, InterfaceType, NetworkInterface};
pub use runner::{RunState, Step, StepAction, StepRunner};
pub use ssh::{
    KeyGenerator, ProcessCommandRunner, ProvisionTarget, Provisioner, SshKeyPair, SshKeygen,
    SshProvisioner,
};
pub use ui::{TracingUi, Ui};
pub use upcloud::{UpCloudCredentials, UpCloudDriver};
pub use wait::{StateWait, WaitOptions};
