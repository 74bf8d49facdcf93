//! Driver abstraction over a remote compute and storage API.
//!
//! Every operation returns a boxed future. Mutating calls that start an
//! asynchronous transition on the provider also wait for the transition to
//! settle, so from the build pipeline's point of view each call completes
//! only once the resource is in its expected state (or the wait timed out).

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::network::{AddressFamily, InterfaceType, NetworkInterface};

/// Future returned by driver operations.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Kind of remote resource named in driver errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// A compute server.
    Server,
    /// A storage device attached to, or cloned from, a server.
    Storage,
    /// A storage resource flagged as a reusable template.
    Template,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Server => "server",
            Self::Storage => "storage",
            Self::Template => "template",
        })
    }
}

/// Errors raised by drivers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DriverError {
    /// Raised when a source image or expected disk does not exist.
    #[error("{resource} not found: {detail}")]
    NotFound {
        /// Kind of resource that was looked up.
        resource: ResourceKind,
        /// What was searched for.
        detail: String,
    },
    /// Raised when the provider rejects a create, clone, or templatize call.
    #[error("failed to create {resource}: {message}")]
    CreateFailed {
        /// Kind of resource being created.
        resource: ResourceKind,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when the provider rejects a stop request.
    #[error("failed to stop server {server_id}: {message}")]
    StopFailed {
        /// Provider server identifier.
        server_id: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when the provider rejects a delete request.
    #[error("failed to delete {resource} {id}: {message}")]
    DeleteFailed {
        /// Kind of resource being deleted.
        resource: ResourceKind,
        /// Provider identifier.
        id: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when a state wait exceeds the configured timeout.
    #[error("timed out waiting for {resource} {id} to {target} (last state: {last_state})")]
    StateTimeout {
        /// Kind of resource being polled.
        resource: ResourceKind,
        /// Provider identifier.
        id: String,
        /// Description of the awaited transition.
        target: String,
        /// Last state observed before giving up.
        last_state: String,
    },
    /// Raised when a state wait observes a cancellation request.
    #[error("wait for {resource} {id} cancelled")]
    Cancelled {
        /// Kind of resource being polled.
        resource: ResourceKind,
        /// Provider identifier.
        id: String,
    },
    /// Raised when the provider accepted a create call but a later request
    /// for the same resource failed.
    #[error("{resource} {id} was created but did not settle: {message}")]
    Unsettled {
        /// Kind of resource that was created.
        resource: ResourceKind,
        /// Provider identifier of the new resource.
        id: String,
        /// Failure that followed the create call.
        message: String,
    },
    /// Wrapper for transport and decoding failures.
    #[error("provider error: {message}")]
    Provider {
        /// Underlying failure description.
        message: String,
    },
}

impl DriverError {
    /// Returns the identifier of a resource that was created but never
    /// reached its expected state.
    ///
    /// Callers use this to register the resource for cleanup even though
    /// the operation as a whole failed.
    #[must_use]
    pub fn stranded(&self, kind: ResourceKind) -> Option<&str> {
        match self {
            Self::StateTimeout { resource, id, .. }
            | Self::Cancelled { resource, id }
            | Self::Unsettled { resource, id, .. }
                if *resource == kind =>
            {
                Some(id.as_str())
            }
            _ => None,
        }
    }

    /// Attaches the id of a freshly created resource to an error raised
    /// after the create call succeeded.
    ///
    /// Errors that already strand the same resource pass through unchanged.
    #[must_use]
    pub fn after_create(self, kind: ResourceKind, created: &str) -> Self {
        if self.stranded(kind) == Some(created) {
            return self;
        }
        Self::Unsettled {
            resource: kind,
            id: created.to_owned(),
            message: self.to_string(),
        }
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(value: serde_json::Error) -> Self {
        Self::Provider {
            message: format!("unexpected response body: {value}"),
        }
    }
}

/// Lifecycle states reported for servers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerState {
    /// Server is being created.
    Pending,
    /// Server is undergoing a provider-side operation.
    Maintenance,
    /// Server is running.
    Started,
    /// Server is shutting down.
    Stopping,
    /// Server is stopped.
    Stopped,
    /// Server is in an error state.
    Error,
    /// State string not recognised by this crate.
    Other(String),
}

impl From<&str> for ServerState {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "maintenance" => Self::Maintenance,
            "started" => Self::Started,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "error" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Maintenance => "maintenance",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Other(other) => other,
        })
    }
}

/// Lifecycle states reported for storages.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageState {
    /// Storage is being created.
    Pending,
    /// Storage is being resized.
    Maximizing,
    /// Storage is the source or target of a clone.
    Cloning,
    /// Storage is being backed up.
    Backuping,
    /// Storage is ready.
    Online,
    /// Storage is in an error state.
    Error,
    /// State string not recognised by this crate.
    Other(String),
}

impl From<&str> for StorageState {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "maximizing" => Self::Maximizing,
            "cloning" => Self::Cloning,
            "backuping" => Self::Backuping,
            "online" => Self::Online,
            "error" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Maximizing => "maximizing",
            Self::Cloning => "cloning",
            Self::Backuping => "backuping",
            Self::Online => "online",
            Self::Error => "error",
            Self::Other(other) => other,
        })
    }
}

/// Storage categories reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageType {
    /// Regular disk storage.
    Normal,
    /// Reusable template image.
    Template,
    /// Backup image.
    Backup,
    /// Optical media image.
    Cdrom,
    /// Category not recognised by this crate.
    Other(String),
}

impl From<&str> for StorageType {
    fn from(value: &str) -> Self {
        match value {
            "normal" => Self::Normal,
            "template" => Self::Template,
            "backup" => Self::Backup,
            "cdrom" => Self::Cdrom,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Device categories for storages attached to a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceType {
    /// Block device; the boot disk is the first of these.
    Disk,
    /// Optical drive.
    Cdrom,
    /// Device category not recognised by this crate.
    Other(String),
}

impl From<&str> for DeviceType {
    fn from(value: &str) -> Self {
        match value {
            "disk" => Self::Disk,
            "cdrom" => Self::Cdrom,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Storage resource or template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Storage {
    /// Provider identifier.
    pub uuid: String,
    /// Human readable title.
    pub title: String,
    /// Size in GiB.
    pub size: u32,
    /// Performance tier (for example `maxiops`).
    pub tier: String,
    /// Zone hosting the storage.
    pub zone: String,
    /// Storage category.
    pub kind: StorageType,
    /// Current lifecycle state.
    pub state: StorageState,
}

/// Storage attached to a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageDevice {
    /// Provider identifier of the underlying storage.
    pub uuid: String,
    /// Storage title.
    pub title: String,
    /// Device category.
    pub kind: DeviceType,
    /// Size in GiB.
    pub size: u32,
}

/// Address assigned to one of a server's interfaces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IpAddress {
    /// Network the address belongs to.
    pub access: InterfaceType,
    /// Address family.
    pub family: AddressFamily,
    /// Textual address.
    pub address: String,
}

/// Compute server as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Server {
    /// Provider identifier.
    pub uuid: String,
    /// Human readable title.
    pub title: String,
    /// Zone hosting the server.
    pub zone: String,
    /// Current lifecycle state.
    pub state: ServerState,
    /// Attached storage devices in provider order.
    pub storage_devices: Vec<StorageDevice>,
    /// Assigned addresses in provider order.
    pub ip_addresses: Vec<IpAddress>,
}

impl Server {
    /// Returns the first public IPv4 address, if any.
    #[must_use]
    pub fn public_ipv4(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|ip| ip.access == InterfaceType::Public && ip.family == AddressFamily::IPv4)
            .map(|ip| ip.address.as_str())
    }

    /// Returns the first attached device of disk type.
    #[must_use]
    pub fn boot_disk(&self) -> Option<&StorageDevice> {
        self.storage_devices
            .iter()
            .find(|device| device.kind == DeviceType::Disk)
    }
}

/// Selects the storage a server is cloned from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StorageSelector {
    /// Exact storage identifier; takes precedence over `name`.
    pub uuid: Option<String>,
    /// Case-insensitive substring of a template title.
    pub name: Option<String>,
}

impl StorageSelector {
    /// Selects by exact identifier.
    #[must_use]
    pub fn by_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            name: None,
        }
    }

    /// Selects by title substring.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            uuid: None,
            name: Some(name.into()),
        }
    }

    /// Returns the identifier when one is set and non-blank.
    #[must_use]
    pub fn uuid(&self) -> Option<&str> {
        non_blank(self.uuid.as_deref())
    }

    /// Returns the title substring when one is set and non-blank.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl fmt::Display for StorageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.uuid(), self.name()) {
            (Some(uuid), _) => write!(f, "uuid {uuid}"),
            (None, Some(name)) => write!(f, "name {name:?}"),
            (None, None) => f.write_str("no selector"),
        }
    }
}

/// Parameters for creating a build server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateServerRequest {
    /// Storage cloned into the server's boot disk.
    pub source_storage: String,
    /// Target zone.
    pub zone: String,
    /// Prefix used for the server title and hostname.
    pub prefix: String,
    /// Login user receiving the public key.
    pub login_user: String,
    /// Public key installed for `login_user`, in authorized_keys format.
    pub ssh_public_key: Option<String>,
    /// Boot disk size in GiB.
    pub storage_size: u32,
    /// Network interfaces to attach.
    pub networking: Vec<NetworkInterface>,
}

/// Resource operations the build pipeline needs from a provider.
pub trait Driver: Send + Sync {
    /// Resolves the source storage by identifier or by template title.
    fn locate_source_storage<'a>(
        &'a self,
        selector: &'a StorageSelector,
    ) -> DriverFuture<'a, Storage>;

    /// Creates a server and waits until it has started.
    fn create_server<'a>(&'a self, request: &'a CreateServerRequest)
    -> DriverFuture<'a, Server>;

    /// Stops a server and waits until it has stopped. Stopping a stopped
    /// server is a no-op.
    fn stop_server<'a>(&'a self, server_id: &'a str) -> DriverFuture<'a, ()>;

    /// Deletes a server together with its attached storages.
    fn delete_server<'a>(&'a self, server_id: &'a str) -> DriverFuture<'a, ()>;

    /// Returns the server's boot disk.
    fn boot_disk<'a>(&'a self, server_id: &'a str) -> DriverFuture<'a, StorageDevice>;

    /// Clones a storage into `zone` and waits until the clone is online.
    fn clone_storage<'a>(
        &'a self,
        storage_id: &'a str,
        zone: &'a str,
        title: &'a str,
    ) -> DriverFuture<'a, Storage>;

    /// Converts a storage into a template and waits until it is online.
    fn templatize<'a>(&'a self, storage_id: &'a str, title: &'a str)
    -> DriverFuture<'a, Storage>;

    /// Deletes a storage or template.
    fn delete_template<'a>(&'a self, template_id: &'a str) -> DriverFuture<'a, ()>;
}
