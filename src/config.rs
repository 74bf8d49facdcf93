//! Configuration loading via `ortho-config`.
//!
//! [`BuildConfig`] is the raw, layered view (defaults, `kiln.toml`, `KILN_*`
//! environment variables). [`BuildConfig::settings`] validates it into the
//! [`BuildSettings`] the pipeline consumes.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::driver::StorageSelector;
use crate::network::NetworkInterface;
use crate::upcloud::UpCloudCredentials;

/// Default prefix for server and template titles.
pub const DEFAULT_TEMPLATE_PREFIX: &str = "custom-image";

/// Build configuration derived from configuration files and environment
/// variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "KILN",
    discovery(
        app_name = "kiln",
        env_var = "KILN_CONFIG_PATH",
        config_file_name = "kiln.toml",
        dotfile_name = ".kiln.toml",
        project_file_name = "kiln.toml"
    )
)]
pub struct BuildConfig {
    /// UpCloud API user name. Required.
    pub username: Option<String>,
    /// UpCloud API password. Required.
    pub password: Option<String>,
    /// Zone hosting the build server (for example `fi-hel1`). Required.
    pub zone: Option<String>,
    /// Identifier of the storage to clone. Takes precedence over
    /// `storage_name`.
    pub storage_uuid: Option<String>,
    /// Case-insensitive substring of a template title, used when
    /// `storage_uuid` is unset.
    pub storage_name: Option<String>,
    /// Prefix for server and template titles.
    #[ortho_config(default = DEFAULT_TEMPLATE_PREFIX.to_owned())]
    pub template_prefix: String,
    /// Boot disk size in GiB.
    #[ortho_config(default = 25)]
    pub storage_size: u32,
    /// Upper bound in seconds on every state wait and on the SSH probe.
    #[ortho_config(default = 300)]
    pub state_timeout_secs: u64,
    /// Extra zones receiving a copy of the template.
    #[serde(default)]
    pub clone_zones: Vec<String>,
    /// Interfaces as `<type>:<family>[,<family>][@<network>]`. Defaults to a
    /// single `public:IPv4` interface when empty.
    #[serde(default)]
    pub network_interfaces: Vec<String>,
    /// User the temporary key is installed for.
    #[ortho_config(default = "root".to_owned())]
    pub ssh_username: String,
    /// SSH port on the build server.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Commands run on the build server before it is stopped.
    #[serde(default)]
    pub provision_commands: Vec<String>,
    /// Writes the temporary private key here when set.
    pub debug_key_path: Option<String>,
}

/// Validated settings consumed by the build pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildSettings {
    /// Storage the server is cloned from.
    pub source: StorageSelector,
    /// Zone hosting the build server.
    pub zone: String,
    /// Prefix for server and template titles.
    pub template_prefix: String,
    /// Boot disk size in GiB.
    pub storage_size: u32,
    /// Bound on every state wait and on the SSH probe.
    pub state_timeout: Duration,
    /// Extra zones receiving a copy of the template.
    pub clone_zones: Vec<String>,
    /// Interfaces attached to the build server.
    pub networking: Vec<NetworkInterface>,
    /// Login user for provisioning.
    pub ssh_username: String,
    /// SSH port on the build server.
    pub ssh_port: u16,
    /// Commands run on the build server.
    pub provision_commands: Vec<String>,
    /// Where to save the temporary private key, if anywhere.
    pub debug_key_path: Option<Utf8PathBuf>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to kiln.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const USERNAME: FieldMetadata =
    FieldMetadata::new("UpCloud API username", "KILN_USERNAME", "username");
const PASSWORD: FieldMetadata =
    FieldMetadata::new("UpCloud API password", "KILN_PASSWORD", "password");
const ZONE: FieldMetadata = FieldMetadata::new("zone", "KILN_ZONE", "zone");
const TEMPLATE_PREFIX: FieldMetadata =
    FieldMetadata::new("template prefix", "KILN_TEMPLATE_PREFIX", "template_prefix");
const SSH_USERNAME: FieldMetadata =
    FieldMetadata::new("SSH username", "KILN_SSH_USERNAME", "ssh_username");

fn require<'a>(value: Option<&'a str>, metadata: &FieldMetadata) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| metadata.missing())
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

impl BuildConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("kiln")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the validated API credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when either value is empty.
    pub fn credentials(&self) -> Result<UpCloudCredentials, ConfigError> {
        Ok(UpCloudCredentials {
            username: require(self.username.as_deref(), &USERNAME)?.to_owned(),
            password: require(self.password.as_deref(), &PASSWORD)?.to_owned(),
        })
    }

    /// Validates every field and produces [`BuildSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required value is absent
    /// and [`ConfigError::Invalid`] when a value is out of range or cannot be
    /// parsed.
    pub fn settings(&self) -> Result<BuildSettings, ConfigError> {
        self.credentials()?;
        let zone = require(self.zone.as_deref(), &ZONE)?.to_owned();
        let source = StorageSelector {
            uuid: self.storage_uuid.clone(),
            name: self.storage_name.clone(),
        };
        if source.uuid().is_none() && source.name().is_none() {
            return Err(ConfigError::MissingField(String::from(
                "missing source storage: set KILN_STORAGE_UUID or KILN_STORAGE_NAME, \
                 or add storage_uuid or storage_name to kiln.toml",
            )));
        }
        let template_prefix =
            require(Some(self.template_prefix.as_str()), &TEMPLATE_PREFIX)?.to_owned();
        let ssh_username =
            require(Some(self.ssh_username.as_str()), &SSH_USERNAME)?.to_owned();

        if self.storage_size == 0 {
            return Err(invalid("storage_size", "must be greater than zero"));
        }
        if self.state_timeout_secs == 0 {
            return Err(invalid("state_timeout_secs", "must be greater than zero"));
        }
        if self.ssh_port == 0 {
            return Err(invalid("ssh_port", "must be greater than zero"));
        }

        let clone_zones = self
            .clone_zones
            .iter()
            .map(|zone| zone.trim())
            .map(|zone| {
                if zone.is_empty() {
                    Err(invalid("clone_zones", "zone names must not be empty"))
                } else {
                    Ok(zone.to_owned())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut networking = self
            .network_interfaces
            .iter()
            .map(|spec| {
                spec.parse::<NetworkInterface>()
                    .map_err(|err| invalid("network_interfaces", err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if networking.is_empty() {
            networking.push(NetworkInterface::public_ipv4());
        }

        let debug_key_path = match self.debug_key_path.as_deref().map(str::trim) {
            None => None,
            Some("") => return Err(invalid("debug_key_path", "must not be empty")),
            Some(path) => Some(Utf8PathBuf::from(path)),
        };

        Ok(BuildSettings {
            source,
            zone,
            template_prefix,
            storage_size: self.storage_size,
            state_timeout: Duration::from_secs(self.state_timeout_secs),
            clone_zones,
            networking,
            ssh_username,
            ssh_port: self.ssh_port,
            provision_commands: self.provision_commands.clone(),
            debug_key_path,
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration field {field}: {message}")]
    Invalid {
        /// TOML key of the offending field.
        field: &'static str,
        /// What is wrong with the value.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
