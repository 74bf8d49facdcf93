//! Network interface descriptions attached to build servers.
//!
//! Interfaces are written in configuration as
//! `<type>:<family>[,<family>...][@<network>]`, for example `public:IPv4`
//! or `private:IPv4@03c93a7e-6a0b-4f8c-8d2e-1c3a7a8f0b21`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Network an interface is attached to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterfaceType {
    /// Internet-facing network.
    Public,
    /// SDN private network; requires a network identifier.
    Private,
    /// Provider-internal utility network.
    Utility,
}

impl InterfaceType {
    /// Returns the provider's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Utility => "utility",
        }
    }
}

impl FromStr for InterfaceType {
    type Err = NetworkSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "utility" => Ok(Self::Utility),
            other => Err(NetworkSpecError::UnknownType(other.to_owned())),
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IP address family.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddressFamily {
    /// IPv4.
    IPv4,
    /// IPv6.
    IPv6,
}

impl AddressFamily {
    /// Returns the provider's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IPv4 => "IPv4",
            Self::IPv6 => "IPv6",
        }
    }
}

impl FromStr for AddressFamily {
    type Err = NetworkSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ipv4" => Ok(Self::IPv4),
            "ipv6" => Ok(Self::IPv6),
            other => Err(NetworkSpecError::UnknownFamily(other.to_owned())),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing an interface description.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NetworkSpecError {
    /// The description has no `:` separating type from families.
    #[error("interface {0:?} must look like <type>:<family>[,<family>][@<network>]")]
    Malformed(String),
    /// The interface type is not recognised.
    #[error("unknown interface type {0:?}")]
    UnknownType(String),
    /// An address family is not recognised.
    #[error("unknown address family {0:?}")]
    UnknownFamily(String),
    /// A private interface was given without a network identifier.
    #[error("private interface requires a network: use private:<family>@<network>")]
    MissingNetwork,
}

/// One network interface on a build server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetworkInterface {
    /// Network the interface is attached to.
    pub kind: InterfaceType,
    /// Address families requested for the interface.
    pub families: Vec<AddressFamily>,
    /// Private network identifier, if any.
    pub network: Option<String>,
}

impl NetworkInterface {
    /// Single public IPv4 interface used when nothing is configured.
    #[must_use]
    pub fn public_ipv4() -> Self {
        Self {
            kind: InterfaceType::Public,
            families: vec![AddressFamily::IPv4],
            network: None,
        }
    }
}

impl FromStr for NetworkInterface {
    type Err = NetworkSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (head, network) = match value.split_once('@') {
            Some((head, network)) if !network.trim().is_empty() => {
                (head, Some(network.trim().to_owned()))
            }
            Some(_) => return Err(NetworkSpecError::Malformed(value.to_owned())),
            None => (value, None),
        };
        let (kind, families) = head
            .split_once(':')
            .ok_or_else(|| NetworkSpecError::Malformed(value.to_owned()))?;
        let kind: InterfaceType = kind.parse()?;
        let families = families
            .split(',')
            .filter(|family| !family.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<AddressFamily>, _>>()?;
        if families.is_empty() {
            return Err(NetworkSpecError::Malformed(value.to_owned()));
        }
        if kind == InterfaceType::Private && network.is_none() {
            return Err(NetworkSpecError::MissingNetwork);
        }
        Ok(Self {
            kind,
            families,
            network,
        })
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families = self
            .families
            .iter()
            .map(|family| family.as_str())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}:{families}", self.kind)?;
        if let Some(network) = &self.network {
            write!(f, "@{network}")?;
        }
        Ok(())
    }
}
