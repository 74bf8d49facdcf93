//! Wire representations of UpCloud resources.

use serde::{Deserialize, Serialize};

use crate::driver::{
    DeviceType, IpAddress, Server, ServerState, Storage, StorageDevice, StorageState, StorageType,
};
use crate::network::NetworkInterface;

pub(super) const DEFAULT_PLAN: &str = "1xCPU-2GB";
pub(super) const DEFAULT_TIER: &str = "maxiops";

#[derive(Debug, Deserialize)]
pub(super) struct ServerEnvelope {
    pub(super) server: ServerDetails,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerDetails {
    uuid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    zone: String,
    state: String,
    #[serde(default)]
    storage_devices: StorageDevices,
    #[serde(default)]
    ip_addresses: IpAddresses,
}

#[derive(Debug, Default, Deserialize)]
struct StorageDevices {
    #[serde(default)]
    storage_device: Vec<StorageDeviceWire>,
}

#[derive(Debug, Deserialize)]
struct StorageDeviceWire {
    storage: String,
    #[serde(default)]
    storage_title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    storage_size: u32,
}

#[derive(Debug, Default, Deserialize)]
struct IpAddresses {
    #[serde(default)]
    ip_address: Vec<IpAddressWire>,
}

#[derive(Debug, Deserialize)]
struct IpAddressWire {
    access: String,
    family: String,
    address: String,
}

impl From<ServerDetails> for Server {
    fn from(value: ServerDetails) -> Self {
        Self {
            uuid: value.uuid,
            title: value.title,
            zone: value.zone,
            state: ServerState::from(value.state.as_str()),
            storage_devices: value
                .storage_devices
                .storage_device
                .into_iter()
                .map(|device| StorageDevice {
                    uuid: device.storage,
                    title: device.storage_title,
                    kind: DeviceType::from(device.kind.as_str()),
                    size: device.storage_size,
                })
                .collect(),
            // Addresses on networks this crate does not model are skipped.
            ip_addresses: value
                .ip_addresses
                .ip_address
                .into_iter()
                .filter_map(|ip| {
                    Some(IpAddress {
                        access: ip.access.parse().ok()?,
                        family: ip.family.parse().ok()?,
                        address: ip.address,
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct StorageEnvelope {
    pub(super) storage: StorageWire,
}

#[derive(Debug, Deserialize)]
pub(super) struct StorageListEnvelope {
    pub(super) storages: StorageList,
}

#[derive(Debug, Deserialize)]
pub(super) struct StorageList {
    #[serde(default)]
    pub(super) storage: Vec<StorageWire>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StorageWire {
    uuid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    size: u32,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    zone: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    state: String,
}

impl From<StorageWire> for Storage {
    fn from(value: StorageWire) -> Self {
        Self {
            uuid: value.uuid,
            title: value.title,
            size: value.size,
            tier: value.tier,
            zone: value.zone,
            kind: StorageType::from(value.kind.as_str()),
            state: StorageState::from(value.state.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateServerEnvelope<'a> {
    pub(super) server: CreateServerBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateServerBody<'a> {
    pub(super) zone: &'a str,
    pub(super) title: &'a str,
    pub(super) hostname: &'a str,
    pub(super) plan: &'static str,
    pub(super) password_delivery: &'static str,
    pub(super) storage_devices: CloneDevices<'a>,
    pub(super) networking: Networking,
    pub(super) login_user: LoginUser<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CloneDevices<'a> {
    pub(super) storage_device: Vec<CloneDevice<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct CloneDevice<'a> {
    pub(super) action: &'static str,
    pub(super) storage: &'a str,
    pub(super) title: &'a str,
    pub(super) size: u32,
    pub(super) tier: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct Networking {
    interfaces: Interfaces,
}

#[derive(Debug, Serialize)]
struct Interfaces {
    interface: Vec<InterfaceWire>,
}

#[derive(Debug, Serialize)]
struct InterfaceWire {
    ip_addresses: FamilyList,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
}

#[derive(Debug, Serialize)]
struct FamilyList {
    ip_address: Vec<Family>,
}

#[derive(Debug, Serialize)]
struct Family {
    family: &'static str,
}

impl Networking {
    pub(super) fn from_interfaces(interfaces: &[NetworkInterface]) -> Self {
        Self {
            interfaces: Interfaces {
                interface: interfaces
                    .iter()
                    .map(|iface| InterfaceWire {
                        ip_addresses: FamilyList {
                            ip_address: iface
                                .families
                                .iter()
                                .map(|family| Family {
                                    family: family.as_str(),
                                })
                                .collect(),
                        },
                        kind: iface.kind.as_str(),
                        network: iface.network.clone(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct LoginUser<'a> {
    pub(super) create_password: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) ssh_keys: Option<SshKeys<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct SshKeys<'a> {
    pub(super) ssh_key: Vec<&'a str>,
}
