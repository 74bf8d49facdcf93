//! Server lifecycle operations: create, stop, delete, and boot disk lookup.

use reqwest::Method;
use serde_json::json;

use crate::driver::{
    CreateServerRequest, DriverError, ResourceKind, Server, ServerState, StorageDevice,
};
use crate::naming::{disk_title, timestamped_title};
use crate::wait::StateWait;

use super::UpCloudDriver;
use super::api::decode_created;
use super::types::{
    CloneDevice, CloneDevices, CreateServerBody, CreateServerEnvelope, DEFAULT_PLAN, DEFAULT_TIER,
    LoginUser, Networking, ServerEnvelope, SshKeys,
};

const STOP_TIMEOUT_SECS: &str = "60";

impl UpCloudDriver {
    pub(super) async fn create(&self, request: &CreateServerRequest) -> Result<Server, DriverError> {
        let title = timestamped_title(&request.prefix);
        let disk = disk_title(&title);
        let envelope = CreateServerEnvelope {
            server: CreateServerBody {
                zone: &request.zone,
                title: &title,
                hostname: &request.prefix,
                plan: DEFAULT_PLAN,
                password_delivery: "none",
                storage_devices: CloneDevices {
                    storage_device: vec![CloneDevice {
                        action: "clone",
                        storage: &request.source_storage,
                        title: &disk,
                        size: request.storage_size,
                        tier: DEFAULT_TIER,
                    }],
                },
                networking: Networking::from_interfaces(&request.networking),
                login_user: LoginUser {
                    create_password: "no",
                    username: request
                        .ssh_public_key
                        .as_ref()
                        .map(|_| request.login_user.as_str()),
                    ssh_keys: request.ssh_public_key.as_deref().map(|key| SshKeys {
                        ssh_key: vec![key],
                    }),
                },
            },
        };
        let body = serde_json::to_value(&envelope)?;

        tracing::info!(zone = %request.zone, %title, "creating server");
        let response = self
            .call(Method::POST, "/server", Some(body))
            .await
            .map_err(|failure| DriverError::CreateFailed {
                resource: ResourceKind::Server,
                message: failure.to_string(),
            })?;
        let created: ServerEnvelope =
            decode_created(&response, ResourceKind::Server, "/server/uuid")?;
        let server = Server::from(created.server);

        self.wait_for_server(&server.uuid, StateWait::Desired(ServerState::Started))
            .await
            .map_err(|err| err.after_create(ResourceKind::Server, &server.uuid))
    }

    pub(super) async fn stop(&self, server_id: &str) -> Result<(), DriverError> {
        let server = self
            .wait_for_server(server_id, StateWait::Undesired(ServerState::Maintenance))
            .await?;
        if server.state == ServerState::Stopped {
            tracing::debug!(server_id, "server already stopped");
            return Ok(());
        }

        let body = json!({
            "stop_server": {
                "stop_type": "soft",
                "timeout": STOP_TIMEOUT_SECS,
            }
        });
        let path = format!("/server/{server_id}/stop");
        self.call(Method::POST, &path, Some(body))
            .await
            .map_err(|failure| DriverError::StopFailed {
                server_id: server_id.to_owned(),
                message: failure.to_string(),
            })?;

        self.wait_for_server(server_id, StateWait::Desired(ServerState::Stopped))
            .await?;
        Ok(())
    }

    pub(super) async fn delete_with_storages(&self, server_id: &str) -> Result<(), DriverError> {
        let path = format!("/server/{server_id}?storages=1");
        self.call(Method::DELETE, &path, None)
            .await
            .map_err(|failure| DriverError::DeleteFailed {
                resource: ResourceKind::Server,
                id: server_id.to_owned(),
                message: failure.to_string(),
            })?;
        Ok(())
    }

    pub(super) async fn find_boot_disk(
        &self,
        server_id: &str,
    ) -> Result<StorageDevice, DriverError> {
        let server = self.fetch_server(server_id).await?;
        server
            .boot_disk()
            .cloned()
            .ok_or_else(|| DriverError::NotFound {
                resource: ResourceKind::Storage,
                detail: format!("no disk attached to server {server_id}"),
            })
    }
}
