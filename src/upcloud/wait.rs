//! State fetches and waits for UpCloud resources.

use reqwest::Method;

use crate::driver::{DriverError, ResourceKind, Server, ServerState, Storage, StorageState};
use crate::wait::{StateWait, wait_for_state};

use super::UpCloudDriver;
use super::api::decode;
use super::types::{ServerEnvelope, StorageEnvelope};

impl UpCloudDriver {
    pub(super) async fn fetch_server(&self, server_id: &str) -> Result<Server, DriverError> {
        let path = format!("/server/{server_id}");
        let response = self
            .call(Method::GET, &path, None)
            .await
            .map_err(|failure| {
                if failure.is_not_found() {
                    DriverError::NotFound {
                        resource: ResourceKind::Server,
                        detail: server_id.to_owned(),
                    }
                } else {
                    DriverError::from(failure)
                }
            })?;
        let envelope: ServerEnvelope = decode(&response)?;
        Ok(Server::from(envelope.server))
    }

    pub(super) async fn fetch_storage(&self, storage_id: &str) -> Result<Storage, DriverError> {
        let path = format!("/storage/{storage_id}");
        let response = self
            .call(Method::GET, &path, None)
            .await
            .map_err(|failure| {
                if failure.is_not_found() {
                    DriverError::NotFound {
                        resource: ResourceKind::Storage,
                        detail: storage_id.to_owned(),
                    }
                } else {
                    DriverError::from(failure)
                }
            })?;
        let envelope: StorageEnvelope = decode(&response)?;
        Ok(Storage::from(envelope.storage))
    }

    pub(super) async fn wait_for_server(
        &self,
        server_id: &str,
        target: StateWait<ServerState>,
    ) -> Result<Server, DriverError> {
        wait_for_state(
            ResourceKind::Server,
            server_id,
            &target,
            self.wait,
            &self.cancellation,
            || self.fetch_server(server_id),
            |server: &Server| server.state.clone(),
        )
        .await
    }

    pub(super) async fn wait_for_storage_online(
        &self,
        resource: ResourceKind,
        storage_id: &str,
    ) -> Result<Storage, DriverError> {
        wait_for_state(
            resource,
            storage_id,
            &StateWait::Desired(StorageState::Online),
            self.wait,
            &self.cancellation,
            || self.fetch_storage(storage_id),
            |storage: &Storage| storage.state.clone(),
        )
        .await
    }
}
