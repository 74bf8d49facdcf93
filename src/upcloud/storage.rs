//! Storage operations: source lookup, cloning, templatizing, and deletion.

use reqwest::Method;
use serde_json::json;

use crate::driver::{DriverError, ResourceKind, Storage, StorageSelector, StorageType};

use super::UpCloudDriver;
use super::api::{decode, decode_created};
use super::types::{DEFAULT_TIER, StorageEnvelope, StorageListEnvelope};

impl UpCloudDriver {
    pub(super) async fn locate(&self, selector: &StorageSelector) -> Result<Storage, DriverError> {
        if let Some(uuid) = selector.uuid() {
            return self
                .fetch_storage(uuid)
                .await
                .map_err(|err| DriverError::NotFound {
                    resource: ResourceKind::Storage,
                    detail: format!("uuid {uuid}: {err}"),
                });
        }

        let Some(name) = selector.name() else {
            return Err(DriverError::NotFound {
                resource: ResourceKind::Storage,
                detail: String::from("neither a storage uuid nor a storage name was given"),
            });
        };

        let response = self.call(Method::GET, "/storage/template", None).await?;
        let listing: StorageListEnvelope = decode(&response)?;
        let needle = name.to_lowercase();
        let mut matches = listing
            .storages
            .storage
            .into_iter()
            .map(Storage::from)
            .filter(|storage| {
                storage.kind == StorageType::Template
                    && storage.title.to_lowercase().contains(&needle)
            });

        let Some(found) = matches.next() else {
            return Err(DriverError::NotFound {
                resource: ResourceKind::Storage,
                detail: format!("no template title contains {name:?}"),
            });
        };
        let others: Vec<String> = matches.map(|storage| storage.title).collect();
        if !others.is_empty() {
            tracing::warn!(
                name,
                chosen = %found.title,
                also_matched = ?others,
                "storage name matches several templates; using the first"
            );
        }
        Ok(found)
    }

    pub(super) async fn clone_into_zone(
        &self,
        storage_id: &str,
        zone: &str,
        title: &str,
    ) -> Result<Storage, DriverError> {
        let body = json!({
            "storage": {
                "zone": zone,
                "title": title,
                "tier": DEFAULT_TIER,
            }
        });
        let path = format!("/storage/{storage_id}/clone");
        tracing::info!(storage_id, zone, title, "cloning storage");
        let response = self
            .call(Method::POST, &path, Some(body))
            .await
            .map_err(|failure| DriverError::CreateFailed {
                resource: ResourceKind::Storage,
                message: failure.to_string(),
            })?;
        let created: StorageEnvelope =
            decode_created(&response, ResourceKind::Storage, "/storage/uuid")?;
        let clone = Storage::from(created.storage);
        self.wait_for_storage_online(ResourceKind::Storage, &clone.uuid)
            .await
            .map_err(|err| err.after_create(ResourceKind::Storage, &clone.uuid))
    }

    pub(super) async fn convert_to_template(
        &self,
        storage_id: &str,
        title: &str,
    ) -> Result<Storage, DriverError> {
        // The source disk may still be settling from a clone.
        self.wait_for_storage_online(ResourceKind::Storage, storage_id)
            .await?;

        let body = json!({ "storage": { "title": title } });
        let path = format!("/storage/{storage_id}/templatize");
        tracing::info!(storage_id, title, "creating template");
        let response = self
            .call(Method::POST, &path, Some(body))
            .await
            .map_err(|failure| DriverError::CreateFailed {
                resource: ResourceKind::Template,
                message: failure.to_string(),
            })?;
        let created: StorageEnvelope =
            decode_created(&response, ResourceKind::Template, "/storage/uuid")?;
        let template = Storage::from(created.storage);
        self.wait_for_storage_online(ResourceKind::Template, &template.uuid)
            .await
            .map_err(|err| err.after_create(ResourceKind::Template, &template.uuid))
    }

    pub(super) async fn delete_storage(&self, storage_id: &str) -> Result<(), DriverError> {
        let path = format!("/storage/{storage_id}");
        self.call(Method::DELETE, &path, None)
            .await
            .map_err(|failure| DriverError::DeleteFailed {
                resource: ResourceKind::Template,
                id: storage_id.to_owned(),
                message: failure.to_string(),
            })?;
        Ok(())
    }
}
