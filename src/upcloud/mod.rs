//! UpCloud implementation of the [`Driver`] trait.

mod api;
mod server;
mod storage;
mod types;
mod wait;


use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::cancel::Cancellation;
use crate::driver::{
    CreateServerRequest, Driver, DriverError, DriverFuture, Server, Storage, StorageDevice,
    StorageSelector,
};
use crate::wait::WaitOptions;

use api::{ApiFailure, ApiResponse, HttpTransport, Transport};

pub use api::{DEFAULT_API_URL, UpCloudCredentials};

/// Driver that manages servers and storages through the UpCloud API.
#[derive(Clone)]
pub struct UpCloudDriver {
    transport: Arc<dyn Transport>,
    wait: WaitOptions,
    cancellation: Cancellation,
}

impl UpCloudDriver {
    /// Creates a driver talking to the production API.
    ///
    /// `state_timeout` bounds every state wait.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Provider`] when the HTTP client cannot be
    /// constructed.
    pub fn new(
        credentials: UpCloudCredentials,
        state_timeout: Duration,
    ) -> Result<Self, DriverError> {
        Self::with_endpoint(credentials, DEFAULT_API_URL, state_timeout)
    }

    /// Creates a driver talking to an alternative API root.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Provider`] when the HTTP client cannot be
    /// constructed.
    pub fn with_endpoint(
        credentials: UpCloudCredentials,
        base_url: &str,
        state_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let transport = HttpTransport::new(credentials, base_url)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            WaitOptions::with_timeout(state_timeout),
        ))
    }

    pub(crate) fn with_transport(transport: Arc<dyn Transport>, wait: WaitOptions) -> Self {
        Self {
            transport,
            wait,
            cancellation: Cancellation::never(),
        }
    }

    /// Makes state waits observe `cancellation`.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Overrides the interval between state fetches.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.wait.poll_interval = poll_interval;
        self
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ApiFailure> {
        self.transport.send(method, path, body).await
    }
}

impl Driver for UpCloudDriver {
    fn locate_source_storage<'a>(
        &'a self,
        selector: &'a StorageSelector,
    ) -> DriverFuture<'a, Storage> {
        Box::pin(async move { self.locate(selector).await })
    }

    fn create_server<'a>(
        &'a self,
        request: &'a CreateServerRequest,
    ) -> DriverFuture<'a, Server> {
        Box::pin(async move { self.create(request).await })
    }

    fn stop_server<'a>(&'a self, server_id: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move { self.stop(server_id).await })
    }

    fn delete_server<'a>(&'a self, server_id: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move { self.delete_with_storages(server_id).await })
    }

    fn boot_disk<'a>(&'a self, server_id: &'a str) -> DriverFuture<'a, StorageDevice> {
        Box::pin(async move { self.find_boot_disk(server_id).await })
    }

    fn clone_storage<'a>(
        &'a self,
        storage_id: &'a str,
        zone: &'a str,
        title: &'a str,
    ) -> DriverFuture<'a, Storage> {
        Box::pin(async move { self.clone_into_zone(storage_id, zone, title).await })
    }

    fn templatize<'a>(
        &'a self,
        storage_id: &'a str,
        title: &'a str,
    ) -> DriverFuture<'a, Storage> {
        Box::pin(async move { self.convert_to_template(storage_id, title).await })
    }

    fn delete_template<'a>(&'a self, template_id: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move { self.delete_storage(template_id).await })
    }
}
