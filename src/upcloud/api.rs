//! HTTP transport for the UpCloud REST API.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::driver::{DriverError, ResourceKind};

/// Production API root.
pub const DEFAULT_API_URL: &str = "https://api.upcloud.com/1.3";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// API account credentials.
#[derive(Clone, Eq, PartialEq)]
pub struct UpCloudCredentials {
    /// API user name.
    pub username: String,
    /// API password.
    pub password: String,
}

impl fmt::Debug for UpCloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpCloudCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub(crate) type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ApiResponse, ApiFailure>> + Send + 'a>>;

/// Raw response with its status code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ApiResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

/// Request that did not produce a successful response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ApiFailure {
    /// HTTP status when a response arrived at all.
    pub(crate) status: Option<u16>,
    pub(crate) message: String,
}

impl ApiFailure {
    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self.status, Some(404))
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<ApiFailure> for DriverError {
    fn from(value: ApiFailure) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    error_code: String,
    error_message: String,
}

/// Turns a non-success response into an [`ApiFailure`], preferring the
/// provider's structured error message.
pub(crate) fn failure_from_response(response: &ApiResponse) -> ApiFailure {
    let message = serde_json::from_str::<ErrorEnvelope>(&response.body).map_or_else(
        |_| {
            let body = response.body.trim();
            if body.is_empty() {
                String::from("empty error response")
            } else {
                body.to_owned()
            }
        },
        |envelope| {
            format!(
                "{}: {}",
                envelope.error.error_code, envelope.error.error_message
            )
        },
    );
    ApiFailure {
        status: Some(response.status),
        message,
    }
}

/// Decodes a successful response body.
pub(crate) fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, DriverError> {
    serde_json::from_str(&response.body).map_err(DriverError::from)
}

/// Decodes the reply to a create call. A body that fails to decode but
/// still names the new resource at `id_pointer` yields an error carrying
/// that id.
pub(crate) fn decode_created<T: DeserializeOwned>(
    response: &ApiResponse,
    resource: ResourceKind,
    id_pointer: &str,
) -> Result<T, DriverError> {
    decode(response).map_err(|err| {
        let created = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|body| {
                body.pointer(id_pointer)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            });
        match created {
            Some(id) => err.after_create(resource, &id),
            None => err,
        }
    })
}

/// Sends one request and returns the raw response.
pub(crate) trait Transport: Send + Sync {
    fn send<'a>(&'a self, method: Method, path: &'a str, body: Option<Value>)
    -> TransportFuture<'a>;
}

/// [`Transport`] backed by `reqwest` with HTTP basic authentication.
pub(crate) struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: UpCloudCredentials,
}

impl HttpTransport {
    pub(crate) fn new(
        credentials: UpCloudCredentials,
        base_url: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credentials,
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        method: Method,
        path: &'a str,
        body: Option<Value>,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            let url = format!("{}{path}", self.base_url);
            tracing::debug!(%method, %url, "upcloud request");
            let mut request = self
                .client
                .request(method, &url)
                .basic_auth(&self.credentials.username, Some(&self.credentials.password))
                .header(ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(&body);
            }
            let response = request.send().await.map_err(|err| ApiFailure {
                status: None,
                message: err.to_string(),
            })?;
            let status = response.status();
            let body = response.text().await.map_err(|err| ApiFailure {
                status: Some(status.as_u16()),
                message: err.to_string(),
            })?;
            let response = ApiResponse {
                status: status.as_u16(),
                body,
            };
            if status.is_success() {
                Ok(response)
            } else {
                Err(failure_from_response(&response))
            }
        })
    }
}
