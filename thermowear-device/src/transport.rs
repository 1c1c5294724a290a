use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DeviceError;

/// Upper bound for a single request, connect through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Wire operations the heating element supports.
pub trait Transport: Send + Sync {
    fn put_setpoint(&self, setpoint: i32) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn get_temperature(&self) -> impl Future<Output = Result<f64, DeviceError>> + Send;
}

#[derive(Serialize)]
struct SetpointRequest {
    setpoint: i32,
}

#[derive(Deserialize)]
struct TemperatureResponse {
    temperature: f64,
}

/// HTTP transport sharing one connection pool for every request.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `hostname` may omit the scheme, in which case plain HTTP is assumed.
    pub fn new(hostname: &str) -> Self {
        Self::with_timeout(hostname, REQUEST_TIMEOUT)
    }

    /// Like [`HttpTransport::new`], but requests fail with
    /// [`DeviceError::Unreachable`] once `timeout` passes.
    pub fn with_timeout(hostname: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(%err, "could not configure the HTTP client, requests have no timeout");
                reqwest::Client::new()
            });
        Self::with_client(client, hostname)
    }

    pub fn with_client(client: reqwest::Client, hostname: &str) -> Self {
        let trimmed = hostname.trim().trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Transport for HttpTransport {
    async fn put_setpoint(&self, setpoint: i32) -> Result<(), DeviceError> {
        let url = self.endpoint("/api/setpoint");
        debug!(%url, setpoint, "PUT setpoint");

        let response = self
            .client
            .put(&url)
            .json(&SetpointRequest { setpoint })
            .send()
            .await
            .map_err(|source| DeviceError::Unreachable {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(DeviceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn get_temperature(&self) -> Result<f64, DeviceError> {
        let url = self.endpoint("/api/temperature");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| DeviceError::Unreachable {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(DeviceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: TemperatureResponse =
            response
                .json()
                .await
                .map_err(|e| DeviceError::MalformedBody {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        Ok(body.temperature)
    }
}
