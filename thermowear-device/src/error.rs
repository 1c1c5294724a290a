use thiserror::Error;

/// Failures talking to the heating element. None of them are retried here.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("could not reach heating element at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("heating element at {url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {reason}")]
    MalformedBody { url: String, reason: String },
}

impl DeviceError {
    /// Endpoint the failed request went to.
    pub fn url(&self) -> &str {
        match self {
            DeviceError::Unreachable { url, .. }
            | DeviceError::Status { url, .. }
            | DeviceError::MalformedBody { url, .. } => url,
        }
    }
}
