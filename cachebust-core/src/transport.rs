//! Transport backends that put invalidation requests on the wire

use std::time::Duration;

use async_trait::async_trait;
use http::{Request, StatusCode};
use thiserror::Error;

use crate::error::{PurgeError, PurgeResult};

/// Answer from a caching proxy
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Failure to get any answer from a caching proxy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure or timeout
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("{0}")]
    Other(String),
}

/// Transport backend interface
///
/// Implementations must allow many `send` calls to be in flight at once;
/// the dispatcher drives them concurrently.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Send a request and wait for the proxy's answer
    async fn send(&self, request: Request<()>) -> Result<TransportResponse, TransportError>;
}

/// HTTP transport backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> PurgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PurgeError::InvalidConfiguration {
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    async fn send(&self, request: Request<()>) -> Result<TransportResponse, TransportError> {
        let (parts, ()) = request.into_parts();

        // An explicit Host header wins over the URL's authority, so the
        // proxy sees the application host.
        let response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(status = %status, error = %e, "Failed to read proxy response body");
                unreadable_body(&e)
            }
        };

        Ok(TransportResponse { status, body })
    }
}

/// Body text standing in for one that could not be read
fn unreadable_body(error: &reqwest::Error) -> String {
    format!("<unreadable response body: {}>", error)
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_connect() || error.is_timeout() {
        TransportError::Unreachable(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
