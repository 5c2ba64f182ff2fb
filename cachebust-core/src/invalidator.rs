//! Capability-checked entry point for application code

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{PurgeError, PurgeResult};
use crate::proxy::ProxyClient;

/// Operations a proxy client may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Purge,
    Refresh,
    Ban,
    Tags,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Purge => "purge",
            Capability::Refresh => "refresh",
            Capability::Ban => "ban",
            Capability::Tags => "tags",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wraps one proxy client and turns missing capabilities into
/// [`PurgeError::UnsupportedOperation`].
///
/// Operations only queue requests; call [`flush`](Self::flush) to send.
#[derive(Clone)]
pub struct CacheInvalidator {
    client: Arc<dyn ProxyClient>,
}

impl fmt::Debug for CacheInvalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheInvalidator")
            .field("client", &self.client.name())
            .finish()
    }
}

impl CacheInvalidator {
    pub fn new(client: Arc<dyn ProxyClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &dyn ProxyClient {
        self.client.as_ref()
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Purge => self.client.as_purgeable().is_some(),
            Capability::Refresh => self.client.as_refreshable().is_some(),
            Capability::Ban => self.client.as_banable().is_some(),
            Capability::Tags => self.client.as_tag_capable().is_some(),
        }
    }

    fn unsupported(&self, operation: &'static str) -> PurgeError {
        PurgeError::UnsupportedOperation {
            operation,
            client: self.client.name().to_string(),
        }
    }

    /// Purge one path or absolute URL
    pub async fn invalidate_path(&self, path: &str, headers: HeaderMap) -> PurgeResult<&Self> {
        let purgeable = self
            .client
            .as_purgeable()
            .ok_or_else(|| self.unsupported("invalidate_path"))?;
        purgeable.purge(path, headers).await?;
        Ok(self)
    }

    /// Refresh one path or absolute URL
    pub async fn refresh_path(&self, path: &str, headers: HeaderMap) -> PurgeResult<&Self> {
        let refreshable = self
            .client
            .as_refreshable()
            .ok_or_else(|| self.unsupported("refresh_path"))?;
        refreshable.refresh(path, headers).await?;
        Ok(self)
    }

    /// Ban with raw pattern headers
    pub async fn invalidate(&self, headers: HeaderMap) -> PurgeResult<&Self> {
        let banable = self
            .client
            .as_banable()
            .ok_or_else(|| self.unsupported("invalidate"))?;
        banable.ban(headers).await?;
        Ok(self)
    }

    /// Ban every URL matching `path`, optionally narrowed by content type
    /// and hosts
    pub async fn invalidate_regex(
        &self,
        path: &str,
        content_type: Option<&str>,
        hosts: &[&str],
    ) -> PurgeResult<&Self> {
        let banable = self
            .client
            .as_banable()
            .ok_or_else(|| self.unsupported("invalidate_regex"))?;
        banable.ban_path(path, content_type, hosts).await?;
        Ok(self)
    }

    pub async fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<&Self> {
        let tag_capable = self
            .client
            .as_tag_capable()
            .ok_or_else(|| self.unsupported("invalidate_tags"))?;
        tag_capable.invalidate_tags(tags).await?;
        Ok(self)
    }

    /// Send everything queued on the client
    pub async fn flush(&self) -> PurgeResult<usize> {
        match self.client.flush().await {
            Ok(count) => {
                tracing::info!(client = self.client.name(), requests = count, "Invalidation flushed");
                Ok(count)
            }
            Err(PurgeError::Flush(errors)) => {
                for error in &errors {
                    match error.status() {
                        Some(status) => tracing::warn!(
                            client = self.client.name(),
                            server = error.server(),
                            status = status.as_u16(),
                            "Proxy rejected invalidation request"
                        ),
                        None => tracing::warn!(
                            client = self.client.name(),
                            server = error.server(),
                            error = %error,
                            "Proxy unavailable for invalidation request"
                        ),
                    }
                }
                Err(PurgeError::Flush(errors))
            }
            Err(e) => Err(e),
        }
    }
}
