//! Nginx client: PURGE and refresh

use std::sync::Arc;

use async_trait::async_trait;
use http::uri::PathAndQuery;
use http::{HeaderMap, Uri};

use super::{ProxyClient, Purgeable, Refreshable};
use crate::config::NginxConfig;
use crate::dispatcher::HttpDispatcher;
use crate::error::{PurgeError, PurgeResult};
use crate::request::{header, parse_uri, InvalidationMethod, InvalidationRequest};

/// Nginx with the `ngx_cache_purge` module
pub struct Nginx {
    dispatcher: Arc<HttpDispatcher>,
    config: NginxConfig,
}

impl Nginx {
    pub fn new(dispatcher: Arc<HttpDispatcher>) -> Self {
        Self::with_config(dispatcher, NginxConfig::default())
    }

    pub fn with_config(dispatcher: Arc<HttpDispatcher>, config: NginxConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Moves the URL under the purge location, if one is configured
    fn purge_uri(&self, url: &str) -> PurgeResult<Uri> {
        let uri = parse_uri(url)?;
        let Some(location) = self.config.purge_location.as_deref() else {
            return Ok(uri);
        };

        let path = format!(
            "/{}/{}",
            location.trim_matches('/'),
            uri.path().trim_start_matches('/')
        );
        let path_and_query = match uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };

        let mut parts = uri.into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(path_and_query.as_str()).map_err(
            |e| PurgeError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            },
        )?);
        Uri::from_parts(parts).map_err(|e| PurgeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ProxyClient for Nginx {
    fn name(&self) -> &str {
        "nginx"
    }

    async fn flush(&self) -> PurgeResult<usize> {
        self.dispatcher.flush().await
    }

    fn as_purgeable(&self) -> Option<&dyn Purgeable> {
        Some(self)
    }

    fn as_refreshable(&self) -> Option<&dyn Refreshable> {
        Some(self)
    }
}

#[async_trait]
impl Purgeable for Nginx {
    async fn purge(&self, url: &str, headers: HeaderMap) -> PurgeResult<()> {
        let request = InvalidationRequest::new(InvalidationMethod::Purge, self.purge_uri(url)?)
            .with_headers(&headers);
        self.dispatcher.enqueue(request).await;
        Ok(())
    }
}

#[async_trait]
impl Refreshable for Nginx {
    async fn refresh(&self, url: &str, headers: HeaderMap) -> PurgeResult<()> {
        let (name, value) = header(&self.config.refresh_header, "1")?;
        let request = InvalidationRequest::refresh(url)?
            .with_header(name, value)
            .with_headers(&headers);
        self.dispatcher.enqueue(request).await;
        Ok(())
    }
}
