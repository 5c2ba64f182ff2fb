//! Symfony HttpCache client

use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderValue, CACHE_CONTROL};
use http::HeaderMap;

use super::{chunk_joined, ProxyClient, Purgeable, Refreshable, TagCapable};
use crate::config::SymfonyConfig;
use crate::dispatcher::HttpDispatcher;
use crate::error::PurgeResult;
use crate::request::{header, InvalidationMethod, InvalidationRequest};

/// Symfony's embedded reverse proxy, with the purge and tag subscribers
/// enabled on the application side
pub struct Symfony {
    dispatcher: Arc<HttpDispatcher>,
    config: SymfonyConfig,
    tags_method: InvalidationMethod,
}

impl Symfony {
    pub fn new(dispatcher: Arc<HttpDispatcher>) -> PurgeResult<Self> {
        Self::with_config(dispatcher, SymfonyConfig::default())
    }

    /// Fails if the configured tags method is not a valid HTTP token
    pub fn with_config(dispatcher: Arc<HttpDispatcher>, config: SymfonyConfig) -> PurgeResult<Self> {
        let tags_method = InvalidationMethod::parse(&config.tags_method)?;
        Ok(Self {
            dispatcher,
            config,
            tags_method,
        })
    }
}

#[async_trait]
impl ProxyClient for Symfony {
    fn name(&self) -> &str {
        "symfony"
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

    fn as_tag_capable(&self) -> Option<&dyn TagCapable> {
        Some(self)
    }
}

#[async_trait]
impl Purgeable for Symfony {
    async fn purge(&self, url: &str, headers: HeaderMap) -> PurgeResult<()> {
        let request = InvalidationRequest::purge(url)?.with_headers(&headers);
        self.dispatcher.enqueue(request).await;
        Ok(())
    }
}

#[async_trait]
impl Refreshable for Symfony {
    async fn refresh(&self, url: &str, headers: HeaderMap) -> PurgeResult<()> {
        let request = InvalidationRequest::refresh(url)?
            .with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .with_headers(&headers);
        self.dispatcher.enqueue(request).await;
        Ok(())
    }
}

#[async_trait]
impl TagCapable for Symfony {
    async fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<()> {
        let tags: Vec<String> = tags.iter().map(|tag| tag.to_string()).collect();

        for joined in chunk_joined(&tags, ",", self.config.header_length) {
            let (name, value) = header(&self.config.tags_header, &joined)?;
            let request = InvalidationRequest::parse(self.tags_method.as_str(), "/")?
                .without_host_validation()
                .with_header(name, value);
            self.dispatcher.enqueue(request).await;
        }
        Ok(())
    }
}
