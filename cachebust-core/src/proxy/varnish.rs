//! Varnish client: PURGE, refresh, BAN and tag bans

use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderValue, CACHE_CONTROL};
use http::HeaderMap;

use super::{chunk_joined, Banable, ProxyClient, Purgeable, Refreshable, TagCapable};
use crate::config::{VarnishConfig, HEADER_CONTENT_TYPE, HEADER_HOST, HEADER_URL};
use crate::dispatcher::HttpDispatcher;
use crate::error::PurgeResult;
use crate::request::{header, InvalidationRequest};

const TAG_PREFIX: &str = "(^|,)(";
const TAG_SUFFIX: &str = ")(,|$)";

/// Varnish caching proxy.
///
/// The VCL is expected to handle `PURGE`, `BAN` with `X-Host`/`X-Url`/
/// `X-Content-Type` regex headers, and `BAN` with a tags header regex.
pub struct Varnish {
    dispatcher: Arc<HttpDispatcher>,
    config: VarnishConfig,
}

impl Varnish {
    pub fn new(dispatcher: Arc<HttpDispatcher>) -> Self {
        Self::with_config(dispatcher, VarnishConfig::default())
    }

    pub fn with_config(dispatcher: Arc<HttpDispatcher>, config: VarnishConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn dispatcher(&self) -> &HttpDispatcher {
        &self.dispatcher
    }

    async fn queue(&self, request: InvalidationRequest) {
        self.dispatcher.enqueue(request).await;
    }

    /// `BAN /` carrying the default ban headers overlaid with `headers`
    fn ban_request(&self, headers: &HeaderMap) -> PurgeResult<InvalidationRequest> {
        let mut request = InvalidationRequest::ban("/")?.without_host_validation();
        for (name, value) in &self.config.default_ban_headers {
            let (name, value) = header(name, value)?;
            request = request.with_header(name, value);
        }
        Ok(request.with_headers(headers))
    }
}

/// Regex matching any of `tags` in a comma-separated tags header
fn tag_regex(tags: &[String], header_length: usize) -> Vec<String> {
    let escaped: Vec<String> = tags.iter().map(|tag| regex::escape(tag)).collect();
    let budget = header_length.saturating_sub(TAG_PREFIX.len() + TAG_SUFFIX.len());

    chunk_joined(&escaped, "|", budget)
        .into_iter()
        .map(|alternation| format!("{}{}{}", TAG_PREFIX, alternation, TAG_SUFFIX))
        .collect()
}

/// Anchored alternation of regex-escaped host names
fn host_regex(hosts: &[&str]) -> String {
    let escaped: Vec<String> = hosts.iter().map(|host| regex::escape(host)).collect();
    format!("^({})$", escaped.join("|"))
}

#[async_trait]
impl ProxyClient for Varnish {
    fn name(&self) -> &str {
        "varnish"
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

    fn as_banable(&self) -> Option<&dyn Banable> {
        Some(self)
    }

    fn as_tag_capable(&self) -> Option<&dyn TagCapable> {
        Some(self)
    }
}

#[async_trait]
impl Purgeable for Varnish {
    async fn purge(&self, url: &str, headers: HeaderMap) -> PurgeResult<()> {
        let request = InvalidationRequest::purge(url)?.with_headers(&headers);
        self.queue(request).await;
        Ok(())
    }
}

#[async_trait]
impl Refreshable for Varnish {
    async fn refresh(&self, url: &str, headers: HeaderMap) -> PurgeResult<()> {
        let request = InvalidationRequest::refresh(url)?
            .with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .with_headers(&headers);
        self.queue(request).await;
        Ok(())
    }
}

#[async_trait]
impl Banable for Varnish {
    async fn ban(&self, headers: HeaderMap) -> PurgeResult<()> {
        let request = self.ban_request(&headers)?;
        self.queue(request).await;
        Ok(())
    }

    async fn ban_path(
        &self,
        path: &str,
        content_type: Option<&str>,
        hosts: &[&str],
    ) -> PurgeResult<()> {
        let mut headers = HeaderMap::new();

        let (name, value) = header(HEADER_URL, path)?;
        headers.insert(name, value);

        if let Some(content_type) = content_type {
            let (name, value) = header(HEADER_CONTENT_TYPE, content_type)?;
            headers.insert(name, value);
        }

        if !hosts.is_empty() {
            let (name, value) = header(HEADER_HOST, &host_regex(hosts))?;
            headers.insert(name, value);
        }

        self.ban(headers).await
    }
}

#[async_trait]
impl TagCapable for Varnish {
    async fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let tags: Vec<String> = tags.iter().map(|tag| tag.to_string()).collect();
        for pattern in tag_regex(&tags, self.config.header_length) {
            let (name, value) = header(&self.config.tags_header, &pattern)?;
            let request = InvalidationRequest::ban("/")?
                .without_host_validation()
                .with_header(name, value);
            self.queue(request).await;
        }
        Ok(())
    }
}
