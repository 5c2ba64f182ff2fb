//! Configuration for dispatchers and proxy clients

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where invalidation requests are sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Caching proxy instances (`scheme://host:port`, scheme optional)
    pub servers: Vec<String>,

    /// Application base URI used to complete relative requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_timeout() -> u64 { 30000 }
fn default_tags_header() -> String { "X-Cache-Tags".to_string() }
fn default_header_length() -> usize { 7500 }
fn default_tags_method() -> String { "PURGETAGS".to_string() }
fn default_refresh_header() -> String { "X-Refresh".to_string() }

impl DispatcherConfig {
    pub fn new<S: Into<String>>(servers: impl IntoIterator<Item = S>) -> Self {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            base_uri: None,
            timeout_ms: default_timeout(),
        }
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Varnish ban and tag settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarnishConfig {
    /// Header carrying the tag regex on BAN requests
    #[serde(default = "default_tags_header")]
    pub tags_header: String,

    /// Longest tag header value sent in one request
    #[serde(default = "default_header_length")]
    pub header_length: usize,

    /// Headers every BAN starts from, overridden per call
    #[serde(default = "default_ban_headers")]
    pub default_ban_headers: BTreeMap<String, String>,
}

pub const HEADER_HOST: &str = "X-Host";
pub const HEADER_URL: &str = "X-Url";
pub const HEADER_CONTENT_TYPE: &str = "X-Content-Type";

fn default_ban_headers() -> BTreeMap<String, String> {
    [HEADER_HOST, HEADER_URL, HEADER_CONTENT_TYPE]
        .into_iter()
        .map(|name| (name.to_string(), ".*".to_string()))
        .collect()
}

impl Default for VarnishConfig {
    fn default() -> Self {
        Self {
            tags_header: default_tags_header(),
            header_length: default_header_length(),
            default_ban_headers: default_ban_headers(),
        }
    }
}

/// Nginx purge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxConfig {
    /// Path prefix of a dedicated purge location (e.g. `/purge`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_location: Option<String>,

    /// Header that makes the nginx config bypass its cache
    #[serde(default = "default_refresh_header")]
    pub refresh_header: String,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            purge_location: None,
            refresh_header: default_refresh_header(),
        }
    }
}

/// Symfony HttpCache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymfonyConfig {
    /// Method of the tag invalidation request
    #[serde(default = "default_tags_method")]
    pub tags_method: String,

    /// Header listing the tags to invalidate
    #[serde(default = "default_tags_header")]
    pub tags_header: String,

    #[serde(default = "default_header_length")]
    pub header_length: usize,
}

impl Default for SymfonyConfig {
    fn default() -> Self {
        Self {
            tags_method: default_tags_method(),
            tags_header: default_tags_header(),
            header_length: default_header_length(),
        }
    }
}
