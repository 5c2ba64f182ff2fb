//! Proxy clients and the invalidation capabilities they offer
//!
//! Each client translates high-level operations into invalidation
//! requests for one proxy flavour and queues them on an
//! [`HttpDispatcher`](crate::dispatcher::HttpDispatcher). Nothing is sent
//! until `flush` is called.
//!
//! | Client    | purge | refresh | ban | tags |
//! |-----------|-------|---------|-----|------|
//! | Varnish   | yes   | yes     | yes | yes  |
//! | Nginx     | yes   | yes     |     |      |
//! | Symfony   | yes   | yes     |     | yes  |
//! | Noop      | yes   | yes     | yes | yes  |

mod nginx;
mod noop;
mod symfony;
mod varnish;

pub use nginx::Nginx;
pub use noop::Noop;
pub use symfony::Symfony;
pub use varnish::Varnish;

use async_trait::async_trait;
use http::HeaderMap;

use crate::error::PurgeResult;

/// A caching proxy that can be told to drop content
#[async_trait]
pub trait ProxyClient: Send + Sync {
    /// Client name (for logging and error messages)
    fn name(&self) -> &str;

    /// Send all queued requests; see [`HttpDispatcher::flush`](crate::dispatcher::HttpDispatcher::flush)
    async fn flush(&self) -> PurgeResult<usize>;

    fn as_purgeable(&self) -> Option<&dyn Purgeable> {
        None
    }

    fn as_refreshable(&self) -> Option<&dyn Refreshable> {
        None
    }

    fn as_banable(&self) -> Option<&dyn Banable> {
        None
    }

    fn as_tag_capable(&self) -> Option<&dyn TagCapable> {
        None
    }
}

/// Removes one URL, with all its variants, from the cache
#[async_trait]
pub trait Purgeable: Send + Sync {
    async fn purge(&self, url: &str, headers: HeaderMap) -> PurgeResult<()>;
}

/// Fetches one URL again so the cached copy is replaced
#[async_trait]
pub trait Refreshable: Send + Sync {
    async fn refresh(&self, url: &str, headers: HeaderMap) -> PurgeResult<()>;
}

/// Removes every entry whose host, URL and content type match patterns
#[async_trait]
pub trait Banable: Send + Sync {
    /// Ban with raw pattern headers
    async fn ban(&self, headers: HeaderMap) -> PurgeResult<()>;

    /// Ban by URL regex, optionally narrowed to a content type regex and
    /// a set of hosts
    async fn ban_path(
        &self,
        path: &str,
        content_type: Option<&str>,
        hosts: &[&str],
    ) -> PurgeResult<()>;
}

/// Removes every entry carrying one of the given tags
#[async_trait]
pub trait TagCapable: Send + Sync {
    async fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<()>;
}

/// Joins `items` with `separator` into as few strings as possible, each
/// no longer than `budget` bytes. An item longer than the budget on its
/// own gets a string of its own.
pub(crate) fn chunk_joined(items: &[String], separator: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for item in items {
        if !current.is_empty() && current.len() + separator.len() + item.len() > budget {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(separator);
        }
        current.push_str(item);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
