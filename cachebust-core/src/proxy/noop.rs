//! Client that accepts every operation and sends nothing

use async_trait::async_trait;
use http::HeaderMap;

use super::{Banable, ProxyClient, Purgeable, Refreshable, TagCapable};
use crate::error::PurgeResult;

/// Stand-in for environments without a caching proxy
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

#[async_trait]
impl ProxyClient for Noop {
    fn name(&self) -> &str {
        "noop"
    }

    async fn flush(&self) -> PurgeResult<usize> {
        Ok(0)
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
impl Purgeable for Noop {
    async fn purge(&self, _url: &str, _headers: HeaderMap) -> PurgeResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Refreshable for Noop {
    async fn refresh(&self, _url: &str, _headers: HeaderMap) -> PurgeResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Banable for Noop {
    async fn ban(&self, _headers: HeaderMap) -> PurgeResult<()> {
        Ok(())
    }

    async fn ban_path(
        &self,
        _path: &str,
        _content_type: Option<&str>,
        _hosts: &[&str],
    ) -> PurgeResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TagCapable for Noop {
    async fn invalidate_tags(&self, _tags: &[&str]) -> PurgeResult<()> {
        Ok(())
    }
}
