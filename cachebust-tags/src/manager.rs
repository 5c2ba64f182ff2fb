//! Tag managers that remove tagged cache files directly

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cachebust_core::error::{PurgeError, PurgeResult};
use http::header::CACHE_CONTROL;
use http::HeaderMap;

use crate::config::TagManagerConfig;
use crate::storage::TagStorage;
use crate::store::{validate_digest, CacheStore};

/// Invalidates cached entries by tag, without going through a proxy
pub trait TagManager: Send + Sync {
    /// Removes every cache file carrying one of `tags` and forgets the
    /// tags. Returns the number of files actually removed.
    fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<usize>;
}

/// Removes a cache file; returns false if it was already gone
pub(crate) fn remove_cache_file(path: &Path) -> PurgeResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PurgeError::io(path.display(), e)),
    }
}

/// Tag manager backed by a [`TagStorage`] index
pub struct KvTagManager {
    storage: TagStorage,
    store: Arc<dyn CacheStore>,
    config: TagManagerConfig,
}

impl KvTagManager {
    pub fn new(storage: TagStorage, store: Arc<dyn CacheStore>) -> Self {
        Self::with_config(storage, store, TagManagerConfig::default())
    }

    pub fn with_config(storage: TagStorage, store: Arc<dyn CacheStore>, config: TagManagerConfig) -> Self {
        Self {
            storage,
            store,
            config,
        }
    }

    pub fn storage(&self) -> &TagStorage {
        &self.storage
    }

    /// Indexes a cached response under the tags it declares.
    ///
    /// Both the digest and the tags header must be present; the tags
    /// header is a JSON array of strings. A digest that is not a plain
    /// file name is a `StorageIntegrity` error. The index entry expires with the
    /// response's shared max age, or never if it has none.
    pub fn tag_response(&self, headers: &HeaderMap) -> PurgeResult<()> {
        let digest = required_header(headers, &self.config.digest_header)?;
        validate_digest(digest)?;
        let raw_tags = required_header(headers, &self.config.tags_header)?;

        let tags: Vec<String> = serde_json::from_str(raw_tags)?;
        if tags.is_empty() {
            return Ok(());
        }

        let ttl = shared_max_age(headers);
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        self.storage.tag_cache_id(&tags, digest, ttl)?;

        tracing::debug!(digest = digest, tags = ?tags, ttl_secs = ?ttl.map(|t| t.as_secs()), "Tagged cached response");
        Ok(())
    }
}

impl TagManager for KvTagManager {
    fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<usize> {
        let mut removed = 0;
        for id in self.storage.get_cache_ids(tags)? {
            if remove_cache_file(&self.store.path_for(&id)?)? {
                removed += 1;
            }
        }
        self.storage.remove_tags(tags)?;

        tracing::debug!(tags = ?tags, removed = removed, "Invalidated tags");
        Ok(removed)
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> PurgeResult<&'a str> {
    let value = headers.get(name).ok_or_else(|| PurgeError::StorageIntegrity {
        reason: format!("response has no {} header", name),
    })?;
    value.to_str().map_err(|e| PurgeError::StorageIntegrity {
        reason: format!("{} header is not valid text: {}", name, e),
    })
}

/// `s-maxage`, falling back to `max-age`, from Cache-Control
fn shared_max_age(headers: &HeaderMap) -> Option<Duration> {
    let mut s_maxage = None;
    let mut max_age = None;

    for value in headers.get_all(CACHE_CONTROL) {
        let Ok(value) = value.to_str() else { continue };
        for directive in value.split(',') {
            let Some((name, seconds)) = directive.trim().split_once('=') else { continue };
            let Ok(seconds) = seconds.trim().trim_matches('"').parse::<u64>() else { continue };

            if name.trim().eq_ignore_ascii_case("s-maxage") {
                s_maxage = Some(seconds);
            } else if name.trim().eq_ignore_ascii_case("max-age") {
                max_age = Some(seconds);
            }
        }
    }

    s_maxage.or(max_age).map(Duration::from_secs)
}
