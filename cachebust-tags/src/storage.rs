//! Tag index kept in a key/value cache

use std::sync::Arc;
use std::time::Duration;

use cachebust_core::error::PurgeResult;

use crate::kv::KeyValueCache;

const TAG_KEY_PREFIX: &str = "tag:";

/// Maps each tag to the JSON list of cache identifiers carrying it.
///
/// Updates are read-modify-write on one key per tag and are not atomic
/// across processes sharing the same key/value backend.
pub struct TagStorage {
    cache: Arc<dyn KeyValueCache>,
}

impl TagStorage {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    fn key(tag: &str) -> String {
        format!("{}{}", TAG_KEY_PREFIX, tag)
    }

    /// Identifiers stored for one tag; `None` if the tag has no entry
    fn ids_for(&self, tag: &str) -> PurgeResult<Option<Vec<String>>> {
        match self.cache.fetch(&Self::key(tag))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Records that `id` carries every tag in `tags`.
    ///
    /// An identifier already listed for a tag is not added twice. The
    /// whole tag entry is rewritten with `ttl`.
    pub fn tag_cache_id(&self, tags: &[&str], id: &str, ttl: Option<Duration>) -> PurgeResult<()> {
        for tag in tags {
            let mut ids = self.ids_for(tag)?.unwrap_or_default();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }

            let encoded = serde_json::to_string(&ids)?;
            self.cache.save(&Self::key(tag), &encoded, ttl)?;
        }
        Ok(())
    }

    /// Deletes the index entries of `tags`
    pub fn remove_tags(&self, tags: &[&str]) -> PurgeResult<()> {
        for tag in tags {
            self.cache.delete(&Self::key(tag))?;
        }
        Ok(())
    }

    /// Identifiers of every tag in `tags`, in tag order.
    ///
    /// Tags without an entry contribute nothing. An identifier listed
    /// under several tags is returned once per tag. A stored entry that is
    /// not a JSON string array is an error.
    pub fn get_cache_ids(&self, tags: &[&str]) -> PurgeResult<Vec<String>> {
        let mut ids = Vec::new();
        for tag in tags {
            if let Some(tag_ids) = self.ids_for(tag)? {
                ids.extend(tag_ids);
            }
        }
        Ok(ids)
    }
}
