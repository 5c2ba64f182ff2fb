//! Key/value cache abstraction used by the tag index

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use cachebust_core::error::{PurgeError, PurgeResult};
use chrono::{DateTime, Utc};

/// Minimal key/value cache
///
/// All methods take `&self`; implementations handle their own locking.
pub trait KeyValueCache: Send + Sync {
    /// Value stored under `key`, or `None` if absent or expired
    fn fetch(&self, key: &str) -> PurgeResult<Option<String>>;

    /// Stores `value`; `None` keeps it until deleted
    fn save(&self, key: &str, value: &str, ttl: Option<Duration>) -> PurgeResult<()>;

    /// Removes `key`; absent keys are not an error
    fn delete(&self, key: &str) -> PurgeResult<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(false)
    }
}

/// In-process key/value cache with per-entry expiry.
///
/// Expired entries read as absent and are dropped on the next write to
/// the same key.
#[derive(Debug, Default)]
pub struct InMemoryKeyValue {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> PurgeResult<usize> {
        let entries = self.entries.read().map_err(|_| PurgeError::StorageLocked)?;
        Ok(entries.values().filter(|entry| !entry.is_expired()).count())
    }

    pub fn is_empty(&self) -> PurgeResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueCache for InMemoryKeyValue {
    fn fetch(&self, key: &str) -> PurgeResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| PurgeError::StorageLocked)?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn save(&self, key: &str, value: &str, ttl: Option<Duration>) -> PurgeResult<()> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl).map_err(|e| {
                    PurgeError::InvalidConfiguration {
                        reason: format!("TTL for \"{}\" is out of range: {}", key, e),
                    }
                })?;
                Some(Utc::now() + ttl)
            }
            None => None,
        };

        let mut entries = self.entries.write().map_err(|_| PurgeError::StorageLocked)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> PurgeResult<()> {
        let mut entries = self.entries.write().map_err(|_| PurgeError::StorageLocked)?;
        entries.remove(key);
        Ok(())
    }
}
