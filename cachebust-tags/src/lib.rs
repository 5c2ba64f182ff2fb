//! Cachebust Tags - tag-based invalidation of locally stored cache entries
//!
//! Where a caching proxy is embedded in the application and stores its
//! bodies on disk, tags can be invalidated directly: an index maps each
//! tag to content digests, and a [`CacheStore`] maps each digest to the
//! file holding the body.
//!
//! Two index strategies implement [`TagManager`]:
//! - [`KvTagManager`]: JSON lists in a [`KeyValueCache`], keyed `tag:<tag>`
//! - [`SymlinkTagManager`]: one directory per tag holding symlinks (unix)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cachebust_tags::{DigestStore, InMemoryKeyValue, KvTagManager, TagManager, TagStorage};
//!
//! let storage = TagStorage::new(Arc::new(InMemoryKeyValue::new()));
//! let manager = KvTagManager::new(storage, Arc::new(DigestStore::new("/var/cache/http")));
//!
//! manager.tag_response(&response_headers)?;
//! let removed = manager.invalidate_tags(&["product-42"])?;
//! ```

pub mod config;
pub mod kv;
pub mod manager;
pub mod storage;
pub mod store;
#[cfg(unix)]
pub mod symlink;

pub use cachebust_core::error::{PurgeError, PurgeResult};
pub use config::{SymlinkStorageConfig, TagManagerConfig};
pub use kv::{InMemoryKeyValue, KeyValueCache};
pub use manager::{KvTagManager, TagManager};
pub use storage::TagStorage;
pub use store::{validate_digest, CacheStore, DigestStore};
#[cfg(unix)]
pub use symlink::{escape_tag, SymlinkTagManager};
