//! Tag index kept as symlinks on the filesystem
//!
//! Each tag is a directory under the tag root; each tagged entry is a
//! symlink in that directory, named after the digest and pointing at the
//! cache file.
//!
//! Concurrent invalidation of the same tag from several processes is not
//! atomic. Both may try to remove the same files; a file that is already
//! gone is not an error.

use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cachebust_core::error::{PurgeError, PurgeResult};

use crate::config::SymlinkStorageConfig;
use crate::manager::{remove_cache_file, TagManager};
use crate::store::{validate_digest, CacheStore};

/// Turns a tag into a directory name.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`. The mapping is
/// lossy: `a/b`, `a.b` and `a_b` share one directory, so invalidating any
/// of them invalidates all three.
///
/// The result is never empty: the empty tag maps to `_`, so a tag
/// directory is always a child of the tag root and never the root itself.
pub fn escape_tag(tag: &str) -> String {
    if tag.is_empty() {
        return "_".to_string();
    }
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Tag manager backed by symlink directories
pub struct SymlinkTagManager {
    tag_dir: PathBuf,
    store: Arc<dyn CacheStore>,
}

impl SymlinkTagManager {
    pub fn new(config: SymlinkStorageConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            tag_dir: config.tag_dir,
            store,
        }
    }

    /// Directory holding the links of `tag`
    pub fn tag_path(&self, tag: &str) -> PathBuf {
        self.tag_dir.join(escape_tag(tag))
    }

    /// Links the cache file of `digest` under `tag`.
    ///
    /// A link that already points at the same file is left alone; a link
    /// pointing anywhere else is replaced. Returns the link path.
    pub fn create_tag(&self, tag: &str, digest: &str) -> PurgeResult<PathBuf> {
        // The digest becomes a link name, whatever the store accepts.
        validate_digest(digest)?;
        let target = absolute(&self.store.path_for(digest)?)?;

        let dir = self.tag_path(tag);
        std::fs::create_dir_all(&dir).map_err(|e| PurgeError::io(dir.display(), e))?;
        let link = dir.join(digest);

        match std::fs::read_link(&link) {
            Ok(existing) if existing == target => return Ok(link),
            Ok(existing) => {
                tracing::debug!(
                    link = %link.display(),
                    stale = %existing.display(),
                    "Replacing stale tag link"
                );
                std::fs::remove_file(&link).map_err(|e| PurgeError::io(link.display(), e))?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(PurgeError::io(link.display(), e)),
        }

        symlink(&target, &link).map_err(|e| PurgeError::io(link.display(), e))?;
        tracing::debug!(tag = tag, digest = digest, link = %link.display(), "Created tag link");
        Ok(link)
    }

    /// Cache files currently linked under `tag`, in link name order.
    ///
    /// A tag that was never created has no paths.
    pub fn paths_for_tag(&self, tag: &str) -> PurgeResult<Vec<PathBuf>> {
        let dir = self.tag_path(tag);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PurgeError::io(dir.display(), e)),
        };

        let mut links = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PurgeError::io(dir.display(), e))?;
            links.push(entry.path());
        }
        links.sort();

        let mut paths = Vec::with_capacity(links.len());
        for link in links {
            match std::fs::read_link(&link) {
                Ok(target) if target.is_relative() => paths.push(dir.join(target)),
                Ok(target) => paths.push(target),
                // Not a symlink.
                Err(e) if e.kind() == ErrorKind::InvalidInput => {
                    tracing::debug!(path = %link.display(), "Ignoring non-link entry in tag directory");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(PurgeError::io(link.display(), e)),
            }
        }
        Ok(paths)
    }
}

impl TagManager for SymlinkTagManager {
    fn invalidate_tags(&self, tags: &[&str]) -> PurgeResult<usize> {
        let mut removed = 0;

        for tag in tags {
            for path in self.paths_for_tag(tag)? {
                if remove_cache_file(&path)? {
                    removed += 1;
                }
            }

            let dir = self.tag_path(tag);
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(PurgeError::io(dir.display(), e)),
            }
        }

        tracing::debug!(tags = ?tags, removed = removed, "Invalidated tags");
        Ok(removed)
    }
}

fn absolute(path: &Path) -> PurgeResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| PurgeError::io(path.display(), e))?;
    Ok(cwd.join(path))
}
