//! Mapping from content digests to cache files

use std::path::{Path, PathBuf};

use cachebust_core::error::{PurgeError, PurgeResult};

/// Resolves a content digest to the file holding the cached body
pub trait CacheStore: Send + Sync {
    /// Fails with `StorageIntegrity` when `digest` is not a plain file name.
    fn path_for(&self, digest: &str) -> PurgeResult<PathBuf>;
}

/// Checks that `digest` is usable as a single path component.
///
/// Digests arrive in response headers, so anything that could climb out
/// of the cache root (separators, `..`, NUL) is rejected.
pub fn validate_digest(digest: &str) -> PurgeResult<()> {
    let reason = if digest.is_empty() {
        "empty content digest"
    } else if digest.contains(['/', '\\', '\0']) {
        "content digest contains a path separator or NUL"
    } else if digest.contains("..") {
        "content digest contains `..`"
    } else {
        return Ok(());
    };

    Err(PurgeError::StorageIntegrity {
        reason: format!("{}: {:?}", reason, digest),
    })
}

/// Content-addressable layout: `root/ab/cd/ef/<rest of digest>`.
///
/// Digests shorter than seven bytes, or not ASCII, are stored directly
/// under the root.
#[derive(Debug, Clone)]
pub struct DigestStore {
    root: PathBuf,
}

impl DigestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CacheStore for DigestStore {
    fn path_for(&self, digest: &str) -> PurgeResult<PathBuf> {
        validate_digest(digest)?;

        if digest.len() < 7 || !digest.is_ascii() {
            return Ok(self.root.join(digest));
        }

        Ok(self
            .root
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(&digest[4..6])
            .join(&digest[6..]))
    }
}
