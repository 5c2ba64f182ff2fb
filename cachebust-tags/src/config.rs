//! Tag manager configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_digest_header() -> String { "X-Content-Digest".to_string() }
fn default_tags_header() -> String { "X-Cache-Tags".to_string() }

/// Response headers read when tagging a cached response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagManagerConfig {
    /// Header carrying the digest of the cached body
    #[serde(default = "default_digest_header")]
    pub digest_header: String,

    /// Header carrying the response's tags as a JSON array
    #[serde(default = "default_tags_header")]
    pub tags_header: String,
}

impl Default for TagManagerConfig {
    fn default() -> Self {
        Self {
            digest_header: default_digest_header(),
            tags_header: default_tags_header(),
        }
    }
}

/// Where the symlink tag manager keeps its tag directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymlinkStorageConfig {
    pub tag_dir: PathBuf,
}

impl SymlinkStorageConfig {
    pub fn new(tag_dir: impl Into<PathBuf>) -> Self {
        Self {
            tag_dir: tag_dir.into(),
        }
    }
}
