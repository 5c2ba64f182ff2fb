//! Error types for cache invalidation
//!
//! Configuration problems surface synchronously when servers or the base
//! URI are set. Per-request proxy failures during a flush are collected
//! into [`FlushErrors`] and returned once every request has completed.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for invalidation operations
pub type PurgeResult<T> = Result<T, PurgeError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid server list, base URI or client configuration
    Configuration,
    /// A request could not be completed into an absolute URL
    Resolution,
    /// A caching proxy was unreachable or answered with an error
    Proxy,
    /// Stored tag data or response metadata is corrupt or incomplete
    Integrity,
    /// The proxy client lacks the requested capability
    Unsupported,
    /// Filesystem or storage backend failure
    Io,
}

/// Errors that can occur while queuing, dispatching or tagging
#[derive(Error, Debug)]
pub enum PurgeError {
    // ═══════════════════════════════════════════════════════════════════════
    // Configuration errors
    // ═══════════════════════════════════════════════════════════════════════

    /// URL could not be parsed or has no scheme
    #[error("URL \"{url}\" is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// URL contains components outside the allowed set
    #[error("URL \"{url}\" contains disallowed parts ({parts}); only {allowed} may be set")]
    InvalidUrlParts {
        url: String,
        parts: String,
        allowed: String,
    },

    /// Header name or value cannot be sent over HTTP
    #[error("Invalid header \"{name}\": {reason}")]
    InvalidHeader { name: String, reason: String },

    /// HTTP client or proxy client could not be built
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Resolution errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Relative request without a base URI that supplies a host
    #[error("Request for \"{uri}\" has no host and no base URI with a host is configured")]
    MissingHost { uri: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Dispatch errors
    // ═══════════════════════════════════════════════════════════════════════

    /// One or more proxy requests failed during a flush
    #[error("{0}")]
    Flush(FlushErrors),

    /// Proxy client does not support the requested operation
    #[error("{client} does not support {operation}")]
    UnsupportedOperation {
        operation: &'static str,
        client: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Integrity errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Tag index or response metadata is malformed
    #[error("Storage integrity failure: {reason}")]
    StorageIntegrity { reason: String },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Storage backend lock is poisoned
    #[error("Storage backend lock poisoned")]
    StorageLocked,

    /// I/O operation failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PurgeError {
    /// Builds a [`PurgeError::Io`] tagged with the path being touched
    pub fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        PurgeError::Io {
            path: path.to_string(),
            source,
        }
    }

    /// Returns true if a later retry of the same work might succeed
    ///
    /// Proxy failures and lock contention qualify; configuration and
    /// integrity errors need a code or data fix first.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PurgeError::Flush(_) | PurgeError::StorageLocked)
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            PurgeError::InvalidUrl { .. }
            | PurgeError::InvalidUrlParts { .. }
            | PurgeError::InvalidHeader { .. }
            | PurgeError::InvalidConfiguration { .. } => ErrorCategory::Configuration,

            PurgeError::MissingHost { .. } => ErrorCategory::Resolution,

            PurgeError::Flush(_) => ErrorCategory::Proxy,

            PurgeError::UnsupportedOperation { .. } => ErrorCategory::Unsupported,

            PurgeError::StorageIntegrity { .. } | PurgeError::Json(_) => ErrorCategory::Integrity,

            PurgeError::StorageLocked | PurgeError::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            PurgeError::InvalidUrl { .. } => "INVALID_URL",
            PurgeError::InvalidUrlParts { .. } => "INVALID_URL_PARTS",
            PurgeError::InvalidHeader { .. } => "INVALID_HEADER",
            PurgeError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            PurgeError::MissingHost { .. } => "MISSING_HOST",
            PurgeError::Flush(_) => "FLUSH_FAILED",
            PurgeError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            PurgeError::StorageIntegrity { .. } => "STORAGE_INTEGRITY",
            PurgeError::Json(_) => "JSON_ERROR",
            PurgeError::StorageLocked => "STORAGE_LOCKED",
            PurgeError::Io { .. } => "IO_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable response object
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

/// JSON-serializable error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail for JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "MISSING_HOST")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    pub category: ErrorCategory,
    /// Whether retry might succeed
    pub recoverable: bool,
}

/// Failure of one physical request to one caching proxy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Connection refused, DNS failure or timeout
    #[error("Proxy at {server} is unreachable for {method} {uri}: {reason}")]
    Unreachable {
        server: String,
        method: String,
        uri: String,
        reason: String,
    },

    /// Proxy answered with an error status
    #[error("Proxy at {server} answered {method} {uri} with {status}: {body}")]
    Response {
        server: String,
        method: String,
        uri: String,
        status: StatusCode,
        body: String,
    },

    /// Anything else the transport reported
    #[error("Invalidation request {method} {uri} to {server} failed: {reason}")]
    Other {
        server: String,
        method: String,
        uri: String,
        reason: String,
    },
}

impl ProxyError {
    /// Server (scheme://host:port) the failed request was sent to
    pub fn server(&self) -> &str {
        match self {
            ProxyError::Unreachable { server, .. }
            | ProxyError::Response { server, .. }
            | ProxyError::Other { server, .. } => server,
        }
    }

    /// Status code returned by the proxy, if it answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProxyError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ProxyError::Unreachable { .. })
    }
}

/// Ordered collection of the proxy failures from one flush
///
/// Requests that succeeded in the same flush are not part of this
/// collection and are not requeued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushErrors {
    errors: Vec<ProxyError>,
}

impl FlushErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ProxyError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First failure in occurrence order
    pub fn first(&self) -> Option<&ProxyError> {
        self.errors.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProxyError> {
        self.errors.iter()
    }
}

impl fmt::Display for FlushErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "No invalidation requests failed"),
            [only] => write!(f, "1 invalidation request failed: {}", only),
            [first, ..] => write!(
                f,
                "{} invalidation requests failed, first: {}",
                self.errors.len(),
                first
            ),
        }
    }
}

impl std::error::Error for FlushErrors {}

impl FromIterator<ProxyError> for FlushErrors {
    fn from_iter<I: IntoIterator<Item = ProxyError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FlushErrors {
    type Item = ProxyError;
    type IntoIter = std::vec::IntoIter<ProxyError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a FlushErrors {
    type Item = &'a ProxyError;
    type IntoIter = std::slice::Iter<'a, ProxyError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
