//! Invalidation requests and their de-duplication signature

use std::fmt;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use sha2::{Digest, Sha256};

use crate::error::{PurgeError, PurgeResult};

/// Invalidation verb sent to a caching proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationMethod {
    /// Drop every variant cached for one URL
    Purge,
    /// Drop every entry matching the request's pattern headers
    Ban,
    /// Fetch a URL again, bypassing the cached copy
    Refresh,
    /// Proxy-specific verb such as `PURGETAGS`
    Custom(Method),
}

impl InvalidationMethod {
    /// Parses a method token, mapping the well-known verbs
    pub fn parse(method: &str) -> PurgeResult<Self> {
        match method.to_ascii_uppercase().as_str() {
            "PURGE" => Ok(InvalidationMethod::Purge),
            "BAN" => Ok(InvalidationMethod::Ban),
            "GET" => Ok(InvalidationMethod::Refresh),
            other => Method::from_bytes(other.as_bytes())
                .map(InvalidationMethod::Custom)
                .map_err(|e| PurgeError::InvalidConfiguration {
                    reason: format!("invalid HTTP method \"{}\": {}", method, e),
                }),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InvalidationMethod::Purge => "PURGE",
            InvalidationMethod::Ban => "BAN",
            InvalidationMethod::Refresh => "GET",
            InvalidationMethod::Custom(method) => method.as_str(),
        }
    }

    /// HTTP method placed on the wire
    pub fn to_method(&self) -> Method {
        match self {
            InvalidationMethod::Refresh => Method::GET,
            InvalidationMethod::Custom(method) => method.clone(),
            // Extension tokens made of uppercase ASCII letters always parse.
            other => Method::from_bytes(other.as_str().as_bytes())
                .expect("PURGE and BAN are valid method tokens"),
        }
    }
}

impl fmt::Display for InvalidationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical invalidation instruction, before fan-out to proxy servers.
///
/// The value is immutable: every `with_*` method returns a new request.
#[derive(Debug, Clone)]
pub struct InvalidationRequest {
    method: InvalidationMethod,
    uri: Uri,
    headers: HeaderMap,
    validate_host: bool,
}

impl InvalidationRequest {
    pub fn new(method: InvalidationMethod, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            validate_host: true,
        }
    }

    /// Builds a request from string parts.
    ///
    /// Anything that is neither absolute (`scheme://...`) nor starts with
    /// `/` is read as a path relative to the application root.
    pub fn parse(method: &str, uri: &str) -> PurgeResult<Self> {
        let method = InvalidationMethod::parse(method)?;
        let uri = parse_uri(uri)?;
        Ok(Self::new(method, uri))
    }

    pub fn purge(uri: &str) -> PurgeResult<Self> {
        Ok(Self::new(InvalidationMethod::Purge, parse_uri(uri)?))
    }

    pub fn ban(uri: &str) -> PurgeResult<Self> {
        Ok(Self::new(InvalidationMethod::Ban, parse_uri(uri)?))
    }

    pub fn refresh(uri: &str) -> PurgeResult<Self> {
        Ok(Self::new(InvalidationMethod::Refresh, parse_uri(uri)?))
    }

    pub fn method(&self) -> &InvalidationMethod {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether a relative URI must be completed from the base URI
    pub fn validates_host(&self) -> bool {
        self.validate_host
    }

    /// Lets a relative request go out without an application host; each
    /// proxy then receives its own authority as `Host`. Used for
    /// host-independent requests such as `BAN /`.
    pub fn without_host_validation(&self) -> Self {
        Self {
            validate_host: false,
            ..self.clone()
        }
    }

    pub fn with_method(&self, method: InvalidationMethod) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    pub fn with_uri(&self, uri: Uri) -> Self {
        Self {
            uri,
            ..self.clone()
        }
    }

    /// Replaces any existing values of `name`
    pub fn with_header(&self, name: HeaderName, value: HeaderValue) -> Self {
        let mut next = self.clone();
        next.headers.insert(name, value);
        next
    }

    /// Adds a value to `name`, keeping existing ones
    pub fn with_added_header(&self, name: HeaderName, value: HeaderValue) -> Self {
        let mut next = self.clone();
        next.headers.append(name, value);
        next
    }

    /// Overlays `headers`; each name present in `headers` replaces the
    /// values this request had for it.
    pub fn with_headers(&self, headers: &HeaderMap) -> Self {
        let mut next = self.clone();
        for name in headers.keys() {
            next.headers.remove(name);
            for value in headers.get_all(name) {
                next.headers.append(name.clone(), value.clone());
            }
        }
        next
    }

    /// Stable fingerprint of method, URI and headers.
    ///
    /// Headers are sorted by name first, so the insertion order of
    /// distinct headers never changes the signature. Values of a single
    /// multi-valued header keep their order.
    pub fn signature(&self) -> String {
        let mut headers: Vec<(&str, &[u8])> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.uri.to_string().as_bytes());
        hasher.update(b"\n");
        for (name, value) in headers {
            hasher.update(name.as_bytes());
            hasher.update(b": ");
            hasher.update(value);
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Parses a request target, treating bare segments as root-relative paths
pub fn parse_uri(uri: &str) -> PurgeResult<Uri> {
    let trimmed = uri.trim();
    let candidate = if trimmed.contains("://") || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    candidate.parse::<Uri>().map_err(|e| PurgeError::InvalidUrl {
        url: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Converts a header pair from strings, reporting which header was bad
pub fn header(name: &str, value: &str) -> PurgeResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| PurgeError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| PurgeError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((header_name, header_value))
}
