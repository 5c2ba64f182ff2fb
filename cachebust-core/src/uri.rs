//! Validation of proxy server and base URIs

use std::fmt;

use url::Url;

use crate::error::{PurgeError, PurgeResult};

/// A component of a URL that may be restricted by [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlPart {
    Scheme,
    Host,
    Port,
    Path,
    Query,
    Fragment,
    User,
    Pass,
}

impl UrlPart {
    /// Parts allowed in a proxy server entry
    pub const SERVER: &'static [UrlPart] = &[UrlPart::Scheme, UrlPart::Host, UrlPart::Port];

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlPart::Scheme => "scheme",
            UrlPart::Host => "host",
            UrlPart::Port => "port",
            UrlPart::Path => "path",
            UrlPart::Query => "query",
            UrlPart::Fragment => "fragment",
            UrlPart::User => "user",
            UrlPart::Pass => "pass",
        }
    }
}

impl fmt::Display for UrlPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses `uri` and checks it only uses the `allowed` parts.
///
/// Strings without a `scheme://` prefix are treated as `http://`, so a
/// bare `127.0.0.1:6081` is read as host and port rather than as a path.
/// A root path (`/`) counts as no path at all.
pub fn validate(uri: &str, allowed: Option<&[UrlPart]>) -> PurgeResult<Url> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(PurgeError::InvalidUrl {
            url: uri.to_string(),
            reason: "URL is empty".to_string(),
        });
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| PurgeError::InvalidUrl {
        url: uri.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme().is_empty() {
        return Err(PurgeError::InvalidUrl {
            url: uri.to_string(),
            reason: "scheme is missing".to_string(),
        });
    }

    if let Some(allowed) = allowed {
        let disallowed: Vec<UrlPart> = present_parts(&url)
            .into_iter()
            .filter(|part| !allowed.contains(part))
            .collect();

        if !disallowed.is_empty() {
            return Err(PurgeError::InvalidUrlParts {
                url: uri.to_string(),
                parts: join_parts(&disallowed),
                allowed: join_parts(allowed),
            });
        }
    }

    Ok(url)
}

/// Lists the components that are actually set on `url`
pub fn present_parts(url: &Url) -> Vec<UrlPart> {
    let mut parts = vec![UrlPart::Scheme];

    if url.host_str().is_some() {
        parts.push(UrlPart::Host);
    }
    if url.port().is_some() {
        parts.push(UrlPart::Port);
    }
    if !url.path().is_empty() && url.path() != "/" {
        parts.push(UrlPart::Path);
    }
    if url.query().is_some() {
        parts.push(UrlPart::Query);
    }
    if url.fragment().is_some() {
        parts.push(UrlPart::Fragment);
    }
    if !url.username().is_empty() {
        parts.push(UrlPart::User);
    }
    if url.password().is_some() {
        parts.push(UrlPart::Pass);
    }

    parts
}

/// `host[:port]`, omitting the port when it is the scheme default
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// `scheme://host[:port]`, used to name a proxy server in logs and errors
pub fn origin(url: &Url) -> String {
    format!("{}://{}", url.scheme(), authority(url))
}

fn join_parts(parts: &[UrlPart]) -> String {
    parts
        .iter()
        .map(UrlPart::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
