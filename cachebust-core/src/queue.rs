//! Pending invalidation requests and their fan-out to proxy servers

use std::collections::HashSet;

use http::header::{HeaderValue, CONNECTION, HOST};
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{Request, Uri};
use url::Url;

use crate::error::{PurgeError, PurgeResult};
use crate::request::InvalidationRequest;
use crate::uri::{self, UrlPart};

/// One physical request bound for one proxy server
#[derive(Debug)]
pub struct ResolvedRequest {
    /// `scheme://host[:port]` of the proxy server
    pub server: String,

    /// Request with the proxy as network target and the application host
    /// in the `Host` header
    pub request: Request<()>,
}

/// De-duplicated, ordered set of pending invalidation requests.
///
/// Servers and base URI are validated when they are set, so that a bad
/// configuration fails during setup rather than on the first flush.
#[derive(Debug, Default)]
pub struct RequestQueue {
    servers: Vec<Url>,
    base_uri: Option<Url>,
    pending: Vec<InvalidationRequest>,
    signatures: HashSet<String>,
}

impl RequestQueue {
    /// Creates a queue for the given proxy servers and optional base URI
    pub fn new<S: AsRef<str>>(servers: &[S], base_uri: Option<&str>) -> PurgeResult<Self> {
        let mut queue = Self::default();
        queue.set_servers(servers)?;
        queue.set_base_uri(base_uri)?;
        Ok(queue)
    }

    /// Replaces the proxy server list.
    ///
    /// Entries may only carry scheme, host and port. Nothing changes if
    /// any entry is invalid.
    pub fn set_servers<S: AsRef<str>>(&mut self, servers: &[S]) -> PurgeResult<()> {
        if servers.is_empty() {
            return Err(PurgeError::InvalidConfiguration {
                reason: "at least one proxy server is required".to_string(),
            });
        }

        let parsed = servers
            .iter()
            .map(|server| uri::validate(server.as_ref(), Some(UrlPart::SERVER)))
            .collect::<PurgeResult<Vec<_>>>()?;

        self.servers = parsed;
        Ok(())
    }

    /// Sets the application base URI used to complete relative requests
    pub fn set_base_uri(&mut self, base_uri: Option<&str>) -> PurgeResult<()> {
        self.base_uri = base_uri.map(|base| uri::validate(base, None)).transpose()?;
        Ok(())
    }

    pub fn servers(&self) -> &[Url] {
        &self.servers
    }

    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    /// Adds a request unless one with the same signature is pending.
    ///
    /// Returns false when the request was a duplicate.
    pub fn add(&mut self, request: InvalidationRequest) -> bool {
        if !self.signatures.insert(request.signature()) {
            return false;
        }
        self.pending.push(request);
        true
    }

    pub fn count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops all pending requests without sending them
    pub fn clear(&mut self) {
        self.pending.clear();
        self.signatures.clear();
    }

    /// Removes and returns the pending batch, leaving configuration intact
    pub fn take(&mut self) -> Vec<InvalidationRequest> {
        self.signatures.clear();
        std::mem::take(&mut self.pending)
    }

    /// Resolves every pending request against every proxy server
    pub fn resolve_all(&self) -> PurgeResult<Vec<ResolvedRequest>> {
        self.resolve_requests(&self.pending)
    }

    /// Resolves `requests` in order, and within each request in server order
    pub fn resolve_requests(
        &self,
        requests: &[InvalidationRequest],
    ) -> PurgeResult<Vec<ResolvedRequest>> {
        let mut resolved = Vec::with_capacity(requests.len() * self.servers.len());
        for request in requests {
            resolved.extend(self.resolve(request)?);
        }
        Ok(resolved)
    }

    /// Fans a single request out to every configured proxy server
    pub fn resolve(&self, request: &InvalidationRequest) -> PurgeResult<Vec<ResolvedRequest>> {
        let target = self.application_target(request)?;

        let mut headers = request.headers().clone();
        // Invalidation connections are never pooled.
        headers.insert(CONNECTION, HeaderValue::from_static("Close"));

        let method = request.method().to_method();

        self.servers
            .iter()
            .map(|server| {
                let mut server_headers = headers.clone();
                if !server_headers.contains_key(HOST) {
                    let host = target
                        .host_header
                        .clone()
                        .unwrap_or_else(|| uri::authority(server));
                    let value = HeaderValue::from_str(&host).map_err(|e| {
                        PurgeError::InvalidHeader {
                            name: HOST.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    server_headers.insert(HOST, value);
                }

                let mut physical = Request::new(());
                *physical.method_mut() = method.clone();
                *physical.uri_mut() = proxy_uri(server, &target.path_and_query)?;
                *physical.headers_mut() = server_headers;

                Ok(ResolvedRequest {
                    server: uri::origin(server),
                    request: physical,
                })
            })
            .collect()
    }

    /// Completes a request's URI into the application host and path.
    ///
    /// A relative URI takes host, port and path prefix from the base URI.
    /// Without a usable base URI it is an error, unless the request opted
    /// out of host validation.
    fn application_target(&self, request: &InvalidationRequest) -> PurgeResult<ApplicationTarget> {
        let original = request.uri();

        if let Some(host) = original.host() {
            let scheme = original.scheme_str().unwrap_or("http");
            return Ok(ApplicationTarget {
                host_header: Some(host_header(scheme, host, original.port_u16())),
                path_and_query: path_and_query(original.path(), original.query()),
            });
        }

        let base = self
            .base_uri
            .as_ref()
            .filter(|base| base.host_str().is_some());

        match base {
            Some(base) => {
                let path = join_path(base.path(), original.path());
                Ok(ApplicationTarget {
                    host_header: Some(uri::authority(base)),
                    path_and_query: path_and_query(&path, original.query()),
                })
            }
            None if !request.validates_host() => Ok(ApplicationTarget {
                host_header: None,
                path_and_query: path_and_query(original.path(), original.query()),
            }),
            None => Err(PurgeError::MissingHost {
                uri: original.to_string(),
            }),
        }
    }
}

struct ApplicationTarget {
    /// `None` means each proxy's own authority is used
    host_header: Option<String>,
    path_and_query: String,
}

fn host_header(scheme: &str, host: &str, port: Option<u16>) -> String {
    let default_port = match scheme {
        "https" => 443,
        _ => 80,
    };
    match port {
        Some(port) if port != default_port => format!("{}:{}", host, port),
        _ => host.to_string(),
    }
}

fn path_and_query(path: &str, query: Option<&str>) -> String {
    let path = if path.is_empty() { "/" } else { path };
    match query {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

/// Concatenates a base path prefix and a request path with a single slash
fn join_path(prefix: &str, path: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn proxy_uri(server: &Url, path_and_query: &str) -> PurgeResult<Uri> {
    let invalid = |reason: String| PurgeError::InvalidUrl {
        url: format!("{}{}", uri::origin(server), path_and_query),
        reason,
    };

    let scheme = Scheme::try_from(server.scheme()).map_err(|e| invalid(e.to_string()))?;
    let authority =
        Authority::try_from(uri::authority(server).as_str()).map_err(|e| invalid(e.to_string()))?;
    let path_and_query =
        PathAndQuery::try_from(path_and_query).map_err(|e| invalid(e.to_string()))?;

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| invalid(e.to_string()))
}
