//! Cachebust Core - HTTP cache invalidation for caching proxies
//!
//! Application code describes what changed; this crate turns that into
//! `PURGE`, `BAN` and refresh requests and fans them out to every
//! configured caching proxy instance.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CACHE INVALIDATOR                      │
//! │         (capability checks, UnsupportedOperation)           │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │
//! ┌──────────────────────────────▼──────────────────────────────┐
//! │                        PROXY CLIENTS                        │
//! │   ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐     │
//! │   │ Varnish │   │  Nginx  │   │ Symfony │   │  Noop   │     │
//! │   └─────────┘   └─────────┘   └─────────┘   └─────────┘     │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │ InvalidationRequest
//! ┌──────────────────────────────▼──────────────────────────────┐
//! │                       HTTP DISPATCHER                       │
//! │   RequestQueue (dedup, base URI, fan-out) → HttpTransport   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use http::HeaderMap;
//! use cachebust_core::{CacheInvalidator, DispatcherConfig, HttpDispatcher, Varnish};
//!
//! # async fn run() -> cachebust_core::PurgeResult<()> {
//! let config = DispatcherConfig::new(["http://10.0.0.1:6081", "http://10.0.0.2:6081"])
//!     .with_base_uri("https://shop.example");
//! let dispatcher = Arc::new(HttpDispatcher::new(&config)?);
//! let invalidator = CacheInvalidator::new(Arc::new(Varnish::new(dispatcher)));
//!
//! invalidator.invalidate_path("/products/42", HeaderMap::new()).await?;
//! invalidator.invalidate_tags(&["product-42"]).await?;
//!
//! // Two logical requests, four physical ones.
//! let sent = invalidator.flush().await?;
//! # assert_eq!(sent, 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod invalidator;
pub mod proxy;
pub mod queue;
pub mod request;
pub mod transport;
pub mod uri;

pub use config::{DispatcherConfig, NginxConfig, SymfonyConfig, VarnishConfig};
pub use dispatcher::{DispatchStats, HttpDispatcher};
pub use error::{ErrorCategory, ErrorResponse, FlushErrors, ProxyError, PurgeError, PurgeResult};
pub use invalidator::{CacheInvalidator, Capability};
pub use proxy::{
    Banable, Nginx, Noop, ProxyClient, Purgeable, Refreshable, Symfony, TagCapable, Varnish,
};
pub use queue::{RequestQueue, ResolvedRequest};
pub use request::{InvalidationMethod, InvalidationRequest};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
pub use uri::UrlPart;
