//! Concurrent dispatch of queued invalidation requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::DispatcherConfig;
use crate::error::{FlushErrors, ProxyError, PurgeError, PurgeResult};
use crate::queue::{RequestQueue, ResolvedRequest};
use crate::request::InvalidationRequest;
use crate::transport::{HttpTransport, ReqwestTransport, TransportError};
use crate::uri;

/// Dispatcher statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Number of distinct requests waiting for the next flush
    pub pending_count: usize,

    /// Requests accepted into the queue
    pub total_enqueued: u64,

    /// Requests dropped because an identical one was pending
    pub total_duplicates: u64,

    /// Physical requests that reached a proxy and succeeded
    pub total_sent: u64,

    /// Physical requests that failed
    pub total_failed: u64,

    /// Number of non-empty flushes
    pub flush_count: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_flush_at: Option<DateTime<Utc>>,
}

/// Sends queued invalidation requests to every configured proxy server.
///
/// The dispatcher is the only owner of the pending queue. `flush` swaps
/// the batch out under the queue lock before any I/O, so requests enqueued
/// while a flush is in flight land in the next batch.
pub struct HttpDispatcher {
    queue: RwLock<RequestQueue>,
    transport: Arc<dyn HttpTransport>,

    total_enqueued: AtomicU64,
    total_duplicates: AtomicU64,
    total_sent: AtomicU64,
    total_failed: AtomicU64,
    flush_count: AtomicU64,
    last_flush_at: RwLock<Option<DateTime<Utc>>>,
}

impl HttpDispatcher {
    /// Create a dispatcher that talks HTTP through `reqwest`
    pub fn new(config: &DispatcherConfig) -> PurgeResult<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a dispatcher with a custom transport
    pub fn with_transport(
        config: &DispatcherConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> PurgeResult<Self> {
        let queue = RequestQueue::new(&config.servers, config.base_uri.as_deref())?;

        Ok(Self {
            queue: RwLock::new(queue),
            transport,
            total_enqueued: AtomicU64::new(0),
            total_duplicates: AtomicU64::new(0),
            total_sent: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
            last_flush_at: RwLock::new(None),
        })
    }

    /// Queue a request for the next flush.
    ///
    /// Returns false if an identical request was already pending.
    pub async fn enqueue(&self, request: InvalidationRequest) -> bool {
        let method = request.method().to_string();
        let target = request.uri().to_string();

        let added = self.queue.write().await.add(request);
        if added {
            self.total_enqueued.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(method = %method, uri = %target, "Queued invalidation request");
        } else {
            self.total_duplicates.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(method = %method, uri = %target, "Skipped duplicate invalidation request");
        }
        added
    }

    /// Send every pending request to every proxy server.
    ///
    /// Returns the number of logical requests sent. If any physical
    /// request failed, returns [`PurgeError::Flush`] with all failures in
    /// order; requests that succeeded are not retried and failed ones are
    /// not requeued.
    pub async fn flush(&self) -> PurgeResult<usize> {
        let (count, resolved) = {
            let mut queue = self.queue.write().await;
            let batch = queue.take();
            if batch.is_empty() {
                return Ok(0);
            }
            (batch.len(), queue.resolve_requests(&batch)?)
        };

        tracing::info!(
            requests = count,
            physical_requests = resolved.len(),
            transport = self.transport.name(),
            "Flushing invalidation requests"
        );

        let outcomes = join_all(resolved.into_iter().map(|r| self.dispatch(r))).await;
        let attempted = outcomes.len() as u64;
        let errors: FlushErrors = outcomes.into_iter().filter_map(Result::err).collect();
        let failed = errors.len() as u64;

        self.total_sent.fetch_add(attempted - failed, Ordering::SeqCst);
        self.total_failed.fetch_add(failed, Ordering::SeqCst);
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        *self.last_flush_at.write().await = Some(Utc::now());

        if !errors.is_empty() {
            tracing::warn!(failed = errors.len(), requests = count, "Flush completed with failures");
            return Err(PurgeError::Flush(errors));
        }

        tracing::info!(requests = count, "Flush completed");
        Ok(count)
    }

    async fn dispatch(&self, resolved: ResolvedRequest) -> Result<(), ProxyError> {
        let ResolvedRequest { server, request } = resolved;
        let method = request.method().to_string();
        let target = request.uri().to_string();

        let error = match self.transport.send(request).await {
            Ok(response) if response.status.is_client_error() || response.status.is_server_error() => {
                ProxyError::Response {
                    server,
                    method,
                    uri: target,
                    status: response.status,
                    body: response.body,
                }
            }
            Ok(_) => return Ok(()),
            Err(TransportError::Unreachable(reason)) => ProxyError::Unreachable {
                server,
                method,
                uri: target,
                reason,
            },
            Err(TransportError::Other(reason)) => ProxyError::Other {
                server,
                method,
                uri: target,
                reason,
            },
        };

        tracing::warn!(error = %error, "Invalidation request failed");
        Err(error)
    }

    /// Drop every pending request without sending it
    pub async fn clear(&self) {
        self.queue.write().await.clear();
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.read().await.count()
    }

    /// Proxy servers as `scheme://host[:port]`
    pub async fn servers(&self) -> Vec<String> {
        self.queue.read().await.servers().iter().map(uri::origin).collect()
    }

    pub async fn base_uri(&self) -> Option<String> {
        self.queue.read().await.base_uri().map(|base| base.to_string())
    }

    /// Get dispatcher statistics
    pub async fn stats(&self) -> DispatchStats {
        let pending_count = self.queue.read().await.count();
        let last_flush_at = *self.last_flush_at.read().await;

        DispatchStats {
            pending_count,
            total_enqueued: self.total_enqueued.load(Ordering::SeqCst),
            total_duplicates: self.total_duplicates.load(Ordering::SeqCst),
            total_sent: self.total_sent.load(Ordering::SeqCst),
            total_failed: self.total_failed.load(Ordering::SeqCst),
            flush_count: self.flush_count.load(Ordering::SeqCst),
            last_flush_at,
        }
    }
}
