//! HttpDispatcher tests against a recording transport

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cachebust_core::config::DispatcherConfig;
use cachebust_core::dispatcher::HttpDispatcher;
use cachebust_core::error::PurgeError;
use cachebust_core::request::InvalidationRequest;
use cachebust_core::transport::{HttpTransport, TransportError, TransportResponse};
use http::{Request, StatusCode};
use tokio::sync::{Notify, Semaphore};

/// Records every request; answers per authority from a script
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    unreachable: Vec<String>,
    statuses: HashMap<String, StatusCode>,
}

impl RecordingTransport {
    fn unreachable(authority: &str) -> Self {
        Self {
            unreachable: vec![authority.to_string()],
            ..Self::default()
        }
    }

    fn status(authority: &str, status: StatusCode) -> Self {
        Self {
            statuses: HashMap::from([(authority.to_string(), status)]),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, request: Request<()>) -> Result<TransportResponse, TransportError> {
        let authority = request.uri().authority().map(|a| a.to_string()).unwrap_or_default();
        self.sent
            .lock()
            .unwrap()
            .push((request.method().to_string(), request.uri().to_string()));

        if self.unreachable.contains(&authority) {
            return Err(TransportError::Unreachable("connection refused".to_string()));
        }
        let status = self.statuses.get(&authority).copied().unwrap_or(StatusCode::OK);
        Ok(TransportResponse {
            status,
            body: String::new(),
        })
    }
}

fn dispatcher(servers: &[&str], transport: Arc<RecordingTransport>) -> HttpDispatcher {
    let config = DispatcherConfig::new(servers.iter().copied()).with_base_uri("app.example");
    HttpDispatcher::with_transport(&config, transport).unwrap()
}

#[tokio::test]
async fn test_empty_flush_sends_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&["10.0.0.1"], transport.clone());

    assert_eq!(dispatcher.flush().await.unwrap(), 0);
    assert!(transport.sent().is_empty());
    assert_eq!(dispatcher.stats().await.flush_count, 0);
}

#[tokio::test]
async fn test_flush_sends_to_every_server() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&["10.0.0.1", "10.0.0.2"], transport.clone());

    assert!(dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await);
    assert!(!dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await);
    assert!(dispatcher.enqueue(InvalidationRequest::refresh("/b").unwrap()).await);

    assert_eq!(dispatcher.flush().await.unwrap(), 2);

    let mut sent = transport.sent();
    sent.sort();
    assert_eq!(
        sent,
        vec![
            ("GET".to_string(), "http://10.0.0.1/b".to_string()),
            ("GET".to_string(), "http://10.0.0.2/b".to_string()),
            ("PURGE".to_string(), "http://10.0.0.1/a".to_string()),
            ("PURGE".to_string(), "http://10.0.0.2/a".to_string()),
        ]
    );

    let stats = dispatcher.stats().await;
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.total_enqueued, 2);
    assert_eq!(stats.total_duplicates, 1);
    assert_eq!(stats.total_sent, 4);
    assert_eq!(stats.flush_count, 1);
    assert!(stats.last_flush_at.is_some());
}

#[tokio::test]
async fn test_unreachable_server_fails_only_its_requests() {
    let transport = Arc::new(RecordingTransport::unreachable("10.0.0.2"));
    let dispatcher = dispatcher(&["10.0.0.1", "10.0.0.2"], transport.clone());

    dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await;

    let err = dispatcher.flush().await.unwrap_err();
    assert!(err.is_recoverable());
    match err {
        PurgeError::Flush(errors) => {
            assert_eq!(errors.len(), 1);
            let first = errors.first().unwrap();
            assert!(first.is_unreachable());
            assert_eq!(first.server(), "http://10.0.0.2");
        }
        other => panic!("expected flush error, got {other}"),
    }
    assert_eq!(transport.sent().len(), 2);

    // Failed requests are not requeued.
    assert_eq!(dispatcher.flush().await.unwrap(), 0);
    assert_eq!(transport.sent().len(), 2);

    let stats = dispatcher.stats().await;
    assert_eq!(stats.total_sent, 1);
    assert_eq!(stats.total_failed, 1);
}

#[tokio::test]
async fn test_error_status_is_response_error() {
    let transport = Arc::new(RecordingTransport::status("10.0.0.1", StatusCode::SERVICE_UNAVAILABLE));
    let dispatcher = dispatcher(&["10.0.0.1"], transport);

    dispatcher.enqueue(InvalidationRequest::ban("/").unwrap()).await;

    match dispatcher.flush().await {
        Err(PurgeError::Flush(errors)) => {
            let statuses: Vec<_> = errors.iter().map(|e| e.status()).collect();
            assert_eq!(statuses, vec![Some(StatusCode::SERVICE_UNAVAILABLE)]);
        }
        other => panic!("expected flush error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_host_drops_batch() {
    let transport = Arc::new(RecordingTransport::default());
    let config = DispatcherConfig::new(["10.0.0.1"]);
    let dispatcher = HttpDispatcher::with_transport(&config, transport.clone()).unwrap();

    dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await;

    assert!(matches!(dispatcher.flush().await, Err(PurgeError::MissingHost { .. })));
    assert_eq!(dispatcher.pending_count().await, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_clear_cancels_pending() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&["10.0.0.1"], transport.clone());

    dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await;
    dispatcher.clear().await;

    assert_eq!(dispatcher.flush().await.unwrap(), 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_concurrent_enqueue() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(dispatcher(&["10.0.0.1"], transport.clone()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let path = format!("/item/{}", i % 10);
                dispatcher.enqueue(InvalidationRequest::purge(&path).unwrap()).await
            })
        })
        .collect();

    let mut added = 0;
    for handle in handles {
        if handle.await.unwrap() {
            added += 1;
        }
    }

    assert_eq!(added, 10);
    assert_eq!(dispatcher.pending_count().await, 10);
    assert_eq!(dispatcher.flush().await.unwrap(), 10);
    assert_eq!(transport.sent().len(), 10);
}

#[tokio::test]
async fn test_server_and_base_accessors() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&["10.0.0.1:6081", "https://10.0.0.2"], transport);

    assert_eq!(
        dispatcher.servers().await,
        vec!["http://10.0.0.1:6081", "https://10.0.0.2"]
    );
    assert_eq!(dispatcher.base_uri().await.as_deref(), Some("http://app.example/"));
}

/// Answers 200 after a fixed delay per authority
struct SlowTransport {
    delays: HashMap<String, Duration>,
}

#[async_trait]
impl HttpTransport for SlowTransport {
    fn name(&self) -> &str {
        "slow"
    }

    async fn send(&self, request: Request<()>) -> Result<TransportResponse, TransportError> {
        let authority = request.uri().authority().map(|a| a.to_string()).unwrap_or_default();
        let delay = self.delays.get(&authority).copied().unwrap_or_default();
        tokio::time::sleep(delay).await;
        Ok(TransportResponse {
            status: StatusCode::OK,
            body: String::new(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_flush_sends_to_servers_concurrently() {
    let transport = Arc::new(SlowTransport {
        delays: HashMap::from([
            ("10.0.0.1".to_string(), Duration::from_millis(100)),
            ("10.0.0.2".to_string(), Duration::from_millis(200)),
            ("10.0.0.3".to_string(), Duration::from_millis(300)),
        ]),
    });
    let config = DispatcherConfig::new(["10.0.0.1", "10.0.0.2", "10.0.0.3"]).with_base_uri("app.example");
    let dispatcher = HttpDispatcher::with_transport(&config, transport).unwrap();

    dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await;
    dispatcher.enqueue(InvalidationRequest::purge("/b").unwrap()).await;

    let started = tokio::time::Instant::now();
    assert_eq!(dispatcher.flush().await.unwrap(), 2);
    let elapsed = started.elapsed();

    // Bounded by the slowest server, not the 1.2s sum of all sends.
    assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(400), "{:?}", elapsed);
}

/// Signals each send and holds it until a permit is released
struct GatedTransport {
    started: Notify,
    gate: Semaphore,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpTransport for GatedTransport {
    fn name(&self) -> &str {
        "gated"
    }

    async fn send(&self, request: Request<()>) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(request.uri().path().to_string());
        self.started.notify_one();
        self.gate.acquire().await.unwrap().forget();
        Ok(TransportResponse {
            status: StatusCode::OK,
            body: String::new(),
        })
    }
}

#[tokio::test]
async fn test_enqueue_during_flush_lands_in_next_batch() {
    let transport = Arc::new(GatedTransport {
        started: Notify::new(),
        gate: Semaphore::new(0),
        sent: Mutex::new(Vec::new()),
    });
    let config = DispatcherConfig::new(["10.0.0.1"]).with_base_uri("app.example");
    let dispatcher = Arc::new(HttpDispatcher::with_transport(&config, transport.clone()).unwrap());

    dispatcher.enqueue(InvalidationRequest::purge("/a").unwrap()).await;
    let first_flush = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.flush().await }
    });

    // The first batch is in flight and its send is held open.
    transport.started.notified().await;
    assert_eq!(dispatcher.pending_count().await, 0);

    assert!(dispatcher.enqueue(InvalidationRequest::purge("/b").unwrap()).await);
    assert_eq!(dispatcher.pending_count().await, 1);

    transport.gate.add_permits(1);
    assert_eq!(first_flush.await.unwrap().unwrap(), 1);
    assert_eq!(dispatcher.pending_count().await, 1);
    assert_eq!(*transport.sent.lock().unwrap(), vec!["/a"]);

    transport.gate.add_permits(1);
    assert_eq!(dispatcher.flush().await.unwrap(), 1);
    assert_eq!(dispatcher.pending_count().await, 0);
    assert_eq!(*transport.sent.lock().unwrap(), vec!["/a", "/b"]);
}
