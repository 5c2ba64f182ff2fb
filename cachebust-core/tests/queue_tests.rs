//! RequestQueue tests

use cachebust_core::error::PurgeError;
use cachebust_core::queue::RequestQueue;
use cachebust_core::request::{header, InvalidationRequest};
use http::header::{CONNECTION, HOST};

fn hosts(queue: &RequestQueue) -> Vec<String> {
    queue
        .resolve_all()
        .unwrap()
        .iter()
        .map(|r| r.request.headers()[HOST].to_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_queue_creation() {
    let queue = RequestQueue::new(&["127.0.0.1:6081"], None).unwrap();

    assert!(queue.is_empty());
    assert_eq!(queue.count(), 0);
    assert!(queue.resolve_all().unwrap().is_empty());
}

#[test]
fn test_server_without_scheme_defaults_to_http() {
    let queue = RequestQueue::new(&["127.0.0.1:6081", "https://10.0.0.2"], None).unwrap();
    let schemes: Vec<&str> = queue.servers().iter().map(|s| s.scheme()).collect();
    assert_eq!(schemes, vec!["http", "https"]);
}

#[test]
fn test_server_with_path_is_rejected() {
    let result = RequestQueue::new(&["http://127.0.0.1:6081/varnish"], None);
    match result {
        Err(PurgeError::InvalidUrlParts { parts, allowed, .. }) => {
            assert_eq!(parts, "path");
            assert_eq!(allowed, "scheme, host, port");
        }
        other => panic!("expected InvalidUrlParts, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_duplicates_are_collapsed() {
    let mut queue = RequestQueue::new(&["127.0.0.1"], None).unwrap();

    assert!(queue.add(InvalidationRequest::purge("http://a.example/foo").unwrap()));
    assert!(!queue.add(InvalidationRequest::purge("http://a.example/foo").unwrap()));
    assert!(queue.add(InvalidationRequest::purge("http://a.example/bar").unwrap()));

    assert_eq!(queue.count(), 2);
}

#[test]
fn test_fan_out_is_requests_times_servers() {
    let servers = ["10.0.0.1:6081", "10.0.0.2:6081", "10.0.0.3:6081"];
    let mut queue = RequestQueue::new(&servers, Some("app.example")).unwrap();

    for path in ["/a", "/b"] {
        queue.add(InvalidationRequest::purge(path).unwrap());
    }

    let resolved = queue.resolve_all().unwrap();
    assert_eq!(resolved.len(), 6);

    // Request order first, then server order.
    let targets: Vec<String> = resolved.iter().map(|r| r.request.uri().to_string()).collect();
    assert_eq!(
        targets,
        vec![
            "http://10.0.0.1:6081/a",
            "http://10.0.0.2:6081/a",
            "http://10.0.0.3:6081/a",
            "http://10.0.0.1:6081/b",
            "http://10.0.0.2:6081/b",
            "http://10.0.0.3:6081/b",
        ]
    );
    assert_eq!(resolved[0].server, "http://10.0.0.1:6081");
}

#[test]
fn test_relative_path_under_base_uri_prefix() {
    let mut queue = RequestQueue::new(&["http://10.0.0.1:8080"], Some("http://app.example/sub")).unwrap();
    queue.add(InvalidationRequest::purge("/articles/1?page=2").unwrap());

    let resolved = queue.resolve_all().unwrap();
    assert_eq!(resolved.len(), 1);

    let request = &resolved[0].request;
    assert_eq!(request.method().as_str(), "PURGE");
    assert_eq!(request.uri().to_string(), "http://10.0.0.1:8080/sub/articles/1?page=2");
    assert_eq!(request.headers()[HOST], "app.example");
    assert_eq!(request.headers()[CONNECTION], "Close");
}

#[test]
fn test_absolute_uri_keeps_its_own_host() {
    let mut queue = RequestQueue::new(&["10.0.0.1"], Some("http://app.example")).unwrap();
    queue.add(InvalidationRequest::purge("http://other.example:8000/x").unwrap());

    assert_eq!(hosts(&queue), vec!["other.example:8000"]);
    let resolved = queue.resolve_all().unwrap();
    assert_eq!(resolved[0].request.uri().to_string(), "http://10.0.0.1/x");
}

#[test]
fn test_base_uri_port_is_kept_in_host() {
    let mut queue = RequestQueue::new(&["10.0.0.1"], Some("app.example:8000")).unwrap();
    queue.add(InvalidationRequest::purge("/x").unwrap());

    assert_eq!(hosts(&queue), vec!["app.example:8000"]);
}

#[test]
fn test_explicit_host_header_wins() {
    let mut queue = RequestQueue::new(&["10.0.0.1"], Some("app.example")).unwrap();
    let (name, value) = header("Host", "cdn.example").unwrap();
    queue.add(InvalidationRequest::purge("/x").unwrap().with_header(name, value));

    assert_eq!(hosts(&queue), vec!["cdn.example"]);
}

#[test]
fn test_relative_without_base_uri_is_missing_host() {
    let mut queue = RequestQueue::new(&["10.0.0.1"], None).unwrap();
    queue.add(InvalidationRequest::purge("/foo").unwrap());

    assert!(matches!(queue.resolve_all(), Err(PurgeError::MissingHost { .. })));
}

#[test]
fn test_host_validation_opt_out_uses_proxy_authority() {
    let mut queue = RequestQueue::new(&["10.0.0.1:6081", "10.0.0.2"], None).unwrap();
    queue.add(InvalidationRequest::ban("/").unwrap().without_host_validation());

    assert_eq!(hosts(&queue), vec!["10.0.0.1:6081", "10.0.0.2"]);
}

#[test]
fn test_clear_drops_pending() {
    let mut queue = RequestQueue::new(&["10.0.0.1"], None).unwrap();
    let request = InvalidationRequest::purge("http://a.example/").unwrap();
    queue.add(request.clone());
    queue.clear();

    assert!(queue.is_empty());
    assert!(queue.add(request));
}
