// HTTP queue resolver tests against a local stub gateway. The stub answers
// each connection with the next scripted (status, body) pair, so the retry
// ladder, non-retryable statuses, and caching are all observable through
// the number of requests that actually arrive.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use depsnap::config::QueueConfig;
use depsnap::queue::{HttpQueueResolver, QueueSource};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct QueueGatewayStub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl QueueGatewayStub {
    async fn start(responses: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let scripted: VecDeque<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();
        let scripted = Arc::new(Mutex::new(scripted));

        let request_log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                let line = head.lines().next().unwrap_or_default().to_string();
                request_log.lock().unwrap().push(line);

                let (status, body) = scripted
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((500, "{}".to_string()));
                let response = format!(
                    "HTTP/1.1 {status} STUB\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        QueueGatewayStub { addr, requests }
    }

    fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request_lines(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Config pointing both endpoints at the stub, with a fast retry
    /// ladder so exhaustion tests stay quick.
    fn config(&self) -> QueueConfig {
        QueueConfig {
            function_endpoint: Some(format!("http://{}/api/fn", self.addr)),
            topic_endpoint: Some(format!("http://{}/api/topic", self.addr)),
            http_timeout_ms: Some(1_000),
            max_attempts: Some(3),
            initial_backoff_ms: Some(1),
            ..QueueConfig::default()
        }
    }
}

#[tokio::test]
async fn function_lookup_posts_to_the_lowercased_path() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"async_url": "ORDERS.Q"}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("ReIndex").await, "ORDERS.Q");
    assert_eq!(
        stub.request_lines(),
        vec!["POST /api/fn/reindex HTTP/1.1".to_string()]
    );
}

#[tokio::test]
async fn topic_lookup_gets_the_mq_queue_key() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"MQ_QUEUE": "T.Q"}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_topic("Orders").await, "T.Q");
    assert_eq!(
        stub.request_lines(),
        vec!["GET /api/topic/orders HTTP/1.1".to_string()]
    );
}

#[tokio::test]
async fn names_are_url_encoded_in_the_path() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"async_url": "Q"}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    resolver.resolve_for_function("My Func").await;
    assert_eq!(
        stub.request_lines(),
        vec!["POST /api/fn/my%20func HTTP/1.1".to_string()]
    );
}

#[tokio::test]
async fn dev_prefix_is_stripped_from_resolved_names() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"async_url": "OCP.DEV.ORDERS.Q"}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "ORDERS.Q");
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let stub = QueueGatewayStub::start(vec![
        (500, "{}"),
        (200, r#"{"async_url": "ORDERS.Q"}"#),
    ])
    .await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "ORDERS.Q");
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn too_many_requests_is_retryable() {
    let stub = QueueGatewayStub::start(vec![
        (429, "{}"),
        (200, r#"{"MQ_QUEUE": "T.Q"}"#),
    ])
    .await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_topic("orders").await, "T.Q");
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn retries_stop_at_max_attempts_and_fall_back() {
    let stub =
        QueueGatewayStub::start(vec![(500, "{}"), (503, "{}"), (502, "{}"), (200, "{}")]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
    assert_eq!(stub.hits(), 3);
}

#[tokio::test]
async fn client_error_status_fails_without_retry() {
    let stub = QueueGatewayStub::start(vec![(404, "{}")]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn blank_queue_name_fails_without_retry() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"async_url": "   "}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn missing_response_key_fails_without_retry() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"other": "Q"}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn unparsable_body_fails_without_retry() {
    let stub = QueueGatewayStub::start(vec![(200, "not json")]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn lookups_are_cached_per_lowercased_name() {
    let stub = QueueGatewayStub::start(vec![(200, r#"{"async_url": "ORDERS.Q"}"#)]).await;
    let resolver = HttpQueueResolver::new(&stub.config()).unwrap();

    assert_eq!(resolver.resolve_for_function("Reindex").await, "ORDERS.Q");
    assert_eq!(resolver.resolve_for_function("REINDEX").await, "ORDERS.Q");
    assert_eq!(stub.hits(), 1);

    // Clearing the cache forces a fresh lookup; the script is exhausted so
    // the stub now answers 500 and the resolver falls back.
    resolver.clear_cache();
    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
    assert!(stub.hits() > 1);
}

#[tokio::test]
async fn connection_refused_is_retried_then_falls_back() {
    // Bind and drop a listener to get a port nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = QueueConfig {
        function_endpoint: Some(format!("http://{addr}/api/fn")),
        http_timeout_ms: Some(200),
        max_attempts: Some(2),
        initial_backoff_ms: Some(1),
        ..QueueConfig::default()
    };
    let resolver = HttpQueueResolver::new(&config).unwrap();
    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
}

#[tokio::test]
async fn malformed_endpoint_resolves_to_fallback() {
    let config = QueueConfig {
        function_endpoint: Some("not a uri".into()),
        ..QueueConfig::default()
    };
    let resolver = HttpQueueResolver::new(&config).unwrap();
    assert_eq!(resolver.resolve_for_function("reindex").await, "reindex_queue");
}
