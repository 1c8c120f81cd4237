//! Webhook wire-format tests against a local HTTP endpoint.
//!
//! These spin up a real axum listener on an ephemeral port and drive the
//! webhook adapter (and the full worker pipeline) against it, asserting
//! the exact payload and headers subscribers receive.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use courier_notification_service::channel::{ChannelAdapter, SendError, WebhookAdapter};
use courier_notification_service::config::{RetrySettings, WebhookConfig, WorkerSettings};
use courier_notification_service::notification::{
    Channel, Dispatcher, NotificationJob, NotificationStatus, Priority, SubmitRequest,
};
use courier_notification_service::queue::{ChannelQueues, JobQueue, MemoryJobQueue};
use courier_notification_service::repository::{
    MemoryNotificationRepository, NotificationRepository,
};
use courier_notification_service::retry::RetryPolicy;
use courier_notification_service::worker::WorkerPool;

#[derive(Clone)]
struct HookState {
    captured: mpsc::UnboundedSender<(HeaderMap, serde_json::Value)>,
    /// Requests to reject with 500 before starting to accept.
    failures_left: Arc<AtomicU32>,
}

async fn hook_handler(
    State(state): State<HookState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let value: serde_json::Value = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    let _ = state.captured.send((headers, value));

    let remaining = state.failures_left.load(Ordering::SeqCst);
    if remaining > 0 {
        state.failures_left.store(remaining - 1, Ordering::SeqCst);
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Start a capture endpoint; returns its URL and the capture channel.
async fn start_hook_server(
    fail_first: u32,
) -> (
    String,
    mpsc::UnboundedReceiver<(HeaderMap, serde_json::Value)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = HookState {
        captured: tx,
        failures_left: Arc::new(AtomicU32::new(fail_first)),
    };
    let app = Router::new()
        .route("/hook", post(hook_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/hook"), rx)
}

fn webhook_job(url: &str, attempt: u32) -> NotificationJob {
    let mut data = HashMap::new();
    data.insert("order_id".to_string(), serde_json::json!(42));
    NotificationJob {
        id: Uuid::new_v4(),
        tenant_id: "system".to_string(),
        channel: Channel::Webhook,
        recipient: url.to_string(),
        subject: Some("Order update".to_string()),
        message: "shipped".to_string(),
        template: None,
        data,
        priority: Priority::Normal,
        attempt,
    }
}

#[tokio::test]
async fn test_delivered_payload_and_headers() {
    let (url, mut rx) = start_hook_server(0).await;
    let adapter = WebhookAdapter::new(WebhookConfig::default());

    let job = webhook_job(&url, 2);
    adapter.send(&job).await.unwrap();

    let (headers, body) = rx.recv().await.unwrap();
    assert_eq!(headers.get("x-webhook-attempt").unwrap(), "2");
    assert_eq!(
        headers.get("user-agent").unwrap(),
        "Courier-Notification-Service/1.0"
    );
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    assert_eq!(body["id"], job.id.to_string());
    assert_eq!(body["type"], "webhook");
    assert_eq!(body["subject"], "Order update");
    assert_eq!(body["message"], "shipped");
    assert_eq!(body["data"]["order_id"], 42);
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_optional_fields_are_omitted() {
    let (url, mut rx) = start_hook_server(0).await;
    let adapter = WebhookAdapter::new(WebhookConfig::default());

    let mut job = webhook_job(&url, 1);
    job.subject = None;
    job.data = HashMap::new();
    adapter.send(&job).await.unwrap();

    let (_, body) = rx.recv().await.unwrap();
    assert!(body.get("subject").is_none());
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_error_status_is_retryable_transport_error() {
    let (url, _rx) = start_hook_server(u32::MAX).await;
    let adapter = WebhookAdapter::new(WebhookConfig::default());

    let err = adapter.send(&webhook_job(&url, 1)).await.unwrap_err();
    assert!(matches!(err, SendError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_pipeline_retries_until_endpoint_recovers() {
    let (url, mut rx) = start_hook_server(2).await;

    let queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new(Duration::from_secs(30)));
    let mut queues: HashMap<Channel, Arc<dyn JobQueue>> = HashMap::new();
    for channel in Channel::ALL {
        queues.insert(
            channel,
            if channel == Channel::Webhook {
                queue.clone()
            } else {
                Arc::new(MemoryJobQueue::new(Duration::from_secs(30)))
            },
        );
    }
    let queues = ChannelQueues::new(queues);
    let records = Arc::new(MemoryNotificationRepository::new());
    let dispatcher = Dispatcher::new(queues.clone(), records.clone());

    let retry: RetrySettings = serde_json::from_value(serde_json::json!({
        "webhook_max_attempts": 3,
        "backoff_base_seconds": 0,
    }))
    .unwrap();
    let workers: WorkerSettings = serde_json::from_value(serde_json::json!({
        "webhook": 1,
        "poll_interval_ms": 10,
    }))
    .unwrap();

    let pool = WorkerPool::new(
        Channel::Webhook,
        queue,
        Arc::new(WebhookAdapter::new(WebhookConfig::default())),
        records.clone(),
        RetryPolicy::new(&retry),
        &workers,
    );
    let (shutdown_tx, _) = broadcast::channel(1);
    pool.spawn(&shutdown_tx);

    let request: SubmitRequest = serde_json::from_value(serde_json::json!({
        "type": "webhook",
        "recipient": url,
        "message": "payload",
    }))
    .unwrap();
    let record = dispatcher.submit(request).await.unwrap();

    // The endpoint 500s twice, so delivery lands on the third attempt.
    let mut attempts = Vec::new();
    for _ in 0..3 {
        let (headers, _) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        attempts.push(
            headers
                .get("x-webhook-attempt")
                .unwrap()
                .to_str()
                .unwrap()
                .to_string(),
        );
    }
    assert_eq!(attempts, vec!["1", "2", "3"]);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let stored = records.find_by_id(record.id).await.unwrap().unwrap();
        if stored.status == NotificationStatus::Sent {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "record never marked sent"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let _ = shutdown_tx.send(());
}
