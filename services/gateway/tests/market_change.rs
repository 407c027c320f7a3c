//! Command surface driven through the router with an in-memory ledger

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use command_log::RecordPosition;
use gateway::ledger::{SqliteLedger, StatusLedger};
use gateway::publisher::CommandPublisher;
use gateway::{AppState, create_router};
use http_body_util::BodyExt;
use market_types::prelude::*;
use read_store::SqliteStatusLedger;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const PAYLOAD: &str = r#"{
    "marketId": "1231231",
    "marketName": "Match Odds",
    "event": {"id": "987654321", "name": "Sporting vs Benfica", "date": "01/01/2027"},
    "selections": [
        {"id": "182", "name": "Benfica", "odd": 1.13},
        {"id": "318", "name": "Sporting", "odd": 1.10},
        {"id": "871", "name": "Draw", "odd": 1.39}
    ]
}"#;

#[derive(Default)]
struct RecordingPublisher {
    fail: AtomicBool,
    published: Mutex<Vec<CommandEnvelope>>,
}

#[async_trait]
impl CommandPublisher for RecordingPublisher {
    async fn publish(&self, envelope: &CommandEnvelope) -> anyhow::Result<RecordPosition> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        let mut published = self.published.lock().unwrap();
        published.push(envelope.clone());
        Ok(RecordPosition {
            partition: 0,
            sequence: published.len() as u64,
        })
    }
}

/// Delegates to the SQLite ledger and remembers which ids it was given.
struct TrackingLedger {
    inner: SqliteLedger,
    inserted: Mutex<Vec<RequestId>>,
}

#[async_trait]
impl StatusLedger for TrackingLedger {
    async fn insert_pending(&self, row: RequestStatus) -> anyhow::Result<()> {
        self.inserted.lock().unwrap().push(row.request_id);
        self.inner.insert_pending(row).await
    }

    async fn discard_pending(&self, id: RequestId) -> anyhow::Result<bool> {
        self.inner.discard_pending(id).await
    }
}

struct Harness {
    publisher: Arc<RecordingPublisher>,
    ledger: Arc<SqliteStatusLedger>,
    tracking: Arc<TrackingLedger>,
    router: axum::Router,
}

fn harness() -> Harness {
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(SqliteStatusLedger::open_in_memory().unwrap());
    let tracking = Arc::new(TrackingLedger {
        inner: SqliteLedger::new(Arc::clone(&ledger)),
        inserted: Mutex::new(Vec::new()),
    });
    let state = AppState::new(publisher.clone(), tracking.clone(), "http://127.0.0.1:9".to_string());
    Harness {
        publisher,
        ledger,
        tracking,
        router: create_router(state),
    }
}

async fn send(router: &axum::Router, method: Method, body: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .method(method)
        .uri("/api/v1/market-change")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, location, body)
}

#[tokio::test]
async fn test_post_is_accepted_with_location() {
    let h = harness();
    let (status, location, body) = send(&h.router, Method::POST, PAYLOAD).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let location = location.unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["location"], location.as_str());
    assert_eq!(location, format!("/api/v1/requests/{}", body["requestId"].as_str().unwrap()));

    let published = h.publisher.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].command.operation(), Operation::Add);
    assert_eq!(published[0].key(), "1231231");

    let row = h.ledger.get(&published[0].request_id).unwrap().unwrap();
    assert_eq!(row.status, RequestState::Pending);
    assert_eq!(row.market_id.as_str(), "1231231");
}

#[tokio::test]
async fn test_verbs_map_to_operations() {
    let h = harness();
    assert_eq!(send(&h.router, Method::PUT, PAYLOAD).await.0, StatusCode::ACCEPTED);
    assert_eq!(send(&h.router, Method::DELETE, PAYLOAD).await.0, StatusCode::ACCEPTED);

    let ops: Vec<Operation> = h
        .publisher
        .published
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.command.operation())
        .collect();
    assert_eq!(ops, vec![Operation::Update, Operation::Delete]);
}

#[tokio::test]
async fn test_each_request_gets_its_own_id() {
    let h = harness();
    let (_, first, _) = send(&h.router, Method::POST, PAYLOAD).await;
    let (_, second, _) = send(&h.router, Method::POST, PAYLOAD).await;
    assert_ne!(first.unwrap(), second.unwrap());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let h = harness();
    let (status, location, body) = send(&h.router, Method::POST, "{\"marketId\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(location.is_none());
    assert_eq!(body["error"], "MALFORMED_PAYLOAD");
    assert!(h.tracking.inserted.lock().unwrap().is_empty());

    let missing_event = r#"{"marketId": "1", "selections": []}"#;
    assert_eq!(send(&h.router, Method::PUT, missing_event).await.0, StatusCode::BAD_REQUEST);

    let bad_odd = r#"{"marketId": "1", "event": {"id": "2"}, "selections": [{"id": "s", "odd": -1}]}"#;
    assert_eq!(send(&h.router, Method::POST, bad_odd).await.0, StatusCode::BAD_REQUEST);

    assert!(h.publisher.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_other_verbs_are_unsupported() {
    let h = harness();
    for method in [Method::PATCH, Method::GET] {
        let (status, _, body) = send(&h.router, method, PAYLOAD).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "UNSUPPORTED_OPERATION");
    }
    assert!(h.publisher.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_failure_leaves_no_status() {
    let h = harness();
    h.publisher.fail.store(true, Ordering::SeqCst);

    let (status, location, body) = send(&h.router, Method::POST, PAYLOAD).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(location.is_none());
    assert_eq!(body["error"], "SERVICE_UNAVAILABLE");
    assert!(h.publisher.published.lock().unwrap().is_empty());

    let inserted = h.tracking.inserted.lock().unwrap().clone();
    assert_eq!(inserted.len(), 1);
    assert!(h.ledger.get(&inserted[0]).unwrap().is_none());
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = h
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
