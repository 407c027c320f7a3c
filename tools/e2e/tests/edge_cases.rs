//! Rejections, idempotence and ordering edge cases

use e2e::scenario::{sample_payload, selection};
use e2e::{Cluster, MarketClient};
use market_types::prelude::*;
use reqwest::{Method, StatusCode};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn completed(client: &MarketClient, operation: Operation, payload: &MarketPayload) -> StatusResponse {
    let submitted = client.submit(operation, payload).await.unwrap();
    assert_eq!(submitted.status, StatusCode::ACCEPTED);
    client
        .wait_for_terminal(submitted.location().unwrap(), TIMEOUT)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unparseable_body_is_rejected() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    let reply = client.send_raw(Method::POST, "{\"marketId\": 12,").await.unwrap();
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.location.is_none());
    assert_eq!(reply.body["error"], "MALFORMED_PAYLOAD");

    let reply = client
        .send_raw(Method::POST, r#"{"marketId": "1", "event": {"id": "2"}, "selections": [{"id": "a", "odd": 0}]}"#)
        .await
        .unwrap();
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    // A valid command sent afterwards is the only thing that shows up
    completed(&client, Operation::Add, &sample_payload()).await;
    let listing = client.events().await.unwrap();
    assert_eq!(listing.events.len(), 1);
    assert_eq!(listing.events[0].id.as_str(), "987654321");

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_patch_is_unsupported() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    let body = serde_json::to_string(&sample_payload()).unwrap();
    let reply = client.send_raw(Method::PATCH, body).await.unwrap();
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.body["error"], "UNSUPPORTED_OPERATION");
    assert!(reply.location.is_none());
    assert!(client.events().await.unwrap().events.is_empty());

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_add_is_idempotent() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    let first = completed(&client, Operation::Add, &sample_payload()).await;
    let second = completed(&client, Operation::Add, &sample_payload()).await;
    assert_eq!(first.status, RequestState::Success);
    assert_eq!(second.status, RequestState::Success);
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(second.message, "Replaced market 1231231 of event 987654321");

    let listing = client.events().await.unwrap();
    assert_eq!(listing.events.len(), 1);
    assert_eq!(listing.events[0].markets.len(), 1);
    assert_eq!(listing.events[0].markets[0].selections.len(), 3);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_after_delete() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    completed(&client, Operation::Add, &sample_payload()).await;
    let first = completed(&client, Operation::Delete, &sample_payload()).await;
    let second = completed(&client, Operation::Delete, &sample_payload()).await;

    assert_eq!(first.status, RequestState::Success);
    assert_eq!(second.status, RequestState::Success);
    assert_eq!(
        second.message,
        "Market 1231231 not found in event 987654321, nothing to delete"
    );

    let listing = client.events().await.unwrap();
    assert_eq!(listing.events.len(), 1);
    assert!(listing.events[0].markets.is_empty());

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_update_before_add_fails() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    let status = completed(&client, Operation::Update, &sample_payload()).await;
    assert_eq!(status.status, RequestState::Failed);
    assert_eq!(
        status.message,
        "Failed to update market 1231231 of event 987654321: market 1231231 does not exist"
    );
    assert!(client.events().await.unwrap().events.is_empty());

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_terminal_status_never_changes() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    let submitted = client.submit(Operation::Add, &sample_payload()).await.unwrap();
    let location = submitted.location().unwrap().to_string();
    let terminal = client.wait_for_terminal(&location, TIMEOUT).await.unwrap();

    // Later commands on the same market do not touch the earlier request
    let mut update = sample_payload();
    update.selections = vec![selection("9", "Other", 300)];
    completed(&client, Operation::Update, &update).await;
    completed(&client, Operation::Delete, &update).await;

    for _ in 0..5 {
        let again = client.status(&location).await.unwrap().unwrap();
        assert_eq!(again, terminal);
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unknown_request_location() {
    let cluster = Cluster::start().await.unwrap();
    let client = MarketClient::new(cluster.gateway_url());

    let location = format!("/api/v1/requests/{}", RequestId::new());
    assert!(client.status(&location).await.unwrap().is_none());

    cluster.shutdown().await;
}
