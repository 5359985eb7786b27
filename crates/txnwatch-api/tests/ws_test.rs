//! Integration tests for WebSocket subscriptions and the health endpoint.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;

use helpers::{Received, TestApp, next_frame, next_text};

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let _client = app.subscribe(1).await;

    let response = app.request("GET", "/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["connections"], 1);
}

#[tokio::test]
async fn test_health_unavailable_after_shutdown() {
    let app = TestApp::new().await;
    app.engine.shutdown().await;

    let mut status = StatusCode::OK;
    for _ in 0..100 {
        status = app.request("GET", "/health").await.status;
        if status != StatusCode::OK {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/ws?subscription_id=1").await;

    assert!(
        response.status.is_client_error(),
        "Expected a 4xx for a plain GET, got {}",
        response.status
    );
}

#[tokio::test]
async fn test_notifications_reach_only_matching_subscribers() {
    let app = TestApp::new().await;
    let mut a = app.subscribe(42).await;
    let mut b = app.subscribe(42).await;
    let mut c = app.subscribe(7).await;

    app.publisher.publish("42,confirmed").await;
    assert_eq!(next_text(&mut a).await, "Transaction 42 status changed to confirmed");
    assert_eq!(next_text(&mut b).await, "Transaction 42 status changed to confirmed");

    app.publisher.publish("7,shipped").await;
    assert_eq!(next_text(&mut c).await, "Transaction 7 status changed to shipped");
    assert_eq!(
        next_frame(&mut a, Duration::from_millis(200)).await,
        Received::Nothing
    );
}

#[tokio::test]
async fn test_messages_arrive_in_publish_order() {
    let app = TestApp::new().await;
    let mut client = app.subscribe(5).await;

    let statuses = ["created", "pending", "confirmed", "settled", "archived"];
    for status in statuses {
        app.publisher.publish(format!("5,{status}")).await;
    }
    for status in statuses {
        assert_eq!(
            next_text(&mut client).await,
            format!("Transaction 5 status changed to {status}")
        );
    }
}

#[tokio::test]
async fn test_malformed_payloads_are_dropped() {
    let app = TestApp::new().await;
    let mut client = app.subscribe(42).await;

    app.publisher.publish("abc,confirmed").await;
    app.publisher.publish("42").await;
    app.publisher.publish("42,ok,with,commas").await;

    assert_eq!(
        next_text(&mut client).await,
        "Transaction 42 status changed to ok,with,commas"
    );
    assert_eq!(app.engine.metrics_snapshot().payloads_rejected, 2);
}

#[tokio::test]
async fn test_missing_subscription_is_rejected() {
    let app = TestApp::new().await;
    let mut client = app.connect("").await;

    assert_eq!(next_text(&mut client).await, "Missing subscription_id parameter");
    assert_eq!(
        next_frame(&mut client, Duration::from_secs(5)).await,
        Received::Closed
    );
    assert_eq!(app.engine.connection_count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_invalid_subscription_is_rejected() {
    let app = TestApp::new().await;
    let mut client = app.connect("?subscription_id=abc").await;

    assert_eq!(next_text(&mut client).await, "Invalid subscription_id parameter");
    assert_eq!(
        next_frame(&mut client, Duration::from_secs(5)).await,
        Received::Closed
    );
    assert_eq!(app.engine.connection_count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_txn_id_alias_is_accepted() {
    let app = TestApp::new().await;
    let mut client = app.connect("?txn_id=9").await;
    app.wait_for_connections(1).await;

    app.publisher.publish("9,refunded").await;
    assert_eq!(next_text(&mut client).await, "Transaction 9 status changed to refunded");
}

#[tokio::test]
async fn test_repeated_subscription_key_uses_first_value() {
    let app = TestApp::new().await;
    let mut repeated = app.connect("?subscription_id=1&subscription_id=2").await;
    let mut mixed = app.connect("?subscription_id=1&txn_id=2").await;
    app.wait_for_connections(2).await;

    app.publisher.publish("2,ignored").await;
    app.publisher.publish("1,captured").await;
    assert_eq!(next_text(&mut repeated).await, "Transaction 1 status changed to captured");
    assert_eq!(next_text(&mut mixed).await, "Transaction 1 status changed to captured");
}

#[tokio::test]
async fn test_repeated_invalid_key_is_rejected_after_upgrade() {
    let app = TestApp::new().await;
    let mut client = app.connect("?subscription_id=abc&subscription_id=1").await;

    assert_eq!(next_text(&mut client).await, "Invalid subscription_id parameter");
    assert_eq!(
        next_frame(&mut client, Duration::from_secs(5)).await,
        Received::Closed
    );
}

#[tokio::test]
async fn test_client_close_unregisters() {
    let app = TestApp::new().await;
    let mut client = app.subscribe(3).await;
    let _other = app.subscribe(3).await;

    client.send(Message::Close(None)).await.expect("send close");
    app.wait_for_connections(1).await;
}

#[tokio::test]
async fn test_engine_shutdown_closes_clients() {
    let app = TestApp::new().await;
    let mut client = app.subscribe(11).await;

    app.engine.shutdown().await;
    assert_eq!(
        next_frame(&mut client, Duration::from_secs(5)).await,
        Received::Closed
    );
}
