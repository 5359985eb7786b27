//! Shared test helpers for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use txnwatch_api::{AppState, build_router};
use txnwatch_core::config::{
    AppConfig, BridgeConfig, DatabaseConfig, LoggingConfig, RealtimeConfig, ServerConfig,
};
use txnwatch_realtime::RealtimeEngine;
use txnwatch_realtime::bridge::{MemoryNotificationSource, MemoryPublisher};

/// Client side of a test WebSocket.
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Running server backed by an in-memory notification source.
pub struct TestApp {
    /// Address the server listens on
    pub addr: SocketAddr,
    /// The Axum router for in-process requests
    pub router: Router,
    /// Realtime engine behind the router
    pub engine: RealtimeEngine,
    /// Publishes raw notification payloads
    pub publisher: MemoryPublisher,
}

/// Test configuration; the database is never contacted.
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://postgres@localhost/unused".to_string(),
            connect_timeout_seconds: 1,
        },
        bridge: BridgeConfig::default(),
        realtime: RealtimeConfig::default(),
        logging: LoggingConfig::default(),
    }
}

impl TestApp {
    /// Start a server with the default test configuration.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Start a server with `config`.
    pub async fn with_config(config: AppConfig) -> Self {
        let engine = RealtimeEngine::start(config.realtime.clone());
        let (source, publisher) = MemoryNotificationSource::new();
        engine.spawn_bridge(source, &config.bridge);
        publisher.wait_for_subscriptions(1).await;

        let router = build_router(AppState::new(engine.clone()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let app = router.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            addr,
            router,
            engine,
            publisher,
        }
    }

    /// Open a WebSocket to `/ws` with the given query string.
    pub async fn connect(&self, query: &str) -> WsClient {
        let url = format!("ws://{}/ws{}", self.addr, query);
        let (client, _) = connect_async(url).await.expect("Failed to connect");
        client
    }

    /// Open a WebSocket subscribed to `id` and wait until it is registered.
    pub async fn subscribe(&self, id: i64) -> WsClient {
        let before = self.engine.connection_count().await.expect("count");
        let client = self.connect(&format!("?subscription_id={id}")).await;
        self.wait_for_connections(before + 1).await;
        client
    }

    /// Wait until the hub reports exactly `expected` live connections.
    pub async fn wait_for_connections(&self, expected: usize) {
        for _ in 0..500 {
            if self.engine.connection_count().await.expect("count") == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connection count never reached {expected}");
    }

    /// Make an in-process HTTP request
    pub async fn request(&self, method: &str, path: &str) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Test response
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Parsed JSON body (`Null` if not JSON)
    pub body: Value,
}

/// What the client saw next, ignoring liveness frames.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    /// A text message
    Text(String),
    /// A close frame, or the stream ended
    Closed,
    /// Nothing within the wait
    Nothing,
}

/// Next meaningful frame, waiting at most `wait`.
pub async fn next_frame(client: &mut WsClient, wait: Duration) -> Received {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return Received::Text(text.as_str().to_string()),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Received::Closed,
                Some(Ok(_)) => continue,
            }
        }
    };
    tokio::time::timeout(wait, read)
        .await
        .unwrap_or(Received::Nothing)
}

/// Next text message; panics on anything else.
pub async fn next_text(client: &mut WsClient) -> String {
    match next_frame(client, Duration::from_secs(5)).await {
        Received::Text(text) => text,
        other => panic!("expected a text message, got {other:?}"),
    }
}
