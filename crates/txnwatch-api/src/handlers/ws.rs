//! WebSocket upgrade handler.

use std::fmt;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use tracing::{debug, warn};

use txnwatch_core::types::EntityId;

use crate::state::AppState;

/// Query parameters for the WebSocket endpoint.
#[derive(Debug, Default)]
pub struct WsQuery {
    /// Entity to subscribe to. `txn_id` is accepted as an alias.
    pub subscription_id: Option<String>,
}

impl WsQuery {
    /// Build from decoded query pairs. The first `subscription_id` or
    /// `txn_id` wins; repeats and unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let subscription_id = pairs
            .into_iter()
            .find(|(key, _)| key == "subscription_id" || key == "txn_id")
            .map(|(_, value)| value);
        Self { subscription_id }
    }
}

/// Why a connection request was turned away after the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionRejection {
    /// No subscription key was supplied.
    Missing,
    /// The key is not a valid integer.
    Invalid,
}

impl SubscriptionRejection {
    /// Text sent to the client before the connection is closed.
    pub fn message(self) -> &'static str {
        match self {
            Self::Missing => "Missing subscription_id parameter",
            Self::Invalid => "Invalid subscription_id parameter",
        }
    }
}

impl fmt::Display for SubscriptionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Extract the subscription key. An empty value counts as missing.
pub fn parse_subscription(query: &WsQuery) -> Result<EntityId, SubscriptionRejection> {
    match query.subscription_id.as_deref() {
        None | Some("") => Err(SubscriptionRejection::Missing),
        Some(raw) => raw
            .parse::<EntityId>()
            .map_err(|_| SubscriptionRejection::Invalid),
    }
}

/// GET /ws?subscription_id={id}: WebSocket upgrade
///
/// The upgrade always completes; a bad key is reported over the socket.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let subscription = parse_subscription(&WsQuery::from_pairs(pairs));
    ws.on_upgrade(move |socket| handle_ws_connection(state, subscription, socket))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(
    state: AppState,
    subscription: Result<EntityId, SubscriptionRejection>,
    mut socket: WebSocket,
) {
    match subscription {
        Ok(subscription) => state.realtime.serve(socket, subscription).await,
        Err(rejection) => {
            warn!(reason = %rejection, "Rejecting WebSocket connection");
            if let Err(e) = socket
                .send(Message::Text(rejection.message().to_string().into()))
                .await
            {
                debug!(error = %e, "Failed to send rejection");
                return;
            }
            let _ = socket.send(Message::Close(None)).await;
        }
    }
}
