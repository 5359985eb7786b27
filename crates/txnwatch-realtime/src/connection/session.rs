//! Drives one accepted WebSocket from registration to teardown.

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::task::JoinError;
use tokio::time;
use tracing::{debug, error, info, warn};

use txnwatch_core::types::EntityId;

use crate::hub::HubHandle;

use super::handle::open;
use super::pump::{run_inbound, run_outbound, InboundExit, OutboundExit, PumpSettings};
use super::state::{ConnectionLifecycle, ConnectionState};

/// Which pump ended the connection.
enum Finished {
    Inbound(InboundExit),
    Outbound(Result<OutboundExit, JoinError>),
}

/// Serve a socket subscribed to `subscription` until either side ends.
///
/// The connection is registered with the hub before any message can reach
/// it and unregistered exactly once on the way out, whichever pump stops
/// first. A failed registration closes the socket straight away.
pub async fn serve_connection<S, E>(
    socket: S,
    subscription: EntityId,
    hub: HubHandle,
    settings: PumpSettings,
    outbox_capacity: usize,
) where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: fmt::Display + Send,
    E: fmt::Display,
{
    let (handle, outbox) = open(subscription, outbox_capacity);
    let conn_id = handle.id;
    let lifecycle = Arc::new(ConnectionLifecycle::new());
    let (mut sink, stream) = socket.split();

    if let Err(e) = hub.register(handle).await {
        warn!(conn_id = %conn_id, error = %e, "Registration failed, closing connection");
        lifecycle.close();
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
        return;
    }

    if let Err(e) = lifecycle.transition(ConnectionState::Active) {
        error!(conn_id = %conn_id, error = %e, "Unexpected connection state");
    }
    info!(conn_id = %conn_id, subscription_id = %subscription, "WebSocket connection established");

    let mut outbound = tokio::spawn({
        let lifecycle = lifecycle.clone();
        let settings = settings.clone();
        async move { run_outbound(sink, outbox, &lifecycle, &settings).await }
    });

    let finished = tokio::select! {
        exit = run_inbound(stream, conn_id, &settings) => Finished::Inbound(exit),
        result = &mut outbound => Finished::Outbound(result),
    };

    let reason = match finished {
        Finished::Inbound(exit) => {
            lifecycle.begin_draining();
            hub.unregister(conn_id).await;
            // Unregistering closes the outbox, so the pump sends its close
            // frame and stops on its own.
            if time::timeout(settings.close_grace, &mut outbound).await.is_err() {
                debug!(conn_id = %conn_id, "Close frame not flushed in time");
                outbound.abort();
            }
            exit.to_string()
        }
        Finished::Outbound(Ok(exit)) => {
            hub.unregister(conn_id).await;
            exit.to_string()
        }
        Finished::Outbound(Err(e)) => {
            error!(conn_id = %conn_id, error = %e, "Outbound pump failed");
            hub.unregister(conn_id).await;
            "outbound_failed".to_string()
        }
    };

    lifecycle.close();
    info!(
        conn_id = %conn_id,
        subscription_id = %subscription,
        reason = %reason,
        "WebSocket connection closed"
    );
}
