//! Inbound and outbound pumps for one connection.
//!
//! The server only pushes; the inbound side exists to notice when the peer
//! goes away (close frame, read error, end of stream, or silence longer than
//! the idle timeout). The outbound side drains the outbox in FIFO order and
//! keeps the link alive with periodic pings.

use std::fmt;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use txnwatch_core::config::RealtimeConfig;
use txnwatch_core::types::ConnectionId;

use super::handle::Outbox;
use super::state::ConnectionLifecycle;

/// Timing knobs for the pumps.
#[derive(Debug, Clone)]
pub struct PumpSettings {
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Silence after which the inbound side gives up.
    pub idle_timeout: Duration,
    /// How long teardown waits for the close frame to flush.
    pub close_grace: Duration,
}

impl From<&RealtimeConfig> for PumpSettings {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_seconds.max(1)),
            idle_timeout: Duration::from_secs(config.idle_timeout_seconds.max(1)),
            close_grace: Duration::from_secs(config.close_grace_seconds),
        }
    }
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

/// Why the inbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundExit {
    /// The peer sent a close frame.
    PeerClosed,
    /// The stream ended without a close frame.
    EndOfStream,
    /// Reading failed.
    ReadError,
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
}

impl fmt::Display for InboundExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer_closed"),
            Self::EndOfStream => write!(f, "end_of_stream"),
            Self::ReadError => write!(f, "read_error"),
            Self::IdleTimeout => write!(f, "idle_timeout"),
        }
    }
}

/// Why the outbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundExit {
    /// The hub closed the outbox; a close frame was sent.
    OutboxClosed,
    /// Writing to the wire failed.
    WriteError,
}

impl fmt::Display for OutboundExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutboxClosed => write!(f, "outbox_closed"),
            Self::WriteError => write!(f, "write_error"),
        }
    }
}

/// Read frames until the peer goes away.
pub async fn run_inbound<S, E>(
    mut stream: S,
    conn_id: ConnectionId,
    settings: &PumpSettings,
) -> InboundExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let next = match time::timeout(settings.idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                debug!(conn_id = %conn_id, timeout = ?settings.idle_timeout, "Connection idle timeout");
                return InboundExit::IdleTimeout;
            }
        };

        match next {
            Some(Ok(Message::Close(frame))) => {
                debug!(conn_id = %conn_id, frame = ?frame, "Peer closed connection");
                return InboundExit::PeerClosed;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                trace!(conn_id = %conn_id, "Liveness frame");
            }
            Some(Ok(_)) => {
                trace!(conn_id = %conn_id, "Ignoring client data frame");
            }
            Some(Err(e)) => {
                debug!(conn_id = %conn_id, error = %e, "Read error");
                return InboundExit::ReadError;
            }
            None => return InboundExit::EndOfStream,
        }
    }
}

/// Drain the outbox onto the wire until it closes or a write fails.
pub async fn run_outbound<K>(
    mut sink: K,
    mut outbox: Outbox,
    lifecycle: &ConnectionLifecycle,
    settings: &PumpSettings,
) -> OutboundExit
where
    K: Sink<Message> + Unpin,
    K::Error: fmt::Display,
{
    let conn_id = outbox.id;
    let mut ping = time::interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            next = outbox.recv() => match next {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!(conn_id = %conn_id, error = %e, "Write error");
                        return OutboundExit::WriteError;
                    }
                }
                None => {
                    lifecycle.begin_draining();
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(conn_id = %conn_id, error = %e, "Close frame not delivered");
                    }
                    let _ = sink.close().await;
                    return OutboundExit::OutboxClosed;
                }
            },
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    debug!(conn_id = %conn_id, error = %e, "Ping failed");
                    return OutboundExit::WriteError;
                }
            }
        }
    }
}
