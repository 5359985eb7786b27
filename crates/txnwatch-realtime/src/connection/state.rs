//! Per-connection lifecycle state machine.
//!
//! `Registering → Active → Draining → Closed`, plus `Registering → Closed`
//! for connections that never made it into the registry. `Closed` is
//! terminal. Both pumps share one [`ConnectionLifecycle`]; whichever side
//! notices the end first moves the connection to `Draining`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Accepted, not yet in the registry.
    Registering = 0,
    /// Registered; messages flow.
    Active = 1,
    /// Shutting down; the close frame is being flushed.
    Draining = 2,
    /// Gone.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Registering,
            1 => Self::Active,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Registering, Self::Active)
                | (Self::Registering, Self::Closed)
                | (Self::Active, Self::Draining)
                | (Self::Draining, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registering => write!(f, "registering"),
            Self::Active => write!(f, "active"),
            Self::Draining => write!(f, "draining"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid connection transition {from} -> {to}")]
pub struct InvalidTransition {
    /// State at the time of the attempt.
    pub from: ConnectionState,
    /// Requested state.
    pub to: ConnectionState,
}

/// Shared, lock-free lifecycle cell.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: AtomicU8,
}

impl ConnectionLifecycle {
    /// Starts in `Registering`.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Registering as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attempt `current → next`; returns the previous state on success.
    pub fn transition(&self, next: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = ConnectionState::from_u8(current);
            if !from.can_transition_to(next) {
                return Err(InvalidTransition { from, to: next });
            }
            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(from),
                Err(actual) => current = actual,
            }
        }
    }

    /// Move `Active → Draining`. Returns `true` only for the caller that
    /// performed the move.
    pub fn begin_draining(&self) -> bool {
        self.transition(ConnectionState::Draining).is_ok()
    }

    /// Move to `Closed` from wherever the connection is. Returns `false` if
    /// it was already closed.
    pub fn close(&self) -> bool {
        // Active has to pass through Draining.
        let _ = self.transition(ConnectionState::Draining);
        self.transition(ConnectionState::Closed).is_ok()
    }
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
