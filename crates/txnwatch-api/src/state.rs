//! Application state shared across all handlers.

use txnwatch_realtime::RealtimeEngine;

/// Application state, passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// WebSocket realtime engine
    pub realtime: RealtimeEngine,
}

impl AppState {
    /// Creates the state around a started engine.
    pub fn new(realtime: RealtimeEngine) -> Self {
        Self { realtime }
    }
}
