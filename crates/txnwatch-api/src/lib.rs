//! # txnwatch-api
//!
//! HTTP layer for txnwatch built on Axum.
//!
//! Provides the WebSocket upgrade endpoint that subscribes a client to one
//! entity's notifications, the health endpoint, and error mapping.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
