//! WebSocket connection lifecycle: handles, outboxes, state machine, pumps.

pub mod handle;
pub mod pump;
pub mod session;
pub mod state;

pub use handle::{open, ConnectionHandle, Delivery, Outbox};
pub use pump::PumpSettings;
pub use session::serve_connection;
pub use state::{ConnectionLifecycle, ConnectionState};
