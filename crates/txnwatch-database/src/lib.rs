//! # txnwatch-database
//!
//! PostgreSQL access for txnwatch: opening `LISTEN` connections and
//! exposing them as a [`NotificationSource`](listener::NotificationSource).

pub mod connection;
pub mod listener;

pub use listener::{NotificationSource, PgNotificationSource};
