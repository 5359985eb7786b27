//! The fan-out hub: sole owner of the live connection registry.
//!
//! Every registry access (register, unregister, broadcast, queries) is a
//! [`HubCommand`](command::HubCommand) processed one at a time by the hub's
//! loop, so the registry is never observed mid-mutation.

pub mod actor;
pub mod command;
pub mod registry;

pub use actor::{Hub, HubHandle};
pub use registry::Registry;
