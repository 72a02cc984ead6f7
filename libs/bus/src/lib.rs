//! # beacon-bus
//!
//! The publish/subscribe transport used by beacon nodes.
//!
//! Nodes only need three things from a broker:
//! - `publish(channel, bytes)`
//! - `subscribe(channels)` returning a stream of inbound messages
//! - `close()`
//!
//! [`Transport`] captures that contract. [`MemoryBroker`] is an in-process
//! implementation used by tests, the simulator binary and single-process
//! deployments.
//!
//! Delivery is at-most-once and fire-and-forget. Nothing is persisted or
//! replayed.

mod error;
mod memory;
mod transport;

pub use error::TransportError;
pub use memory::{MemoryBroker, MemoryConnection};
pub use transport::{InboundMessage, Subscription, Transport};
