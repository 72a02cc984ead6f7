//! Node building blocks shared by the controller and the agent.
//!
//! - `Registry`: command name to parser map, fixed at construction
//! - `Handler`: typed command behavior for one role
//! - `Node`: subscription, receive loop and teardown
//! - `Publisher`: outbound frame encoding and publishing

mod publisher;
mod registry;
mod runtime;
mod stats;

pub use publisher::Publisher;
pub use registry::{DispatchOutcome, Handler, Registry, RegistryBuilder};
pub use runtime::Node;
pub use stats::{NodeStats, StatsSnapshot};
