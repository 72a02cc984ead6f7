//! beacon nodes
//!
//! One controller and any number of agents exchange `command:json` frames
//! over a publish/subscribe transport. The controller discovers agents,
//! polls their status and asks them to suspend or resume; agents announce
//! themselves and report their local state.
//!
//! ## Architecture
//!
//! Controller and agent each embed a [`node::Node`], which owns the
//! transport subscription and a receive loop dispatching frames through an
//! immutable [`node::Registry`] to a role-specific [`node::Handler`].
//!
//! ```text
//! Controller                                  Agent
//! ├── Node (control channel)                  ├── Node (agent + broadcast channels)
//! │   └── ControllerHandler ── AgentTable     │   └── AgentHandler ── LocalState
//! └── serve loop  ──── broadcast/unicast ───► └── work loop ──── notify ───► control
//! ```
//!
//! ## Modules
//!
//! - `node`: registry, dispatch, receive loop and publishing
//! - `controller`: agent table, probe planning and the serve loop
//! - `agent`: local state and the work loop
//! - `config`: environment configuration

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod node;

pub use agent::{Agent, AgentConfig, LocalState};
pub use config::Config;
pub use controller::{AgentRecord, Controller, ControllerConfig, MetaState, ProbeStrategy};
pub use error::{HandlerError, NodeError};
