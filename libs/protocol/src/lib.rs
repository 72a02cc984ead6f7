//! # beacon-protocol
//!
//! Wire-level types for the beacon controller/agent signalling protocol.
//!
//! ## Frames
//!
//! Every message on the bus is a single frame:
//!
//! ```text
//! <command> ":" <json-payload>
//! ```
//!
//! where `command` matches `[A-Za-z0-9._-]+`. See [`frame`].
//!
//! ## Channels
//!
//! A realm owns three kinds of channels:
//! - control: all agents publish to the controller here
//! - broadcast: the controller publishes to every agent here
//! - agent: one unicast channel per agent name
//!
//! ## Commands
//!
//! Each node role accepts a closed set of commands ([`ControllerCommand`],
//! [`AgentCommand`]). Required fields are validated while parsing, before any
//! handler sees the command.

mod channel;
mod command;
mod envelope;
mod error;
pub mod frame;

pub use channel::{ChannelPrefixes, Channels, Realm};
pub use command::{
    names, AgentCommand, AgentNotice, ControllerCommand, DiscoverArgs, Parser, StateChange,
    StatusRequest, PROTOCOL_VERSION,
};
pub use envelope::{Envelope, Failure, ResultCode};
pub use error::{CommandError, FrameError};
pub use frame::{decode, encode, Frame};
