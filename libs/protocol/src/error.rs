//! Error types for frame decoding and command validation.

use thiserror::Error;

/// Errors produced by the frame codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame has no `:` separator or an invalid command token.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The text after the separator is not valid JSON.
    #[error("invalid frame payload: {0}")]
    InvalidPayload(String),

    /// A command token outside `[A-Za-z0-9._-]+` was given to the encoder.
    #[error("invalid command name: {0:?}")]
    InvalidCommand(String),
}

impl FrameError {
    /// Returns true if the frame could not be split into command and payload.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FrameError::Malformed(_))
    }
}

/// Errors produced when turning a decoded frame into a typed command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No command of this name exists for the receiving role.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A required field is absent or has the wrong type.
    #[error("{command}: missing required field '{field}'")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    /// The arguments do not match the command's shape.
    #[error("{command}: invalid arguments: {message}")]
    InvalidArgs {
        command: &'static str,
        message: String,
    },
}

impl CommandError {
    pub(crate) fn invalid_args(command: &'static str, err: serde_json::Error) -> Self {
        CommandError::InvalidArgs {
            command,
            message: err.to_string(),
        }
    }
}
