//! Command registry and dispatch.
//!
//! A registry maps command names to parsers for one node role. It is built
//! once with [`RegistryBuilder`] during node construction and cannot be
//! changed afterwards. Dispatch is the boundary where every failure is
//! caught: unknown commands, invalid arguments, handler errors and handler
//! panics are logged and turned into a [`DispatchOutcome`].

use std::collections::HashMap;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use beacon_protocol::{CommandError, Frame, Parser};
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::error::HandlerError;

/// Behavior for the typed commands of one node role.
///
/// The receive loop calls `handle` for one command at a time.
#[async_trait]
pub trait Handler: Send + 'static {
    /// The closed set of commands this handler accepts.
    type Command: Send + Debug + 'static;

    async fn handle(&mut self, command: Self::Command) -> Result<(), HandlerError>;
}

/// What happened to a dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and succeeded.
    Handled,
    /// No command of that name is registered; the frame was dropped.
    Unknown,
    /// The arguments failed validation; the handler was not called.
    Rejected,
    /// The handler returned an error or panicked.
    Failed,
}

/// Builder for a [`Registry`].
pub struct RegistryBuilder<C> {
    role: &'static str,
    parsers: HashMap<&'static str, Parser<C>>,
}

impl<C> RegistryBuilder<C> {
    /// Register a parser for `command`.
    ///
    /// Registering the same name twice replaces the earlier parser and logs a
    /// warning.
    pub fn register(mut self, command: &'static str, parser: Parser<C>) -> Self {
        if self.parsers.insert(command, parser).is_some() {
            warn!(
                role = self.role,
                command, "Command registered twice, replacing earlier parser"
            );
        }
        self
    }

    /// Register several commands at once.
    pub fn register_all<I>(self, parsers: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Parser<C>)>,
    {
        parsers
            .into_iter()
            .fold(self, |builder, (command, parser)| builder.register(command, parser))
    }

    pub fn build(self) -> Registry<C> {
        Registry {
            role: self.role,
            parsers: self.parsers,
        }
    }
}

/// Immutable command registry for one node role.
pub struct Registry<C> {
    role: &'static str,
    parsers: HashMap<&'static str, Parser<C>>,
}

impl<C> Registry<C> {
    pub fn builder(role: &'static str) -> RegistryBuilder<C> {
        RegistryBuilder {
            role,
            parsers: HashMap::new(),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    pub fn contains(&self, command: &str) -> bool {
        self.parsers.contains_key(command)
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.parsers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Turn a frame into a typed command.
    pub fn resolve(&self, frame: Frame) -> Result<C, CommandError> {
        let parser = self
            .parsers
            .get(frame.command.as_str())
            .ok_or_else(|| CommandError::UnknownCommand(frame.command.clone()))?;
        parser(frame.payload)
    }
}

impl<C: Send + Debug + 'static> Registry<C> {
    /// Resolve `frame` and hand the command to `handler`.
    ///
    /// Never returns an error; every failure is logged and reported through
    /// the outcome.
    pub async fn dispatch<H>(&self, frame: Frame, handler: &mut H) -> DispatchOutcome
    where
        H: Handler<Command = C>,
    {
        let command_name = frame.command.clone();

        let command = match self.resolve(frame) {
            Ok(command) => command,
            Err(CommandError::UnknownCommand(name)) => {
                warn!(role = self.role, command = %name, "Unknown command, dropping frame");
                return DispatchOutcome::Unknown;
            }
            Err(e) => {
                warn!(
                    role = self.role,
                    command = %command_name,
                    error = %e,
                    "Invalid command arguments, dropping frame"
                );
                return DispatchOutcome::Rejected;
            }
        };

        debug!(role = self.role, command = ?command, "Dispatching command");

        match AssertUnwindSafe(handler.handle(command)).catch_unwind().await {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(e)) => {
                error!(
                    role = self.role,
                    command = %command_name,
                    error = %e,
                    "Command handler failed"
                );
                DispatchOutcome::Failed
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(
                    role = self.role,
                    command = %command_name,
                    panic = %message,
                    "Command handler panicked"
                );
                DispatchOutcome::Failed
            }
        }
    }
}
