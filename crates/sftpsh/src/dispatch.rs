//! Command dispatch
//!
//! Resolves a parsed [`Command`] to a registered [`CommandHandler`] and runs
//! it against the session. `help`, `quit` and `close` are resolved before the
//! registry is consulted and never need a live channel.

use crate::commands;
use crate::help;
use crate::line::Command;
use crate::session::Session;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// What a successful command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Nothing to print
    None,
    /// Free text
    Text(String),
    /// One item per line
    Lines(Vec<String>),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::None => Ok(()),
            Output::Text(text) => f.write_str(text),
            Output::Lines(lines) => f.write_str(&lines.join("\n")),
        }
    }
}

/// Outcome of one dispatched line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep reading input
    Continue(Output),
    /// End the session
    Quit,
}

/// A named command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Name the command is typed as
    fn name(&self) -> &'static str;

    /// Usage line shown on argument errors
    fn usage(&self) -> &'static str;

    /// Whether the command needs a live channel
    fn requires_connection(&self) -> bool {
        true
    }

    /// Run with the raw argument vector
    ///
    /// Implementations check their arguments before touching the session.
    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output>;
}

/// Check that `args` holds between `min` and `max` entries
///
/// # Errors
///
/// [`Error::Usage`] naming `handler` otherwise.
pub fn check_arity(handler: &dyn CommandHandler, args: &[String], min: usize, max: usize) -> Result<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("expected {min} argument{}", if min == 1 { "" } else { "s" })
    } else {
        format!("expected {min} to {max} arguments")
    };
    Err(Error::usage(
        handler.name(),
        handler.usage(),
        format!("{expected}, got {}", args.len()),
    ))
}

/// Appends the command to the session history once `inner` succeeds
pub struct Recorded<H> {
    inner: H,
}

/// Wrap `handler` so successful calls are recorded
pub fn recorded<H: CommandHandler>(handler: H) -> Recorded<H> {
    Recorded { inner: handler }
}

#[async_trait]
impl<H: CommandHandler> CommandHandler for Recorded<H> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn usage(&self) -> &'static str {
        self.inner.usage()
    }

    fn requires_connection(&self) -> bool {
        self.inner.requires_connection()
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        let output = self.inner.run(session, args).await?;
        session.history_mut().record(self.inner.name(), args);
        Ok(output)
    }
}

/// Registry of named commands
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.names())
            .finish()
    }
}

impl Dispatcher {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command
    pub fn standard() -> Self {
        let mut dispatcher = Self::new();
        commands::register_all(&mut dispatcher);
        dispatcher
    }

    /// Add `handler` under its name, replacing any previous one
    pub fn register(&mut self, handler: impl CommandHandler + 'static) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run one command against `session`
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCommand`] for an unregistered name,
    /// [`Error::NotConnected`] when the command needs a channel and there is
    /// none, otherwise whatever the handler raised. A transport failure also
    /// drops the session's channel.
    pub async fn dispatch(&self, session: &mut Session, command: &Command) -> Result<Dispatch> {
        let args = command.args.as_slice();

        match command.name.as_str() {
            "help" => {
                if args.len() > 1 {
                    return Err(Error::usage(
                        "help",
                        "help [command]",
                        format!("expected 0 to 1 arguments, got {}", args.len()),
                    ));
                }
                let text = help::render(session.help_dir(), args.first().map(String::as_str)).await?;
                return Ok(Dispatch::Continue(Output::Text(text)));
            }
            "quit" => {
                if !args.is_empty() {
                    return Err(Error::usage("quit", "quit", format!("expected 0 arguments, got {}", args.len())));
                }
                return Ok(Dispatch::Quit);
            }
            "close" => {
                if !args.is_empty() {
                    return Err(Error::usage("close", "close", format!("expected 0 arguments, got {}", args.len())));
                }
                if let Err(e) = session.close().await {
                    warn!(event = "close_failed", error = %e, "Failed to close connection");
                }
                return Ok(Dispatch::Quit);
            }
            _ => {}
        }

        let handler = self
            .handlers
            .get(command.name.as_str())
            .ok_or_else(|| Error::UnknownCommand(command.name.clone()))?;

        if handler.requires_connection() && !session.is_connected() {
            return Err(Error::NotConnected);
        }

        debug!(command = handler.name(), args = args.len(), "dispatch");
        match handler.run(session, args).await {
            Ok(output) => Ok(Dispatch::Continue(output)),
            Err(e) => {
                if e.is_connection_lost() {
                    session.invalidate(&e);
                }
                Err(e)
            }
        }
    }
}
