//! # sftpsh
//!
//! Interactive shell over a single SFTP session.
//!
//! A user authenticates once and then types named commands that run against
//! the live session. The crate is built from a few layers:
//!
//! - [`channel::RemoteChannel`]: single-entry remote primitives, backed by
//!   `russh` + `russh-sftp` or by an in-memory tree
//! - [`auth::Authenticator`]: credential selection with bounded passphrase
//!   and password recovery, trust-on-first-use host keys
//! - [`dispatch::Dispatcher`]: explicit command registry with arity checks
//! - [`walker`] and [`recursive`]: subtree traversal, recursive copy and
//!   delete on top of the primitives
//! - [`history::HistoryLog`]: record of successful commands
//!
//! ## Features
//!
//! - Async/await with Tokio
//! - Password, plaintext key and encrypted key authentication
//! - Staged recursive copy that keeps empty directories
//! - Remote `cp -Rp` copy when the server allows command execution

pub mod auth;
pub mod channel;
pub mod commands;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod help;
pub mod history;
pub mod known_hosts;
pub mod line;
pub mod recursive;
pub mod session;
pub mod walker;

pub use auth::{AuthState, Authenticator, Connector, Prompter, Target, TerminalPrompter};
pub use channel::{MemoryChannel, RemoteChannel, SshConnector};
pub use config::{Config, LogFormat};
pub use credential::{Credential, CredentialSource};
pub use dispatch::{CommandHandler, Dispatch, Dispatcher, Output};
pub use error::{Error, Result};
pub use history::HistoryLog;
pub use known_hosts::KnownHosts;
pub use line::Command;
pub use session::Session;
