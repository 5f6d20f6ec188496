//! Error types for shell operations
//!
//! NIST 800-53: SI-11 (Error Handling)
//! Implementation: Every failure a handler can raise is a variant here, so the
//! REPL boundary can report it and keep the loop alive.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shell operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shell error types
#[derive(Error, Debug)]
pub enum Error {
    /// Wrong argument count or malformed argument
    ///
    /// Always recoverable: the handler rejected the call before touching any
    /// session or remote state.
    #[error("{command}: {reason} (usage: {usage})")]
    Usage {
        /// Handler that rejected the arguments
        command: String,
        /// Expected usage line
        usage: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Command needs a live connection
    #[error("Not connected, use 'connect' first")]
    NotConnected,

    /// No handler registered under this name
    #[error("Command not found: {0}, try 'help'")]
    UnknownCommand(String),

    /// Remote or local path does not exist
    #[error("No such file or directory: {0}")]
    NotFound(String),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Path exists but is not a regular file
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// Local path is a directory where a file was expected
    #[error("Is a directory: {}", .0.display())]
    IsADirectory(PathBuf),

    /// Permission denied
    ///
    /// NIST 800-53: AC-3 (Access Enforcement)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Copy destination already exists as a file
    #[error("Destination exists: {0}")]
    DestinationExists(String),

    /// Any other failure reported by the remote side
    #[error("Remote operation failed on {path}: {cause}")]
    Remote {
        /// Path the operation was applied to
        path: String,
        /// Underlying cause as reported by the channel
        cause: String,
    },

    /// Credential rejected by the server
    ///
    /// NIST 800-53: IA-2 (Identification and Authentication)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Private key is encrypted and no usable passphrase was given
    #[error("Private key {} requires a passphrase", .0.display())]
    PassphraseRequired(PathBuf),

    /// Neither a password nor a private key is available
    #[error("No supported authentication methods available (password, public key)")]
    NoSupportedCredential,

    /// Known host presented a different key
    ///
    /// NIST 800-53: IA-3 (Device Identification and Authentication)
    #[error("Host key for {0} does not match the recorded key")]
    HostKeyMismatch(String),

    /// Operation unavailable on this channel
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Help text could not be found
    #[error("Missing help file: {}", .0.display())]
    HelpFileMissing(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SSH transport error
    ///
    /// NIST 800-53: SC-8 (Transmission Confidentiality)
    #[error("SSH error: {0}")]
    Ssh(String),
}

impl Error {
    /// Build a usage error for `command`
    pub fn usage(command: &str, usage: &'static str, reason: impl Into<String>) -> Self {
        Error::Usage {
            command: command.to_string(),
            usage,
            reason: reason.into(),
        }
    }

    /// Build a remote failure for `path`
    pub fn remote(path: impl Into<String>, cause: impl ToString) -> Self {
        Error::Remote {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    /// Check if error is an arity or argument violation
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage { .. } | Error::UnknownCommand(_))
    }

    /// Check if error was raised by the remote side about a path
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::NotADirectory(_)
                | Error::NotAFile(_)
                | Error::PermissionDenied(_)
                | Error::DestinationExists(_)
                | Error::Remote { .. }
        )
    }

    /// Check if the channel should be considered dead after this error
    ///
    /// # NIST 800-53: AC-12 (Session Termination)
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Ssh(_))
    }

    /// Follow-up line the REPL prints after the error, if any
    ///
    /// Only argument errors point at `help <command>`; an unknown command has
    /// no help file to point at.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::Usage { command, .. } => Some(format!("Type 'help {command}' for details")),
            Error::Ssh(_) => Some("Connection lost, type 'connect' to reconnect".to_string()),
            _ => None,
        }
    }

    /// Check if error is an authentication failure that may be retried with
    /// another secret
    pub fn is_credential_rejected(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::PassphraseRequired(_))
    }
}

impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Error::Ssh(err.to_string())
    }
}

impl From<russh::keys::Error> for Error {
    fn from(err: russh::keys::Error) -> Self {
        Error::Authentication(err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for Error {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        Error::Ssh(err.to_string())
    }
}
