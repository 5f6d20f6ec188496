//! Interactive session state
//!
//! NIST 800-53: AC-12 (Session Termination)
//! Implementation: A session owns at most one live channel. The channel is
//! present only after a successful authentication and is dropped as soon as
//! it fails at the transport level or the user closes it.

use crate::auth::{AuthState, Authenticator, Target};
use crate::channel::RemoteChannel;
use crate::credential::CredentialSource;
use crate::history::HistoryLog;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One user's connection to one remote host
pub struct Session {
    target: Target,
    credentials: CredentialSource,
    channel: Option<Box<dyn RemoteChannel>>,
    authenticator: Authenticator,
    history: HistoryLog,
    local_cwd: PathBuf,
    download_dir: PathBuf,
    help_dir: PathBuf,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("credentials", &self.credentials)
            .field("connected", &self.channel.is_some())
            .field("authenticator", &self.authenticator)
            .field("local_cwd", &self.local_cwd)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Disconnected session for `target`
    pub fn new(target: Target, credentials: CredentialSource, authenticator: Authenticator) -> Self {
        Self {
            target,
            credentials,
            channel: None,
            authenticator,
            history: HistoryLog::new(),
            local_cwd: PathBuf::from("."),
            download_dir: PathBuf::from("."),
            help_dir: PathBuf::from(crate::help::DEFAULT_HELP_DIR),
        }
    }

    /// Replace the history log, e.g. with one mirrored to a file
    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = history;
        self
    }

    /// Local directory relative paths are resolved against
    pub fn with_local_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_cwd = dir.into();
        self
    }

    /// Default destination of `get`
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Directory holding the help files
    pub fn with_help_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.help_dir = dir.into();
        self
    }

    /// Authenticate with the stored credentials, replacing any live channel
    ///
    /// # Errors
    ///
    /// The authentication failure; the session is left disconnected.
    pub async fn connect(&mut self) -> Result<()> {
        if let Some(mut old) = self.channel.take() {
            if let Err(e) = old.close().await {
                debug!(error = %e, "closing previous channel");
            }
        }

        let channel = self
            .authenticator
            .authenticate(&self.target, &self.credentials)
            .await?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Whether a live channel is attached
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// The live channel
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] when there is none.
    pub fn channel(&mut self) -> Result<&mut dyn RemoteChannel> {
        match self.channel.as_deref_mut() {
            Some(channel) => Ok(channel),
            None => Err(Error::NotConnected),
        }
    }

    /// Forget a channel that failed at the transport level
    pub fn invalidate(&mut self, reason: &Error) {
        if self.channel.take().is_some() {
            warn!(event = "connection_lost", target = %self.target, error = %reason, "Connection lost");
        }
    }

    /// Close the live channel, if any
    ///
    /// # Errors
    ///
    /// Returns the channel's close failure; the channel is dropped anyway.
    pub async fn close(&mut self) -> Result<()> {
        match self.channel.take() {
            Some(mut channel) => {
                info!(event = "session_close", target = %self.target, "Closing session");
                channel.close().await
            }
            None => Ok(()),
        }
    }

    /// Remote endpoint
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Authentication progress of the last connect
    pub fn auth_state(&self) -> AuthState {
        self.authenticator.state()
    }

    /// Executed command log
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Executed command log, for appending
    pub fn history_mut(&mut self) -> &mut HistoryLog {
        &mut self.history
    }

    /// Resolve a local path against the working directory
    pub fn local_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.local_cwd.join(path)
    }

    /// Local working directory
    pub fn local_cwd(&self) -> &Path {
        &self.local_cwd
    }

    /// Default destination of `get`
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Directory holding the help files
    pub fn help_dir(&self) -> &Path {
        &self.help_dir
    }
}
