//! SSH/SFTP backed remote channel
//!
//! NIST 800-53: SC-8 (Transmission Confidentiality and Integrity), IA-3
//! (Device Identification and Authentication)
//! Implementation: `russh` carries the session, `russh-sftp` speaks the SFTP
//! subsystem on one channel, and remote commands run on separate exec
//! channels. Host keys are checked against a trust-on-first-use store before
//! any credential leaves the client.

use super::{DEFAULT_DIR_MODE, EntryKind, Metadata, RemoteChannel};
use crate::auth::{Connector, Target};
use crate::credential::Credential;
use crate::known_hosts::{HostStatus, KnownHosts};
use crate::{Error, Result};
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Opens SFTP sessions over SSH
#[derive(Debug, Clone)]
pub struct SshConnector {
    known_hosts: KnownHosts,
    timeout: Duration,
}

impl SshConnector {
    /// Connector checking host keys against `known_hosts`
    pub fn new(known_hosts: KnownHosts, timeout: Duration) -> Self {
        Self {
            known_hosts,
            timeout,
        }
    }
}

/// russh client callbacks
struct ClientHandler {
    label: String,
    known_hosts: KnownHosts,
    // Key of an unknown host, recorded only once authentication succeeds.
    pending: Arc<Mutex<Option<String>>>,
}

impl client::Handler for ClientHandler {
    type Error = Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let presented = server_public_key
            .to_openssh()
            .map_err(|e| Error::Ssh(format!("cannot encode host key: {e}")))?;

        match self.known_hosts.verify_host(&self.label, &presented)? {
            HostStatus::Known => {
                debug!(event = "host_key_known", host = %self.label, "Host key matches");
                Ok(true)
            }
            HostStatus::Unknown => {
                debug!(
                    event = "host_key_unknown",
                    host = %self.label,
                    "Host key not found in known_hosts"
                );
                *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(presented);
                Ok(true)
            }
            HostStatus::Changed { expected } => {
                warn!(
                    event = "host_key_changed",
                    host = %self.label,
                    expected = %expected,
                    "Remote host identification has changed"
                );
                Err(Error::HostKeyMismatch(self.label.clone()))
            }
        }
    }
}

fn load_key(path: &Path, passphrase: Option<&str>) -> Result<PrivateKey> {
    russh::keys::load_secret_key(path, passphrase).map_err(|e| match e {
        russh::keys::Error::KeyIsEncrypted => Error::PassphraseRequired(path.to_path_buf()),
        other if passphrase.is_some() => {
            debug!(error = %other, "private key did not decrypt");
            Error::PassphraseRequired(path.to_path_buf())
        }
        other => Error::Authentication(format!("cannot load {}: {other}", path.display())),
    })
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, target: &Target, credential: &Credential) -> Result<Box<dyn RemoteChannel>> {
        let label = KnownHosts::label(&target.host, target.port);

        // Decrypt before dialing so a wrong passphrase costs no round trip.
        let key = match credential {
            Credential::Password(_) => None,
            Credential::PrivateKeyPlaintext(path) => Some(load_key(path, None)?),
            Credential::PrivateKeyEncrypted { path, passphrase } => {
                Some(load_key(path, Some(passphrase.as_str()))?)
            }
        };

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.timeout),
            ..client::Config::default()
        });
        let pending = Arc::new(Mutex::new(None));
        let handler = ClientHandler {
            label: label.clone(),
            known_hosts: self.known_hosts.clone(),
            pending: pending.clone(),
        };

        info!(event = "connecting", host = %target.host, port = target.port, "Connecting");
        let mut handle = client::connect(config, (target.host.as_str(), target.port), handler).await?;

        let result = match (credential, key) {
            (Credential::Password(password), _) => {
                handle
                    .authenticate_password(target.username.as_str(), password.as_str())
                    .await?
            }
            (_, Some(key)) => {
                let hash = handle.best_supported_rsa_hash().await?.flatten();
                handle
                    .authenticate_publickey(
                        target.username.as_str(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash),
                    )
                    .await?
            }
            (_, None) => return Err(Error::NoSupportedCredential),
        };

        if !result.success() {
            return Err(Error::Authentication(format!(
                "{} rejected for {}",
                credential.kind(),
                target.username
            )));
        }

        let recorded = pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(key) = recorded {
            self.known_hosts.add_host(&label, &key)?;
            info!(
                event = "host_key_recorded",
                host = %label,
                file = ?self.known_hosts.path(),
                "Added new host key to known_hosts"
            );
        }

        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::Ssh(format!("failed to start SFTP subsystem: {e}")))?;

        Ok(Box::new(SshChannel { handle, sftp }))
    }
}

/// Live SFTP session
pub struct SshChannel {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
}

fn sftp_error(path: &str, err: SftpError) -> Error {
    match err {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => Error::NotFound(path.to_string()),
            StatusCode::PermissionDenied => Error::PermissionDenied(path.to_string()),
            StatusCode::OpUnsupported => Error::NotSupported(path.to_string()),
            _ => Error::remote(path, status.error_message),
        },
        other => Error::remote(path, other),
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let entries = self.sftp.read_dir(path).await.map_err(|e| sftp_error(path, e))?;
        let mut names: Vec<String> = entries
            .map(|entry| entry.file_name())
            .filter(|name| name != "." && name != "..")
            .collect();
        names.sort();
        Ok(names)
    }

    async fn stat(&mut self, path: &str) -> Result<Metadata> {
        let attrs = self
            .sftp
            .symlink_metadata(path)
            .await
            .map_err(|e| sftp_error(path, e))?;
        let file_type = attrs.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };
        Ok(Metadata {
            kind,
            size: attrs.size,
            permissions: attrs.permissions.map(|p| p & 0o7777),
        })
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let mut source = self.sftp.open(remote).await.map_err(|e| sftp_error(remote, e))?;
        let mut target = tokio::fs::File::create(local).await?;
        let bytes = tokio::io::copy(&mut source, &mut target).await?;
        target.flush().await?;
        debug!(remote, local = ?local, bytes, "downloaded");
        Ok(bytes)
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let mut source = tokio::fs::File::open(local).await?;
        let mut target = self.sftp.create(remote).await.map_err(|e| sftp_error(remote, e))?;
        let bytes = tokio::io::copy(&mut source, &mut target).await?;
        target.shutdown().await?;
        debug!(local = ?local, remote, bytes, "uploaded");
        Ok(bytes)
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        self.sftp.remove_file(path).await.map_err(|e| sftp_error(path, e))
    }

    async fn mkdir(&mut self, path: &str, mode: u32) -> Result<()> {
        self.sftp.create_dir(path).await.map_err(|e| sftp_error(path, e))?;
        if mode != DEFAULT_DIR_MODE {
            self.chmod(path, mode).await?;
        }
        Ok(())
    }

    async fn rmdir(&mut self, path: &str) -> Result<()> {
        self.sftp.remove_dir(path).await.map_err(|e| sftp_error(path, e))
    }

    async fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        self.sftp.rename(src, dst).await.map_err(|e| sftp_error(src, e))
    }

    async fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let mut attrs = FileAttributes::empty();
        attrs.permissions = Some(mode);
        self.sftp
            .set_metadata(path, attrs)
            .await
            .map_err(|e| sftp_error(path, e))
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut reply = ExecReply::default();
        while let Some(msg) = channel.wait().await {
            reply.absorb(msg);
        }
        reply.finish(command)
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.sftp.close().await {
            debug!(error = %e, "SFTP session close");
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        info!(event = "disconnected", "Connection closed");
        Ok(())
    }
}

/// Output collected from one exec channel
#[derive(Debug, Default)]
struct ExecReply {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    refused: bool,
}

impl ExecReply {
    fn absorb(&mut self, msg: ChannelMsg) {
        match msg {
            ChannelMsg::Data { ref data } => self.stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext: 1 } => self.stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_status = Some(exit_status),
            // The server answered the exec request with SSH_MSG_CHANNEL_FAILURE.
            ChannelMsg::Failure => self.refused = true,
            _ => {}
        }
    }

    fn finish(self, command: &str) -> Result<String> {
        match self.exit_status {
            Some(0) => Ok(String::from_utf8_lossy(&self.stdout).into_owned()),
            Some(code) => Err(Error::remote(
                command,
                format!(
                    "exit status {code}: {}",
                    String::from_utf8_lossy(&self.stderr).trim()
                ),
            )),
            None if self.refused => Err(Error::NotSupported(format!(
                "remote command execution ({command})"
            ))),
            None => Err(Error::remote(command, "channel closed without exit status")),
        }
    }
}
