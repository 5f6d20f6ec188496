//! Trust-on-first-use host key store
//!
//! NIST 800-53: IA-3 (Device Identification and Authentication)
//! Implementation: Keys are kept in OpenSSH `known_hosts` line format
//! (`host[,host...] keytype base64 [comment]`). Hosts on a non-default port
//! are written as `[host]:port`. Hashed entries (`|1|salt|hash`, as written
//! with `HashKnownHosts yes`) are matched but never rewritten.

use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default SSH port, written without brackets
pub const DEFAULT_PORT: u16 = 22;

/// Result of checking a host key against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    /// Host is recorded with this exact key
    Known,
    /// Host has never been recorded
    Unknown,
    /// Host is recorded with a different key
    Changed {
        /// Recorded `keytype base64`
        expected: String,
    },
}

/// Known hosts file
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
}

impl KnownHosts {
    /// Store backed by `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Host label as written in the file
    pub fn label(host: &str, port: u16) -> String {
        if port == DEFAULT_PORT {
            host.to_string()
        } else {
            format!("[{host}]:{port}")
        }
    }

    /// Check `key` (`keytype base64 [comment]`) recorded for `label`
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn verify_host(&self, label: &str, key: &str) -> Result<HostStatus> {
        let Some(presented) = key_fields(key) else {
            return Err(Error::Ssh(format!("malformed host key for {label}")));
        };

        let mut expected = None;
        for (hosts, recorded) in self.load_entries()? {
            if !hosts.split(',').any(|pattern| host_matches(pattern, label)) {
                continue;
            }
            if recorded == presented {
                return Ok(HostStatus::Known);
            }
            // Any recorded key for the host, whatever its algorithm, pins it.
            expected.get_or_insert_with(|| format!("{} {}", recorded.0, recorded.1));
        }

        Ok(match expected {
            Some(expected) => HostStatus::Changed { expected },
            None => HostStatus::Unknown,
        })
    }

    /// Append a record for `label`
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn add_host(&self, label: &str, key: &str) -> Result<()> {
        let Some((keytype, base64)) = key_fields(key) else {
            return Err(Error::Ssh(format!("malformed host key for {label}")));
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let needs_newline = fs::read(&self.path)
            .map(|data| data.last().is_some_and(|b| *b != b'\n'))
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_newline {
            writeln!(file)?;
        }
        writeln!(file, "{label} {keytype} {base64}")?;

        debug!(host = label, file = ?self.path, "recorded host key");
        Ok(())
    }

    fn load_entries(&self) -> Result<Vec<(String, (String, String))>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // Markers such as @cert-authority / @revoked are not ours to judge.
            if line.starts_with('@') {
                continue;
            }
            let Some((hosts, rest)) = line.split_once(char::is_whitespace) else {
                warn!(line = index + 1, file = ?self.path, "skipping malformed known_hosts line");
                continue;
            };
            match key_fields(rest) {
                Some(key) => entries.push((hosts.to_string(), key)),
                None => {
                    warn!(line = index + 1, file = ?self.path, "skipping malformed known_hosts line");
                }
            }
        }

        Ok(entries)
    }
}

/// Whether one comma-separated host pattern names `label`
fn host_matches(pattern: &str, label: &str) -> bool {
    match pattern.strip_prefix("|1|") {
        Some(hashed) => hashed_host_matches(hashed, label),
        None => pattern == label,
    }
}

/// `salt|hash` where hash = base64(HMAC-SHA1(salt, label))
fn hashed_host_matches(hashed: &str, label: &str) -> bool {
    let Some((salt, hash)) = hashed.split_once('|') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (STANDARD.decode(salt), STANDARD.decode(hash)) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(&salt) else {
        return false;
    };
    mac.update(label.as_bytes());
    mac.verify_slice(&hash).is_ok()
}

fn key_fields(key: &str) -> Option<(String, String)> {
    let mut fields = key.split_whitespace();
    let keytype = fields.next()?;
    let base64 = fields.next()?;
    Some((keytype.to_string(), base64.to_string()))
}
