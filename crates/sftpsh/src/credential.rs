//! Credentials and credential selection

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// One credential presented to the server
///
/// `Debug` never prints secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Plaintext password
    Password(String),
    /// Unencrypted private key file
    PrivateKeyPlaintext(PathBuf),
    /// Encrypted private key file and its passphrase
    PrivateKeyEncrypted {
        /// Key file
        path: PathBuf,
        /// Passphrase to decrypt it
        passphrase: String,
    },
}

impl Credential {
    /// Credential kind, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::PrivateKeyPlaintext(_) => "plaintext private key",
            Credential::PrivateKeyEncrypted { .. } => "encrypted private key",
        }
    }

    /// Key file, when this is a key credential
    pub fn key_path(&self) -> Option<&Path> {
        match self {
            Credential::Password(_) => None,
            Credential::PrivateKeyPlaintext(path) | Credential::PrivateKeyEncrypted { path, .. } => {
                Some(path)
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PrivateKeyPlaintext(path) => {
                f.debug_tuple("PrivateKeyPlaintext").field(path).finish()
            }
            Credential::PrivateKeyEncrypted { path, .. } => f
                .debug_struct("PrivateKeyEncrypted")
                .field("path", path)
                .field("passphrase", &"<redacted>")
                .finish(),
        }
    }
}

/// Everything the user supplied that could become a [`Credential`]
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSource {
    /// Password from the command line
    pub password: Option<String>,
    /// Private key file to use when no password is given
    pub private_key: Option<PathBuf>,
    /// Passphrase to try if the key turns out to be encrypted
    pub passphrase: Option<String>,
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSource")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CredentialSource {
    /// Pick the credential for a first attempt
    ///
    /// A password wins over a key. A key is only offered when the file
    /// exists, and always first as plaintext: the passphrase comes into play
    /// only once loading the key reports that it is encrypted.
    ///
    /// # Errors
    ///
    /// [`Error::NoSupportedCredential`] when neither is available.
    pub fn resolve(&self) -> Result<Credential> {
        if let Some(password) = self.password.as_ref().filter(|p| !p.is_empty()) {
            return Ok(Credential::Password(password.clone()));
        }

        match &self.private_key {
            Some(path) if path.is_file() => Ok(Credential::PrivateKeyPlaintext(path.clone())),
            _ => Err(Error::NoSupportedCredential),
        }
    }
}
