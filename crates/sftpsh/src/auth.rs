//! Authentication state machine
//!
//! NIST 800-53: IA-2 (Identification and Authentication), AC-7 (Unsuccessful
//! Logon Attempts)
//! Implementation: One connection attempt with the preferred credential,
//! then bounded interactive recovery when the private key turns out to be
//! encrypted: passphrase prompts first, plaintext password prompts second.

use crate::channel::RemoteChannel;
use crate::credential::{Credential, CredentialSource};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of interactive attempts per recovery stage
pub const DEFAULT_PROMPT_ATTEMPTS: u32 = 3;

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Remote host name or address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Remote user
    pub username: String,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Opens an authenticated channel with one credential
///
/// Implementations report an encrypted key that could not be opened as
/// [`Error::PassphraseRequired`] and a refused credential as
/// [`Error::Authentication`]; anything else ends authentication.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `target` presenting `credential`
    async fn connect(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> Result<Box<dyn RemoteChannel>>;
}

/// Reads secrets from the user
pub trait Prompter: Send {
    /// Ask for the passphrase of `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read.
    fn passphrase(&mut self, key: &Path) -> Result<String>;

    /// Ask for the login password of `target`
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read.
    fn password(&mut self, target: &Target) -> Result<String>;
}

/// Prompts on the controlling terminal without echo
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn passphrase(&mut self, key: &Path) -> Result<String> {
        Ok(rpassword::prompt_password(format!(
            "Enter passphrase for key '{}': ",
            key.display()
        ))?)
    }

    fn password(&mut self, target: &Target) -> Result<String> {
        Ok(rpassword::prompt_password(format!(
            "{}@{}'s password: ",
            target.username, target.host
        ))?)
    }
}

/// Authentication progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No attempt made yet
    Unauthenticated,
    /// An attempt is running
    Connecting,
    /// Last attempt produced a channel
    Connected,
    /// Last attempt gave up
    Failed,
}

/// Drives [`Connector`] attempts until one succeeds or recovery is exhausted
pub struct Authenticator {
    connector: Arc<dyn Connector>,
    prompter: Box<dyn Prompter>,
    max_attempts: u32,
    state: AuthState,
    attempts: u32,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("max_attempts", &self.max_attempts)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Create an authenticator allowing `max_attempts` prompts per stage
    pub fn new(connector: Arc<dyn Connector>, prompter: Box<dyn Prompter>, max_attempts: u32) -> Self {
        Self {
            connector,
            prompter,
            max_attempts,
            state: AuthState::Unauthenticated,
            attempts: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Connection attempts made by the last `authenticate` call
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Authenticate to `target` with whatever `source` offers
    ///
    /// # Errors
    ///
    /// The error that ended the last attempt; [`Error::Authentication`] when
    /// every interactive attempt was rejected.
    pub async fn authenticate(
        &mut self,
        target: &Target,
        source: &CredentialSource,
    ) -> Result<Box<dyn RemoteChannel>> {
        self.state = AuthState::Connecting;
        self.attempts = 0;

        let credential = match source.resolve() {
            Ok(credential) => credential,
            Err(e) => return Err(self.fail(target, e)),
        };

        let key_path = match self.attempt(target, &credential).await {
            Ok(channel) => return Ok(self.succeed(target, channel)),
            Err(Error::PassphraseRequired(path)) => path,
            Err(e) => return Err(self.fail(target, e)),
        };

        if let Some(passphrase) = &source.passphrase {
            let credential = Credential::PrivateKeyEncrypted {
                path: key_path.clone(),
                passphrase: passphrase.clone(),
            };
            match self.attempt(target, &credential).await {
                Ok(channel) => return Ok(self.succeed(target, channel)),
                Err(e) if e.is_credential_rejected() => {
                    warn!(event = "passphrase_rejected", "Supplied passphrase did not unlock the key");
                }
                Err(e) => return Err(self.fail(target, e)),
            }
        }

        for round in 1..=self.max_attempts {
            let passphrase = match self.prompter.passphrase(&key_path) {
                Ok(passphrase) => passphrase,
                Err(e) => return Err(self.fail(target, e)),
            };
            let credential = Credential::PrivateKeyEncrypted {
                path: key_path.clone(),
                passphrase,
            };
            match self.attempt(target, &credential).await {
                Ok(channel) => return Ok(self.succeed(target, channel)),
                Err(e) if e.is_credential_rejected() => {
                    warn!(event = "passphrase_rejected", round, max = self.max_attempts, "Passphrase rejected");
                }
                Err(e) => return Err(self.fail(target, e)),
            }
        }

        for round in 1..=self.max_attempts {
            let password = match self.prompter.password(target) {
                Ok(password) => password,
                Err(e) => return Err(self.fail(target, e)),
            };
            match self.attempt(target, &Credential::Password(password)).await {
                Ok(channel) => return Ok(self.succeed(target, channel)),
                Err(e) if e.is_credential_rejected() => {
                    warn!(event = "password_rejected", round, max = self.max_attempts, "Password rejected");
                }
                Err(e) => return Err(self.fail(target, e)),
            }
        }

        Err(self.fail(
            target,
            Error::Authentication(format!(
                "gave up after {} passphrase and {} password attempts",
                self.max_attempts, self.max_attempts
            )),
        ))
    }

    async fn attempt(&mut self, target: &Target, credential: &Credential) -> Result<Box<dyn RemoteChannel>> {
        self.attempts += 1;
        debug!(
            event = "auth_attempt",
            target = %target,
            credential = credential.kind(),
            attempt = self.attempts,
            "Trying credential"
        );
        self.connector.connect(target, credential).await
    }

    fn succeed(&mut self, target: &Target, channel: Box<dyn RemoteChannel>) -> Box<dyn RemoteChannel> {
        self.state = AuthState::Connected;
        info!(event = "auth_success", target = %target, attempts = self.attempts, "Connected");
        channel
    }

    fn fail(&mut self, target: &Target, error: Error) -> Error {
        self.state = AuthState::Failed;
        warn!(event = "auth_failure", target = %target, error = %error, "Authentication failed");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Accepts one passphrase for the key and one password
    struct Server {
        passphrase: String,
        password: Option<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Connector for Server {
        async fn connect(&self, _target: &Target, credential: &Credential) -> Result<Box<dyn RemoteChannel>> {
            self.seen
                .lock()
                .unwrap()
                .push(credential.kind().to_string());
            match credential {
                Credential::PrivateKeyPlaintext(path) => Err(Error::PassphraseRequired(path.clone())),
                Credential::PrivateKeyEncrypted { path, passphrase } if *passphrase != self.passphrase => {
                    Err(Error::PassphraseRequired(path.clone()))
                }
                Credential::Password(p) if Some(p) != self.password.as_ref() => {
                    Err(Error::Authentication("password rejected".into()))
                }
                _ => Ok(Box::new(MemoryChannel::new())),
            }
        }
    }

    struct Script {
        passphrases: Vec<String>,
        passwords: Vec<String>,
    }

    impl Prompter for Script {
        fn passphrase(&mut self, _key: &Path) -> Result<String> {
            if self.passphrases.is_empty() {
                return Err(Error::Authentication("no more input".into()));
            }
            Ok(self.passphrases.remove(0))
        }

        fn password(&mut self, _target: &Target) -> Result<String> {
            if self.passwords.is_empty() {
                return Err(Error::Authentication("no more input".into()));
            }
            Ok(self.passwords.remove(0))
        }
    }

    fn target() -> Target {
        Target {
            host: "example.com".into(),
            port: 22,
            username: "user".into(),
        }
    }

    fn key_source() -> (CredentialSource, tempfile::TempDir) {
        let temp = tempfile::TempDir::new().unwrap();
        let key = temp.path().join("id_rsa");
        std::fs::write(&key, "encrypted").unwrap();
        (
            CredentialSource {
                private_key: Some(key),
                ..CredentialSource::default()
            },
            temp,
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_correct_passphrase_on_third_prompt() {
        let server = Arc::new(Server {
            passphrase: "right".into(),
            password: None,
            seen: Mutex::new(Vec::new()),
        });
        let script = Script {
            passphrases: strings(&["wrong1", "wrong2", "right"]),
            passwords: Vec::new(),
        };
        let mut auth = Authenticator::new(server.clone(), Box::new(script), DEFAULT_PROMPT_ATTEMPTS);
        let (source, _temp) = key_source();

        assert_eq!(auth.state(), AuthState::Unauthenticated);
        auth.authenticate(&target(), &source).await.unwrap();
        assert_eq!(auth.state(), AuthState::Connected);
        assert_eq!(auth.attempts(), 4);
    }

    #[tokio::test]
    async fn test_three_wrong_passphrases_fall_back_to_password() {
        let server = Arc::new(Server {
            passphrase: "right".into(),
            password: Some("pw".into()),
            seen: Mutex::new(Vec::new()),
        });
        let script = Script {
            passphrases: strings(&["w1", "w2", "w3"]),
            passwords: strings(&["bad", "pw"]),
        };
        let mut auth = Authenticator::new(server.clone(), Box::new(script), DEFAULT_PROMPT_ATTEMPTS);
        let (source, _temp) = key_source();

        auth.authenticate(&target(), &source).await.unwrap();
        assert_eq!(auth.state(), AuthState::Connected);
        assert_eq!(
            *server.seen.lock().unwrap(),
            strings(&[
                "plaintext private key",
                "encrypted private key",
                "encrypted private key",
                "encrypted private key",
                "password",
                "password",
            ])
        );
    }

    #[tokio::test]
    async fn test_exhausted_recovery_fails() {
        let server = Arc::new(Server {
            passphrase: "right".into(),
            password: None,
            seen: Mutex::new(Vec::new()),
        });
        let script = Script {
            passphrases: strings(&["w1", "w2", "w3"]),
            passwords: strings(&["p1", "p2", "p3"]),
        };
        let mut auth = Authenticator::new(server, Box::new(script), DEFAULT_PROMPT_ATTEMPTS);
        let (source, _temp) = key_source();

        let result = auth.authenticate(&target(), &source).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(auth.state(), AuthState::Failed);
        assert_eq!(auth.attempts(), 7);
    }

    #[tokio::test]
    async fn test_supplied_passphrase_is_tried_before_prompting() {
        let server = Arc::new(Server {
            passphrase: "given".into(),
            password: None,
            seen: Mutex::new(Vec::new()),
        });
        let script = Script {
            passphrases: Vec::new(),
            passwords: Vec::new(),
        };
        let mut auth = Authenticator::new(server, Box::new(script), DEFAULT_PROMPT_ATTEMPTS);
        let (mut source, _temp) = key_source();
        source.passphrase = Some("given".into());

        auth.authenticate(&target(), &source).await.unwrap();
        assert_eq!(auth.attempts(), 2);
    }

    #[tokio::test]
    async fn test_rejected_password_is_not_retried() {
        let server = Arc::new(Server {
            passphrase: "right".into(),
            password: Some("pw".into()),
            seen: Mutex::new(Vec::new()),
        });
        let script = Script {
            passphrases: Vec::new(),
            passwords: strings(&["pw"]),
        };
        let mut auth = Authenticator::new(server, Box::new(script), DEFAULT_PROMPT_ATTEMPTS);
        let source = CredentialSource {
            password: Some("nope".into()),
            ..CredentialSource::default()
        };

        let result = auth.authenticate(&target(), &source).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(auth.state(), AuthState::Failed);
        assert_eq!(auth.attempts(), 1);
    }

    #[tokio::test]
    async fn test_no_credential() {
        let server = Arc::new(Server {
            passphrase: String::new(),
            password: None,
            seen: Mutex::new(Vec::new()),
        });
        let script = Script {
            passphrases: Vec::new(),
            passwords: Vec::new(),
        };
        let mut auth = Authenticator::new(server, Box::new(script), DEFAULT_PROMPT_ATTEMPTS);
        let source = CredentialSource {
            private_key: Some(PathBuf::from("/nonexistent/id_rsa")),
            ..CredentialSource::default()
        };

        let result = auth.authenticate(&target(), &source).await;
        assert!(matches!(result, Err(Error::NoSupportedCredential)));
        assert_eq!(auth.attempts(), 0);
    }
}
