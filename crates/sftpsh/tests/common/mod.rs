//! Shared test fixtures: sessions wired to an in-memory remote tree

#![allow(dead_code)]

use async_trait::async_trait;
use sftpsh::{
    Authenticator, Command, Connector, Credential, CredentialSource, Dispatch, Dispatcher, Error,
    MemoryChannel, Output, Prompter, RemoteChannel, Result, Session, Target,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Hands out clones of one in-memory tree for every credential
pub struct StaticConnector {
    pub channel: MemoryChannel,
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, _target: &Target, _credential: &Credential) -> Result<Box<dyn RemoteChannel>> {
        Ok(Box::new(self.channel.clone()))
    }
}

/// Refuses to prompt
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn passphrase(&mut self, _key: &Path) -> Result<String> {
        Err(Error::Authentication("no terminal".into()))
    }

    fn password(&mut self, _target: &Target) -> Result<String> {
        Err(Error::Authentication("no terminal".into()))
    }
}

pub fn target() -> Target {
    Target {
        host: "files.example.com".into(),
        port: 22,
        username: "tester".into(),
    }
}

pub fn help_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("help_files")
}

/// Disconnected session authenticating through `connector`
///
/// The temp dir holds `local/` (working directory) and `downloads/`.
pub fn session_with(connector: Arc<dyn Connector>, prompter: Box<dyn Prompter>, credentials: CredentialSource) -> (Session, TempDir) {
    let temp = TempDir::new().unwrap();
    let local = temp.path().join("local");
    std::fs::create_dir_all(&local).unwrap();

    let authenticator = Authenticator::new(connector, prompter, 3);
    let session = Session::new(target(), credentials, authenticator)
        .with_local_cwd(local)
        .with_download_dir(temp.path().join("downloads"))
        .with_help_dir(help_dir());
    (session, temp)
}

/// Session already connected to `channel`
pub async fn connected(channel: &MemoryChannel) -> (Session, TempDir) {
    let connector = Arc::new(StaticConnector {
        channel: channel.clone(),
    });
    let credentials = CredentialSource {
        password: Some("secret".into()),
        ..CredentialSource::default()
    };
    let (mut session, temp) = session_with(connector, Box::new(NoPrompt), credentials);
    session.connect().await.unwrap();
    (session, temp)
}

/// Parse and dispatch one line
pub async fn run(dispatcher: &Dispatcher, session: &mut Session, line: &str) -> Result<Dispatch> {
    let command = Command::parse(line)?.unwrap();
    dispatcher.dispatch(session, &command).await
}

/// Lines printed by a successful command
pub fn lines(dispatch: Dispatch) -> Vec<String> {
    match dispatch {
        Dispatch::Continue(Output::Lines(lines)) => lines,
        other => panic!("expected a listing, got {other:?}"),
    }
}

/// Text printed by a successful command
pub fn text(dispatch: Dispatch) -> String {
    match dispatch {
        Dispatch::Continue(Output::Text(text)) => text,
        other => panic!("expected text, got {other:?}"),
    }
}
