//! File transfer between the local machine and the remote host

use crate::channel::{basename, join};
use crate::dispatch::{CommandHandler, Output, check_arity};
use crate::recursive::create_dir_all;
use crate::session::Session;
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// `get <remotepath> [localpath]`
pub struct Get;

#[async_trait]
impl CommandHandler for Get {
    fn name(&self) -> &'static str {
        "get"
    }

    fn usage(&self) -> &'static str {
        "get <remotepath> [localpath]"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 1, 2)?;
        let remote = args[0].as_str();

        // No destination: the download directory, which is created on demand.
        let (dest, create_dest) = match args.get(1) {
            Some(local) => (session.local_path(local), false),
            None => (session.download_dir().to_path_buf(), true),
        };

        let channel = session.channel()?;
        if channel.stat(remote).await?.kind.is_dir() {
            return Err(Error::NotAFile(remote.to_string()));
        }

        if create_dest {
            tokio::fs::create_dir_all(&dest).await?;
        }
        let local: PathBuf = match tokio::fs::metadata(&dest).await {
            Ok(meta) if meta.is_dir() => dest.join(basename(remote)),
            _ => dest,
        };

        let bytes = channel.get(remote, &local).await?;
        Ok(Output::Text(format!(
            "{remote} -> {} ({bytes} bytes)",
            local.display()
        )))
    }
}

/// `put [-t <targetdir>] <localfile>`
pub struct Put;

#[async_trait]
impl CommandHandler for Put {
    fn name(&self) -> &'static str {
        "put"
    }

    fn usage(&self) -> &'static str {
        "put [-t <targetdir>] <localfile>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        let (target, file) = match args {
            [flag, dir, file] if flag == "-t" => (Some(dir.as_str()), file),
            [file] if file != "-t" => (None, file),
            _ => {
                return Err(Error::usage(
                    self.name(),
                    self.usage(),
                    format!("expected a file, optionally after -t <targetdir>, got {} arguments", args.len()),
                ));
            }
        };

        let local = session.local_path(file);
        let meta = tokio::fs::metadata(&local).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(file.clone())
            } else {
                Error::Io(e)
            }
        })?;
        if meta.is_dir() {
            return Err(Error::IsADirectory(local));
        }
        let Some(name) = local.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Err(Error::NotAFile(file.clone()));
        };

        let channel = session.channel()?;
        let remote = match target {
            Some(dir) => {
                create_dir_all(channel, dir).await?;
                join(dir, &name)
            }
            None => name,
        };

        let bytes = channel.put(&local, &remote).await?;
        Ok(Output::Text(format!(
            "{} -> {remote} ({bytes} bytes)",
            local.display()
        )))
    }
}
