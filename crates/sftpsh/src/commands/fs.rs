//! Single-entry filesystem commands

use crate::dispatch::{CommandHandler, Output, check_arity};
use crate::recursive::create_dir_all;
use crate::session::Session;
use crate::walker::{LocalTree, Tree};
use crate::{Error, Result};
use async_trait::async_trait;

/// `ls [path]`
pub struct Ls;

#[async_trait]
impl CommandHandler for Ls {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn usage(&self) -> &'static str {
        "ls [path]"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 0, 1)?;
        let path = args.first().map_or(".", String::as_str);
        let names = session.channel()?.list(path).await?;
        Ok(Output::Lines(names))
    }
}

/// `lsl [path]`: list the local working directory
pub struct Lsl;

#[async_trait]
impl CommandHandler for Lsl {
    fn name(&self) -> &'static str {
        "lsl"
    }

    fn usage(&self) -> &'static str {
        "lsl [path]"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 0, 1)?;
        let dir = session.local_path(args.first().map_or(".", String::as_str));
        let dir = dir.to_string_lossy();

        let mut local = LocalTree;
        if !local.kind(&dir).await?.is_dir() {
            return Err(Error::NotADirectory(dir.into_owned()));
        }
        Ok(Output::Lines(local.entries(&dir).await?))
    }
}

/// `chmod <path> <mode>`, mode in octal
pub struct Chmod;

#[async_trait]
impl CommandHandler for Chmod {
    fn name(&self) -> &'static str {
        "chmod"
    }

    fn usage(&self) -> &'static str {
        "chmod <path> <mode>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 2, 2)?;
        let mode = match u32::from_str_radix(&args[1], 8) {
            Ok(mode) if mode <= 0o7777 => mode,
            _ => {
                return Err(Error::usage(
                    self.name(),
                    self.usage(),
                    format!("invalid octal mode '{}'", args[1]),
                ));
            }
        };

        session.channel()?.chmod(&args[0], mode).await?;
        Ok(Output::None)
    }
}

/// `mkdir <path>`, creating missing parents
pub struct Mkdir;

#[async_trait]
impl CommandHandler for Mkdir {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn usage(&self) -> &'static str {
        "mkdir <path>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 1, 1)?;
        create_dir_all(session.channel()?, &args[0]).await?;
        Ok(Output::None)
    }
}

/// `rm <path>`, files only
pub struct Rm;

#[async_trait]
impl CommandHandler for Rm {
    fn name(&self) -> &'static str {
        "rm"
    }

    fn usage(&self) -> &'static str {
        "rm <path>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 1, 1)?;
        let channel = session.channel()?;
        if channel.stat(&args[0]).await?.kind.is_dir() {
            return Err(Error::NotAFile(args[0].clone()));
        }
        channel.remove(&args[0]).await?;
        Ok(Output::None)
    }
}

/// `rename <src> <dst>`
pub struct Rename;

#[async_trait]
impl CommandHandler for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn usage(&self) -> &'static str {
        "rename <src> <dst>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 2, 2)?;
        session.channel()?.rename(&args[0], &args[1]).await?;
        Ok(Output::None)
    }
}
