//! Recursive commands

use crate::dispatch::{CommandHandler, Output, check_arity};
use crate::recursive::{exec_copy, remove_tree, staged_copy};
use crate::session::Session;
use crate::Result;
use async_trait::async_trait;

/// `rmdir <path>`: delete a directory and its contents
pub struct Rmdir;

#[async_trait]
impl CommandHandler for Rmdir {
    fn name(&self) -> &'static str {
        "rmdir"
    }

    fn usage(&self) -> &'static str {
        "rmdir <path>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 1, 1)?;
        remove_tree(session.channel()?, &args[0]).await?;
        Ok(Output::None)
    }
}

/// `cp <src> <dst>`: copy through a local staging directory
pub struct Cp;

#[async_trait]
impl CommandHandler for Cp {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn usage(&self) -> &'static str {
        "cp <src> <dst>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 2, 2)?;
        staged_copy(session.channel()?, &args[0], &args[1]).await?;
        Ok(Output::None)
    }
}

/// `cp_r <src> <dst>`: copy with `cp -Rp` on the remote host
pub struct CpR;

#[async_trait]
impl CommandHandler for CpR {
    fn name(&self) -> &'static str {
        "cp_r"
    }

    fn usage(&self) -> &'static str {
        "cp_r <src> <dst>"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 2, 2)?;
        exec_copy(session.channel()?, &args[0], &args[1]).await?;
        Ok(Output::None)
    }
}
