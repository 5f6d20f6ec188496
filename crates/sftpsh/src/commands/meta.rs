//! Session-level commands

use crate::dispatch::{CommandHandler, Output, check_arity};
use crate::session::Session;
use crate::Result;
use async_trait::async_trait;

/// `ping`: round trip to the server
pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn usage(&self) -> &'static str {
        "ping"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 0, 0)?;
        session.channel()?.list(".").await?;
        Ok(Output::Text("pong".to_string()))
    }
}

/// `history`: commands recorded so far
pub struct History;

#[async_trait]
impl CommandHandler for History {
    fn name(&self) -> &'static str {
        "history"
    }

    fn usage(&self) -> &'static str {
        "history"
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 0, 0)?;
        Ok(Output::Text(session.history().render()))
    }
}

/// `connect`: authenticate again with the session's credentials
pub struct Connect;

#[async_trait]
impl CommandHandler for Connect {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn usage(&self) -> &'static str {
        "connect"
    }

    fn requires_connection(&self) -> bool {
        false
    }

    async fn run(&self, session: &mut Session, args: &[String]) -> Result<Output> {
        check_arity(self, args, 0, 0)?;
        session.connect().await?;
        Ok(Output::Text(format!("Connected to {}", session.target())))
    }
}
