//! Interactive SFTP shell
//!
//! NIST 800-53: AU-2 (Audit Events), AU-12 (Audit Generation), IA-2
//! (Identification and Authentication)
//! Implementation: Authenticates once at startup, then reads one command per
//! line until `quit`, `close` or end of input.
//!
//! Run with: cargo run --bin sftpsh -- -H <host> -U <user>

use anyhow::Context;
use clap::Parser;
use sftpsh::{
    Authenticator, Command, Config, CredentialSource, Dispatch, Dispatcher, HistoryLog, KnownHosts,
    LogFormat, Output, Session, SshConnector, Target, TerminalPrompter,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Remote host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Remote user name
    #[arg(short = 'U', long)]
    username: Option<String>,

    /// Login password (a private key is used when absent)
    #[arg(short = 'P', long)]
    password: Option<String>,

    /// Passphrase to decrypt the private key
    #[arg(short = 'p', long)]
    private_key_password: Option<String>,

    /// Path to SSH private key
    #[arg(short = 'i', long)]
    identity: Option<PathBuf>,

    /// SSH port
    #[arg(long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Apply command line overrides on top of the file configuration
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(username) = &self.username {
            config.username.clone_from(username);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(identity) = &self.identity {
            config.identity = sftpsh::config::expand_tilde(identity);
        }
        if let Some(log_format) = self.log_format {
            config.logging.format = log_format;
        }
        if let Some(log_file) = &self.log_file {
            config.logging.file = Some(log_file.clone());
        }
        if self.verbose {
            config.logging.level = "debug,russh=info".to_string();
        }
    }
}

/// Install the tracing subscriber; the guard must live until exit
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let file = config.logging.file.as_ref().and_then(|path| {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        let name = path.file_name()?;
        if let Some(dir) = dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Warning: Failed to create log directory: {e}");
                eprintln!("Falling back to stderr logging");
                return None;
            }
        }
        Some(tracing_appender::rolling::never(
            dir.map_or_else(|| PathBuf::from("."), PathBuf::from),
            name,
        ))
    });

    match (file, config.logging.format) {
        (Some(appender), format) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            match format {
                LogFormat::Json => tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter())
                    .with_writer(non_blocking)
                    .with_current_span(true)
                    .init(),
                LogFormat::Text => tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .init(),
            }
            Some(guard)
        }
        (None, LogFormat::Json) => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .init();
            None
        }
        (None, LogFormat::Text) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn print_output(output: &Output) {
    if *output != Output::None {
        let text = output.to_string();
        if !text.is_empty() {
            println!("{text}");
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);

    let _log_guard = init_logging(&config);

    if let Err(e) = config.validate() {
        error!(event = "configuration_validation_failed", error = %e, "Configuration validation failed");
        eprintln!("{e}");
        return Ok(ExitCode::FAILURE);
    }

    let target = Target {
        host: config.host.clone(),
        port: config.port,
        username: config.username.clone(),
    };
    let credentials = CredentialSource {
        password: args.password.clone(),
        private_key: Some(config.identity.clone()),
        passphrase: args.private_key_password.clone(),
    };

    let connector = SshConnector::new(KnownHosts::new(&config.known_hosts), config.timeout());
    let authenticator = Authenticator::new(
        Arc::new(connector),
        Box::new(TerminalPrompter),
        config.max_prompt_attempts,
    );

    let history = match &config.history_file {
        Some(path) => HistoryLog::with_file(path)
            .with_context(|| format!("cannot open history file {}", path.display()))?,
        None => HistoryLog::new(),
    };

    let mut session = Session::new(target, credentials, authenticator)
        .with_history(history)
        .with_local_cwd(std::env::current_dir()?)
        .with_download_dir(&config.download_dir)
        .with_help_dir(&config.help_dir);

    info!(
        event = "session_starting",
        version = env!("CARGO_PKG_VERSION"),
        target = %session.target(),
        "Starting sftpsh"
    );

    if let Err(e) = session.connect().await {
        error!(event = "connect_failed", error = %e, "Unable to connect");
        eprintln!("Unable to connect, please check user and server info: {e}");
        return Ok(ExitCode::FAILURE);
    }
    println!("Connection Successful!\nType a command or 'help' to see available commands");

    let dispatcher = Dispatcher::standard();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match dispatcher.dispatch(&mut session, &command).await {
            Ok(Dispatch::Continue(output)) => print_output(&output),
            Ok(Dispatch::Quit) => break,
            Err(e) => {
                debug!(
                    event = "command_failed",
                    command = %command.name,
                    remote = e.is_remote(),
                    error = %e,
                    "Command failed"
                );
                println!("{e}");
                if let Some(hint) = e.hint() {
                    println!("{hint}");
                }
            }
        }
    }

    if let Err(e) = session.close().await {
        warn!(event = "close_failed", error = %e, "Failed to close connection");
    }
    info!(event = "session_end", "Session ended");
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("sftpsh: {e:#}");
            ExitCode::FAILURE
        }
    }
}
