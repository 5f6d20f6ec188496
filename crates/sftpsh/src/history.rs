//! Command history
//!
//! NIST 800-53: AU-2 (Audit Events), AU-12 (Audit Generation)
//! Implementation: Append-only record of the mutating commands executed in
//! this session, optionally mirrored line by line to a file.

use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Command name as typed
    pub command: String,
    /// Arguments as received by the handler
    pub args: Vec<String>,
    /// Position in the log, starting at 1
    pub sequence: u64,
    /// When the command completed
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Append-only command log
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    mirror: Option<(PathBuf, File)>,
}

impl HistoryLog {
    /// Empty in-memory log
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty log mirrored to `path`; the file is truncated
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            entries: Vec::new(),
            mirror: Some((path, file)),
        })
    }

    /// Append one command
    pub fn record(&mut self, command: &str, args: &[String]) {
        let entry = HistoryEntry {
            command: command.to_string(),
            args: args.to_vec(),
            sequence: self.entries.len() as u64 + 1,
            recorded_at: Utc::now(),
        };

        if let Some((path, file)) = &mut self.mirror {
            // The in-memory log stays authoritative if the mirror fails.
            if let Err(e) = writeln!(file, "{entry}") {
                warn!(file = ?path, error = %e, "failed to mirror history entry");
            }
        }

        self.entries.push(entry);
    }

    /// Entries in the order they were recorded
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole log, one command per line, trailing whitespace trimmed
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}
