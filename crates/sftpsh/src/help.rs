//! Help text rendering
//!
//! Help files hold one entry per line with fields separated by `@`. The
//! first two fields are printed in fixed-width columns; anything after them
//! is ignored.

use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Help directory used when none is configured
pub const DEFAULT_HELP_DIR: &str = "help_files";

/// Width of each rendered column
pub const COLUMN_WIDTH: usize = 35;

/// Overview file listing every command
pub const COMMAND_LIST: &str = "command_list.txt";

/// Help for `command`, or the command list when `None`
///
/// # Errors
///
/// [`Error::HelpFileMissing`] if the file does not exist.
pub async fn render(help_dir: &Path, command: Option<&str>) -> Result<String> {
    let file = match command {
        Some(name) => {
            let file = help_dir.join(format!("{name}_help.txt"));
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::HelpFileMissing(file));
            }
            file
        }
        None => help_dir.join(COMMAND_LIST),
    };

    let text = match tokio::fs::read_to_string(&file).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::HelpFileMissing(file)),
        Err(e) => return Err(Error::Io(e)),
    };

    Ok(format_entries(&text))
}

fn format_entries(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            let rendered: String = line
                .trim()
                .split('@')
                .take(2)
                .map(|field| format!("{field:<width$}", width = COLUMN_WIDTH))
                .collect();
            let rendered = rendered.trim_end();
            (!rendered.is_empty()).then(|| rendered.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_two_columns() {
        let rendered = format_entries("ls [path]@List a directory@ignored\n\n@\nquit@Exit\n");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("{:<35}List a directory", "ls [path]"));
        assert_eq!(lines[1], format!("{:<35}Exit", "quit"));
    }

    #[tokio::test]
    async fn test_missing_help_file() {
        let temp = TempDir::new().unwrap();
        let result = render(temp.path(), Some("frobnicate")).await;
        assert!(matches!(result, Err(Error::HelpFileMissing(p)) if p.ends_with("frobnicate_help.txt")));
    }

    #[tokio::test]
    async fn test_command_name_cannot_leave_help_dir() {
        let temp = TempDir::new().unwrap();
        let inner = temp.path().join("help");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(temp.path().join("x_help.txt"), "outside@x").unwrap();

        let result = render(&inner, Some("../x")).await;
        assert!(matches!(result, Err(Error::HelpFileMissing(_))));
    }

    #[tokio::test]
    async fn test_command_list() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(COMMAND_LIST), "help@Show help\n").unwrap();
        let rendered = render(temp.path(), None).await.unwrap();
        assert!(rendered.starts_with("help "));
        assert!(rendered.ends_with("Show help"));
    }
}
