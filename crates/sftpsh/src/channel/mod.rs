//! Remote channel capability
//!
//! A [`RemoteChannel`] is the only way the shell touches the remote host. Every
//! primitive works on a single file or directory; anything recursive is built
//! on top of these by the tree walker.

pub mod memory;
pub mod ssh;

use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;

pub use memory::MemoryChannel;
pub use ssh::{SshChannel, SshConnector};

/// Default mode for directories created by the shell
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (never followed by the shell)
    Symlink,
    /// Anything else (socket, fifo, device)
    Other,
}

impl EntryKind {
    /// Whether a walk should descend into this entry
    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }
}

/// Attributes of a remote entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Entry kind
    pub kind: EntryKind,
    /// Size in bytes, when the server reports it
    pub size: Option<u64>,
    /// Permission bits (lower 12 bits), when the server reports them
    pub permissions: Option<u32>,
}

/// Atomic remote filesystem primitives over one established session.
///
/// Calls take `&mut self`: there is never more than one request in flight on
/// a channel.
#[async_trait]
pub trait RemoteChannel: Send {
    /// Names of the entries in `path`, without `.` and `..`, sorted
    async fn list(&mut self, path: &str) -> Result<Vec<String>>;

    /// Attributes of `path` without following a final symlink
    async fn stat(&mut self, path: &str) -> Result<Metadata>;

    /// Download `remote` into the local file `local`
    async fn get(&mut self, remote: &str, local: &Path) -> Result<u64>;

    /// Upload the local file `local` to `remote`
    async fn put(&mut self, local: &Path, remote: &str) -> Result<u64>;

    /// Remove a file
    async fn remove(&mut self, path: &str) -> Result<()>;

    /// Create a single directory
    async fn mkdir(&mut self, path: &str, mode: u32) -> Result<()>;

    /// Remove an empty directory
    async fn rmdir(&mut self, path: &str) -> Result<()>;

    /// Rename `src` to `dst`
    async fn rename(&mut self, src: &str, dst: &str) -> Result<()>;

    /// Set permission bits of `path`
    async fn chmod(&mut self, path: &str, mode: u32) -> Result<()>;

    /// Run `command` in a remote shell and return its standard output
    async fn execute(&mut self, command: &str) -> Result<String> {
        Err(Error::NotSupported(format!(
            "remote command execution ({command})"
        )))
    }

    /// Tear the channel down
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether `path` exists
    async fn exists(&mut self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether `path` exists and is a directory
    async fn is_dir(&mut self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(meta) => Ok(meta.kind.is_dir()),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether `path` exists and is a regular file
    async fn is_file(&mut self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(meta) => Ok(meta.kind == EntryKind::File),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Join a remote directory and an entry name with `/`
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Last component of a remote path, ignoring trailing slashes
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Parent of a remote path, `None` for a single relative component or `/`
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

/// Every prefix of a remote path, shortest first: `a/b/c` gives `a`, `a/b`, `a/b/c`
pub fn ancestors_inclusive(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = if absolute { String::from("/") } else { String::new() };
    let mut prefixes = Vec::new();

    for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
        current = join(&current, component);
        prefixes.push(current.clone());
    }

    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("a", "b"), "a/b");
        assert_eq!(join("a/", "b"), "a/b");
        assert_eq!(join("/", "b"), "/b");
        assert_eq!(join("", "b"), "b");
        assert_eq!(join(".", "b"), "b");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("a/b/c"), "c");
        assert_eq!(basename("a/b/"), "b");
        assert_eq!(basename("file.txt"), "file.txt");
        assert_eq!(basename("/"), "/");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("a/b/c"), Some("a/b"));
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("a"), None);
        assert_eq!(parent("/"), None);
    }

    #[test]
    fn test_ancestors_inclusive() {
        assert_eq!(ancestors_inclusive("a/b/c"), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(ancestors_inclusive("/x/y"), vec!["/x", "/x/y"]);
        assert_eq!(ancestors_inclusive("./a//b/"), vec!["a", "a/b"]);
    }
}
