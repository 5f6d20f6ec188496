//! In-process remote channel
//!
//! `MemoryChannel` keeps a whole remote tree in memory and enforces owner
//! permission bits the way a POSIX server would for a non-root user. Clones
//! share the same tree, so a caller can hand one clone to a session and keep
//! another to inspect the result. Every mutating call is appended to a
//! journal in call order.

use super::{EntryKind, Metadata, RemoteChannel, join};
use crate::line::tokenize;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

const OWNER_READ: u32 = 0o400;
const OWNER_WRITE: u32 = 0o200;
const OWNER_EXEC: u32 = 0o100;

#[derive(Debug, Clone)]
enum Content {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Node {
    content: Content,
    mode: u32,
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self.content {
            Content::Directory => EntryKind::Directory,
            Content::File(_) => EntryKind::File,
        }
    }
}

#[derive(Debug)]
struct State {
    // Keys are normalized relative paths; "" is the root.
    nodes: BTreeMap<String, Node>,
    journal: Vec<String>,
    exec_enabled: bool,
    closed: bool,
}

/// Remote tree held in memory
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// Create an empty tree without remote command execution
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            String::new(),
            Node {
                content: Content::Directory,
                mode: 0o755,
            },
        );

        Self {
            state: Arc::new(Mutex::new(State {
                nodes,
                journal: Vec::new(),
                exec_enabled: false,
                closed: false,
            })),
        }
    }

    /// Enable `execute`, which understands `cp -Rp <src> <dst>`
    pub fn with_exec(self) -> Self {
        self.lock().exec_enabled = true;
        self
    }

    /// Seed a file, creating missing parent directories
    pub fn add_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        let key = normalize(path);
        state.create_parents(&key);
        state.nodes.insert(
            key,
            Node {
                content: Content::File(contents.into()),
                mode: 0o644,
            },
        );
    }

    /// Seed a directory, creating missing parent directories
    pub fn add_dir(&self, path: &str) {
        let mut state = self.lock();
        let key = normalize(path);
        state.create_parents(&key);
        state.nodes.entry(key).or_insert(Node {
            content: Content::Directory,
            mode: 0o755,
        });
    }

    /// Contents of a file, if present
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(&normalize(path)) {
            Some(Node {
                content: Content::File(data),
                ..
            }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Whether any entry exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(&normalize(path))
    }

    /// Every path under `root` (exclusive), relative to it, directories
    /// suffixed with `/`
    pub fn relative_tree(&self, root: &str) -> Vec<String> {
        let root = normalize(root);
        let prefix = if root.is_empty() {
            String::new()
        } else {
            format!("{root}/")
        };

        self.lock()
            .nodes
            .iter()
            .filter_map(|(key, node)| {
                let rel = key.strip_prefix(&prefix)?;
                if rel.is_empty() {
                    return None;
                }
                Some(match node.content {
                    Content::Directory => format!("{rel}/"),
                    Content::File(_) => rel.to_string(),
                })
            })
            .collect()
    }

    /// Mutating calls in the order they were made
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_key(key: &str) -> String {
    key.rfind('/').map_or_else(String::new, |idx| key[..idx].to_string())
}

impl State {
    fn create_parents(&mut self, key: &str) {
        let mut current = String::new();
        let components: Vec<&str> = key.split('/').collect();
        for component in components.iter().take(components.len().saturating_sub(1)) {
            current = join(&current, component);
            self.nodes.entry(current.clone()).or_insert(Node {
                content: Content::Directory,
                mode: 0o755,
            });
        }
    }

    /// Every ancestor directory must be searchable
    fn check_traverse(&self, key: &str, display: &str) -> Result<()> {
        let mut current = String::new();
        let components: Vec<&str> = key.split('/').filter(|c| !c.is_empty()).collect();
        for component in components.iter().take(components.len().saturating_sub(1)) {
            self.check_mode(&current, OWNER_EXEC, display)?;
            current = join(&current, component);
        }
        if !key.is_empty() {
            self.check_mode(&current, OWNER_EXEC, display)?;
        }
        Ok(())
    }

    fn check_mode(&self, key: &str, bits: u32, display: &str) -> Result<()> {
        match self.nodes.get(key) {
            Some(node) if bits == OWNER_EXEC && node.kind() != EntryKind::Directory => {
                Err(Error::NotFound(display.to_string()))
            }
            Some(node) if node.mode & bits == bits => Ok(()),
            Some(_) => Err(Error::PermissionDenied(display.to_string())),
            None => Err(Error::NotFound(display.to_string())),
        }
    }

    fn lookup(&self, path: &str) -> Result<(String, &Node)> {
        let key = normalize(path);
        self.check_traverse(&key, path)?;
        self.nodes
            .get(&key)
            .map(|node| (key.clone(), node))
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    /// Parent must be an existing, writable directory
    fn check_parent_writable(&self, key: &str, display: &str) -> Result<()> {
        let parent = parent_key(key);
        self.check_traverse(&parent, display)?;
        match self.nodes.get(&parent) {
            Some(node) if node.kind() == EntryKind::Directory => {
                self.check_mode(&parent, OWNER_WRITE | OWNER_EXEC, display)
            }
            Some(_) => Err(Error::NotADirectory(display.to_string())),
            None => Err(Error::NotFound(display.to_string())),
        }
    }

    fn children(&self, key: &str) -> Vec<String> {
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };
        self.nodes
            .keys()
            .filter_map(|k| {
                let rest = k.strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect()
    }

    fn copy_subtree(&mut self, src: &str, dst: &str) -> Result<()> {
        let src_key = normalize(src);
        let dst_key = normalize(dst);
        self.lookup(src)?;
        self.check_parent_writable(&dst_key, dst)?;

        let copies: Vec<(String, Node)> = self
            .nodes
            .iter()
            .filter_map(|(key, node)| {
                let rest = if *key == src_key {
                    ""
                } else {
                    key.strip_prefix(&format!("{src_key}/"))?
                };
                let target = if rest.is_empty() {
                    dst_key.clone()
                } else {
                    format!("{dst_key}/{rest}")
                };
                Some((target, node.clone()))
            })
            .collect();

        self.nodes.extend(copies);
        Ok(())
    }
}

#[async_trait]
impl RemoteChannel for MemoryChannel {
    async fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let state = self.lock();
        let (key, node) = state.lookup(path)?;
        if node.kind() != EntryKind::Directory {
            return Err(Error::NotADirectory(path.to_string()));
        }
        state.check_mode(&key, OWNER_READ | OWNER_EXEC, path)?;
        Ok(state.children(&key))
    }

    async fn stat(&mut self, path: &str) -> Result<Metadata> {
        let state = self.lock();
        let (_, node) = state.lookup(path)?;
        let size = match &node.content {
            Content::File(data) => Some(data.len() as u64),
            Content::Directory => None,
        };
        Ok(Metadata {
            kind: node.kind(),
            size,
            permissions: Some(node.mode),
        })
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let data = {
            let state = self.lock();
            let (key, node) = state.lookup(remote)?;
            let Content::File(data) = &node.content else {
                return Err(Error::NotAFile(remote.to_string()));
            };
            state.check_mode(&key, OWNER_READ, remote)?;
            data.clone()
        };

        tokio::fs::write(local, &data).await?;
        debug!(remote, local = ?local, bytes = data.len(), "memory get");
        Ok(data.len() as u64)
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let data = tokio::fs::read(local).await?;
        let mut state = self.lock();
        let key = normalize(remote);
        state.check_parent_writable(&key, remote)?;
        if let Some(node) = state.nodes.get(&key) {
            if node.kind() == EntryKind::Directory {
                return Err(Error::remote(remote, "is a directory"));
            }
        }

        let len = data.len() as u64;
        state.nodes.insert(
            key,
            Node {
                content: Content::File(data),
                mode: 0o644,
            },
        );
        state.journal.push(format!("put {remote}"));
        Ok(len)
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        let mut state = self.lock();
        let (key, node) = state.lookup(path)?;
        if node.kind() == EntryKind::Directory {
            return Err(Error::NotAFile(path.to_string()));
        }
        state.check_parent_writable(&key, path)?;
        state.nodes.remove(&key);
        state.journal.push(format!("remove {path}"));
        Ok(())
    }

    async fn mkdir(&mut self, path: &str, mode: u32) -> Result<()> {
        let mut state = self.lock();
        let key = normalize(path);
        if state.nodes.contains_key(&key) {
            return Err(Error::remote(path, "file exists"));
        }
        state.check_parent_writable(&key, path)?;
        state.nodes.insert(
            key,
            Node {
                content: Content::Directory,
                mode: mode & 0o7777,
            },
        );
        state.journal.push(format!("mkdir {path}"));
        Ok(())
    }

    async fn rmdir(&mut self, path: &str) -> Result<()> {
        let mut state = self.lock();
        let (key, node) = state.lookup(path)?;
        if node.kind() != EntryKind::Directory {
            return Err(Error::NotADirectory(path.to_string()));
        }
        if key.is_empty() {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        if !state.children(&key).is_empty() {
            return Err(Error::remote(path, "directory not empty"));
        }
        state.check_parent_writable(&key, path)?;
        state.nodes.remove(&key);
        state.journal.push(format!("rmdir {path}"));
        Ok(())
    }

    async fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        let mut state = self.lock();
        let (src_key, _) = state.lookup(src)?;
        let dst_key = normalize(dst);
        state.check_parent_writable(&src_key, src)?;
        state.check_parent_writable(&dst_key, dst)?;
        if state.nodes.contains_key(&dst_key) {
            return Err(Error::remote(dst, "file exists"));
        }

        let prefix = format!("{src_key}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| **k == src_key || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = state.nodes.remove(&key) {
                let rest = &key[src_key.len()..];
                state.nodes.insert(format!("{dst_key}{rest}"), node);
            }
        }
        state.journal.push(format!("rename {src} {dst}"));
        Ok(())
    }

    async fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let mut state = self.lock();
        let (key, _) = state.lookup(path)?;
        if let Some(node) = state.nodes.get_mut(&key) {
            node.mode = mode & 0o7777;
        }
        state.journal.push(format!("chmod {path} {mode:o}"));
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        let mut state = self.lock();
        if !state.exec_enabled {
            return Err(Error::NotSupported(format!(
                "remote command execution ({command})"
            )));
        }
        state.journal.push(format!("execute {command}"));

        let argv = tokenize(command)?;
        match argv.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["cp", "-Rp", src, dst] => {
                state.copy_subtree(src, dst)?;
                Ok(String::new())
            }
            _ => Err(Error::remote(command, "command not supported")),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.closed = true;
        state.journal.push("close".to_string());
        Ok(())
    }
}
