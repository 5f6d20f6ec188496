//! Whole-subtree operations built on single-entry primitives
//!
//! Nothing here is atomic. A failure part way through aborts the operation
//! and leaves whatever was already created or removed in place.

use crate::channel::{DEFAULT_DIR_MODE, RemoteChannel, ancestors_inclusive, basename, join};
use crate::line::quote;
use crate::walker::{LocalTree, TreeVisitor, walk};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Create `path` and any missing parents
///
/// # Errors
///
/// [`Error::NotADirectory`] if a component exists as something else.
pub async fn create_dir_all<C>(channel: &mut C, path: &str) -> Result<()>
where
    C: RemoteChannel + ?Sized,
{
    for prefix in ancestors_inclusive(path) {
        match channel.stat(&prefix).await {
            Ok(meta) if meta.kind.is_dir() => continue,
            Ok(_) => return Err(Error::NotADirectory(prefix)),
            Err(Error::NotFound(_)) => channel.mkdir(&prefix, DEFAULT_DIR_MODE).await?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

struct DeleteVisitor {
    removed: usize,
}

#[async_trait]
impl<C: RemoteChannel + ?Sized> TreeVisitor<C> for DeleteVisitor {
    async fn visit_file(&mut self, tree: &mut C, path: &str) -> Result<()> {
        tree.remove(path).await?;
        self.removed += 1;
        Ok(())
    }

    async fn on_ascend(&mut self, tree: &mut C, dir: &str) -> Result<()> {
        tree.rmdir(dir).await?;
        self.removed += 1;
        Ok(())
    }
}

/// Delete the directory `path` and everything below it, deepest first
///
/// # Errors
///
/// [`Error::NotFound`] for a missing path, [`Error::NotADirectory`] for a
/// path that is not a directory, otherwise the first failing removal.
pub async fn remove_tree<C>(channel: &mut C, path: &str) -> Result<()>
where
    C: RemoteChannel + ?Sized,
{
    if !channel.stat(path).await?.kind.is_dir() {
        return Err(Error::NotADirectory(path.to_string()));
    }

    let mut visitor = DeleteVisitor { removed: 0 };
    let result = walk(channel, path, &mut visitor).await;
    debug!(path, removed = visitor.removed, ok = result.is_ok(), "remove tree");
    result
}

/// Where a copy of `src` onto `dst` lands
///
/// An existing directory receives the source under its own name; a missing
/// path is the destination itself.
///
/// # Errors
///
/// [`Error::NotFound`] if `src` is missing, [`Error::DestinationExists`] if
/// the resolved destination already exists.
pub async fn resolve_destination<C>(channel: &mut C, src: &str, dst: &str) -> Result<String>
where
    C: RemoteChannel + ?Sized,
{
    channel.stat(src).await?;

    let resolved = match channel.stat(dst).await {
        Ok(meta) if meta.kind.is_dir() => join(dst, basename(src)),
        Ok(_) => return Err(Error::DestinationExists(dst.to_string())),
        Err(Error::NotFound(_)) => return Ok(dst.to_string()),
        Err(e) => return Err(e),
    };

    if channel.exists(&resolved).await? {
        return Err(Error::DestinationExists(resolved));
    }
    Ok(resolved)
}

/// Map `path`, found under `from`, to the same place under `to`
fn rebase(path: &str, from: &str, to: &str) -> String {
    let rest = if from.is_empty() || from == "." {
        path
    } else {
        path.strip_prefix(from).unwrap_or(path)
    };
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() || rest == "." {
        to.to_string()
    } else {
        join(to, rest)
    }
}

/// Downloads a remote subtree into a local directory
struct StageVisitor<'a> {
    remote_root: &'a str,
    local_root: &'a str,
    files: usize,
}

#[async_trait]
impl<'a, C: RemoteChannel + ?Sized> TreeVisitor<C> for StageVisitor<'a> {
    async fn visit_file(&mut self, tree: &mut C, path: &str) -> Result<()> {
        let local = rebase(path, self.remote_root, self.local_root);
        tree.get(path, Path::new(&local)).await?;
        self.files += 1;
        Ok(())
    }

    async fn on_descend(&mut self, _tree: &mut C, dir: &str) -> Result<()> {
        let local = rebase(dir, self.remote_root, self.local_root);
        tokio::fs::create_dir_all(&local).await?;
        Ok(())
    }
}

/// Uploads a staged local subtree to the remote side
struct UploadVisitor<'a, C: ?Sized> {
    channel: &'a mut C,
    local_root: &'a str,
    remote_root: &'a str,
}

#[async_trait]
impl<'a, C: RemoteChannel + ?Sized> TreeVisitor<LocalTree> for UploadVisitor<'a, C> {
    async fn visit_file(&mut self, _tree: &mut LocalTree, path: &str) -> Result<()> {
        let remote = rebase(path, self.local_root, self.remote_root);
        self.channel.put(Path::new(path), &remote).await?;
        Ok(())
    }

    async fn on_descend(&mut self, _tree: &mut LocalTree, dir: &str) -> Result<()> {
        let remote = rebase(dir, self.local_root, self.remote_root);
        self.channel.mkdir(&remote, DEFAULT_DIR_MODE).await
    }
}

/// Copy `src` to `dst` by staging the subtree locally
///
/// Stages under the system temporary directory; see [`staged_copy_in`].
///
/// # Errors
///
/// Validation errors from [`resolve_destination`], otherwise the first
/// failing transfer.
pub async fn staged_copy<C>(channel: &mut C, src: &str, dst: &str) -> Result<String>
where
    C: RemoteChannel + ?Sized,
{
    staged_copy_in(channel, src, dst, &std::env::temp_dir()).await
}

/// Copy `src` to `dst`, staging inside a fresh directory under `stage_parent`
///
/// The subtree is downloaded, creating every directory on the way down so
/// empty ones survive, and the staged tree is then uploaded. The staging
/// directory is removed on every exit path, including failures. Remote
/// entries created before a failure stay in place. Returns the resolved
/// destination.
///
/// # Errors
///
/// Validation errors from [`resolve_destination`], otherwise the first
/// failing transfer.
pub async fn staged_copy_in<C>(
    channel: &mut C,
    src: &str,
    dst: &str,
    stage_parent: &Path,
) -> Result<String>
where
    C: RemoteChannel + ?Sized,
{
    let dest = resolve_destination(channel, src, dst).await?;

    let stage = TempDir::new_in(stage_parent)?;
    let local_root = stage.path().join("stage");
    let local_root = local_root.to_string_lossy().into_owned();

    let mut download = StageVisitor {
        remote_root: src,
        local_root: &local_root,
        files: 0,
    };
    let staged = walk(channel, src, &mut download).await;
    let files = download.files;

    let copied = match staged {
        Ok(()) => {
            let mut upload = UploadVisitor {
                channel,
                local_root: &local_root,
                remote_root: &dest,
            };
            walk(&mut LocalTree, &local_root, &mut upload).await
        }
        Err(e) => Err(e),
    };

    let cleaned = stage.close();
    if let Err(e) = copied {
        if let Err(cleanup) = cleaned {
            warn!(error = %cleanup, "failed to remove staging directory");
        }
        debug!(src, dst = %dest, files, error = %e, "staged copy aborted");
        return Err(e);
    }
    cleaned?;

    info!(event = "copy", src, dst = %dest, files, "Staged copy complete");
    Ok(dest)
}

/// Copy `src` to `dst` with `cp -Rp` on the remote host
///
/// Returns the resolved destination.
///
/// # Errors
///
/// Validation errors from [`resolve_destination`],
/// [`Error::NotSupported`] when the channel cannot execute commands, or the
/// command's failure.
pub async fn exec_copy<C>(channel: &mut C, src: &str, dst: &str) -> Result<String>
where
    C: RemoteChannel + ?Sized,
{
    let dest = resolve_destination(channel, src, dst).await?;
    let command = format!("cp -Rp {} {}", quote(src), quote(&dest));
    channel.execute(&command).await?;
    info!(event = "copy", src, dst = %dest, "Remote copy complete");
    Ok(dest)
}
