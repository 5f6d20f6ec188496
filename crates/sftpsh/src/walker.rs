//! Directory tree traversal
//!
//! [`walk`] visits a tree in the order recursive operations need: a directory
//! is announced with `on_descend`, its files are visited, its subdirectories
//! are walked, and only then is it closed with `on_ascend`. Creation happens
//! on the way down and removal on the way up.
//!
//! The walker is generic over [`Tree`] so the same traversal runs over a
//! remote channel or a local directory.

use crate::channel::{EntryKind, RemoteChannel, join};
use crate::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;

/// Anything that can be listed and stat'ed by path
#[async_trait]
pub trait Tree: Send {
    /// Kind of the entry at `path`
    async fn kind(&mut self, path: &str) -> Result<EntryKind>;

    /// Names of the entries in `dir`, in visiting order
    async fn entries(&mut self, dir: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<C: RemoteChannel + ?Sized> Tree for C {
    async fn kind(&mut self, path: &str) -> Result<EntryKind> {
        Ok(self.stat(path).await?.kind)
    }

    async fn entries(&mut self, dir: &str) -> Result<Vec<String>> {
        self.list(dir).await
    }
}

/// The local filesystem, paths as given
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTree;

#[async_trait]
impl Tree for LocalTree {
    async fn kind(&mut self, path: &str) -> Result<EntryKind> {
        let meta = tokio::fs::symlink_metadata(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(path.to_string())
            } else {
                Error::Io(e)
            }
        })?;
        let file_type = meta.file_type();
        Ok(if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        })
    }

    async fn entries(&mut self, dir: &str) -> Result<Vec<String>> {
        let mut reader = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Callbacks invoked by [`walk`]
///
/// The tree is handed back to every callback so a visitor can mutate the
/// same channel it is walking.
#[async_trait]
pub trait TreeVisitor<T: Tree + ?Sized>: Send {
    /// Called once for every non-directory entry
    async fn visit_file(&mut self, tree: &mut T, path: &str) -> Result<()>;

    /// Called before any child of `dir` is visited
    async fn on_descend(&mut self, _tree: &mut T, _dir: &str) -> Result<()> {
        Ok(())
    }

    /// Called after every child of `dir` has been visited
    async fn on_ascend(&mut self, _tree: &mut T, _dir: &str) -> Result<()> {
        Ok(())
    }
}

/// Walk the tree rooted at `root`
///
/// A root that is not a directory is passed to `visit_file` on its own. The
/// first failing callback aborts the walk and its error is returned
/// unchanged; whatever the visitor already did stays done.
///
/// # Errors
///
/// Returns the first listing, stat or callback error.
pub async fn walk<T, V>(tree: &mut T, root: &str, visitor: &mut V) -> Result<()>
where
    T: Tree + ?Sized,
    V: TreeVisitor<T> + ?Sized,
{
    if tree.kind(root).await?.is_dir() {
        walk_dir(tree, root.to_string(), visitor).await
    } else {
        visitor.visit_file(tree, root).await
    }
}

fn walk_dir<'a, T, V>(
    tree: &'a mut T,
    dir: String,
    visitor: &'a mut V,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
where
    T: Tree + ?Sized + 'a,
    V: TreeVisitor<T> + ?Sized + 'a,
{
    Box::pin(async move {
        visitor.on_descend(tree, &dir).await?;

        let mut subdirs = Vec::new();
        for name in tree.entries(&dir).await? {
            let path = join(&dir, &name);
            if tree.kind(&path).await?.is_dir() {
                subdirs.push(path);
            } else {
                visitor.visit_file(tree, &path).await?;
            }
        }

        for subdir in subdirs {
            walk_dir(&mut *tree, subdir, &mut *visitor).await?;
        }

        visitor.on_ascend(tree, &dir).await
    })
}
