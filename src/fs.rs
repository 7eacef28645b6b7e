//! Filesystem helpers shared by the method handlers.
//!
//! Directory contents are exposed as a lazy, finite, non-restartable
//! stream of entries. The recursive delete and copy walks go depth-first
//! and never follow symlinks out of the subtree.

use std::io;
use std::path::Path;

use async_stream::stream;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::BoxStream;

use crate::props;

/// Stream the entries of a directory. Entries that fail to read
/// terminate the stream early; `.` and `..` are never produced.
pub(crate) async fn read_dir_stream(
    path: &Path,
) -> io::Result<BoxStream<'static, tokio::fs::DirEntry>> {
    let mut read_dir = tokio::fs::read_dir(path).await?;
    Ok(Box::pin(stream! {
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => yield entry,
                Ok(None) => break,
                Err(e) => {
                    debug!("read_dir failed {e}");
                    break;
                }
            }
        }
    }))
}

/// Depth-first removal of a directory tree. Symlinks are unlinked, not
/// followed. The first error aborts the walk.
pub(crate) fn remove_tree(path: &Path) -> BoxFuture<'_, io::Result<()>> {
    async move {
        trace!("FS: remove_tree {path:?}");
        let mut read_dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            // file_type comes from the entry itself and does not
            // follow symlinks.
            let ftype = entry.file_type().await?;
            let entry_path = entry.path();
            if ftype.is_dir() {
                remove_tree(&entry_path).await?;
            } else {
                tokio::fs::remove_file(&entry_path).await?;
            }
        }
        tokio::fs::remove_dir(path).await
    }
    .boxed()
}

/// Remove a single resource: a file is unlinked, a directory removed
/// recursively. The target itself is never followed if it is a symlink.
pub(crate) async fn remove_any(path: &Path) -> io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        remove_tree(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Recursive copy that preserves dead properties on every copied entry.
/// Symlinked entries are skipped.
pub(crate) fn copy_tree<'a>(from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
    async move {
        trace!("FS: copy_tree {from:?} {to:?}");
        tokio::fs::create_dir(to).await?;
        props::copy_dead_properties(from, to);
        let mut read_dir = tokio::fs::read_dir(from).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let ftype = entry.file_type().await?;
            let src = entry.path();
            let dst = to.join(entry.file_name());
            if ftype.is_symlink() {
                continue;
            }
            if ftype.is_dir() {
                copy_tree(&src, &dst).await?;
            } else {
                copy_file(&src, &dst).await?;
            }
        }
        Ok(())
    }
    .boxed()
}

pub(crate) async fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    tokio::fs::copy(from, to).await?;
    props::copy_dead_properties(from, to);
    Ok(())
}
