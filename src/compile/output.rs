//! Filesystem primitives for the output tree.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, io_err};

/// Write `contents` to `path` through a temp file in the same directory and
/// rename it into place, so readers never observe a half-written file.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents)).await?
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".mirrorwatch-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| io_err(parent, e))?;
    tmp.write_all(contents).map_err(|e| io_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}

/// Write a non-critical sidecar (source maps) directly.
pub async fn write_plain(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| io_err(path, e))
}

/// Delete a file or a whole directory tree. Returns `false` when nothing was
/// there; a missing path is not an error.
pub async fn remove_path(path: &Path) -> Result<bool> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(io_err(path, e)),
    };

    let removed = if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Copy the permission bits of `from` onto `to`.
pub async fn copy_permissions(from: &Path, to: &Path) -> Result<()> {
    let perms = tokio::fs::metadata(from)
        .await
        .map_err(|e| io_err(from, e))?
        .permissions();
    tokio::fs::set_permissions(to, perms)
        .await
        .map_err(|e| io_err(to, e))
}

/// `path` rendered with `/` separators, for source map `sources` entries.
pub fn slash_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
