//! Scoped rebuildable directories and partial-file promotion.
//!
//! Output directories are never merged with previous runs: a [`RebuildDir`]
//! starts empty, and unless [`RebuildDir::promote`] is called it is removed
//! again when dropped. A failed run therefore leaves the output absent
//! rather than half-built.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A directory owned by one pipeline run.
#[derive(Debug)]
pub struct RebuildDir {
    path: PathBuf,
    promoted: bool,
}

impl RebuildDir {
    /// Remove anything at `path` and create it empty.
    pub fn acquire(path: &Path) -> Result<Self> {
        clear_dir(path)?;
        fs::create_dir_all(path)
            .with_context(|| format!("creating directory '{}'", path.display()))?;
        debug!(path = %path.display(), "acquired rebuild directory");
        Ok(Self {
            path: path.to_path_buf(),
            promoted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory after this guard is dropped.
    pub fn promote(mut self) -> PathBuf {
        self.promoted = true;
        self.path.clone()
    }
}

impl Drop for RebuildDir {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to remove abandoned directory");
        }
    }
}

/// Remove `path` if it exists, whether directory or file.
pub fn clear_dir(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.with_context(|| format!("removing existing '{}' before recreation", path.display()))
}

/// Hidden sibling used while `dst` is being produced.
pub fn partial_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(".{name}.partial"))
}

/// Move a finished partial file onto its final path.
pub fn promote_file(partial: &Path, dst: &Path) -> Result<()> {
    fs::rename(partial, dst).with_context(|| {
        format!(
            "renaming '{}' -> '{}'",
            partial.display(),
            dst.display()
        )
    })
}

/// Remove a partial file, ignoring a file that was never created.
pub fn discard_file(partial: &Path) {
    if partial.exists() {
        if let Err(err) = fs::remove_file(partial) {
            warn!(path = %partial.display(), %err, "failed to remove partial file");
        }
    }
}
