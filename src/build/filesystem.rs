//! Staging-tree layout for the Debian package.
//!
//! The staging directory mirrors the installed system:
//! - `DEBIAN/control`
//! - `usr/bin/<name>` (generated launcher)
//! - `usr/share/<name>/<entry point>`
//! - `usr/share/applications/<name>.desktop`
//! - `usr/share/icons/hicolor/<size>/apps/<name>.<ext>`
//! - `usr/share/doc/<name>/<doc>`

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::PipelineError;

pub const CONTROL_DIR: &str = "DEBIAN";
pub const MODE_EXEC: u32 = 0o755;
pub const MODE_DATA: u32 = 0o644;
pub const MODE_DIR: u32 = 0o755;

/// Relative install locations for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub launcher: PathBuf,
    pub share_dir: PathBuf,
    pub desktop_entry: PathBuf,
    pub icon_dir: PathBuf,
    pub doc_dir: PathBuf,
}

impl InstallLayout {
    pub fn for_package(name: &str, icon: &Path) -> Self {
        let icon_size = match icon.extension().and_then(|e| e.to_str()) {
            Some("svg") => "scalable",
            _ => "256x256",
        };
        Self {
            launcher: PathBuf::from("usr/bin").join(name),
            share_dir: PathBuf::from("usr/share").join(name),
            desktop_entry: PathBuf::from("usr/share/applications").join(format!("{name}.desktop")),
            icon_dir: PathBuf::from("usr/share/icons/hicolor")
                .join(icon_size)
                .join("apps"),
            doc_dir: PathBuf::from("usr/share/doc").join(name),
        }
    }
}

/// Shell wrapper installed as `/usr/bin/<name>`.
pub fn launcher_script(name: &str, entry_file: &str) -> String {
    format!("#!/bin/sh\nexec python3 /usr/share/{name}/{entry_file} \"$@\"\n")
}

/// Write a file with specific permissions, creating parent directories.
pub fn write_file_mode(staging: &Path, rel: &Path, content: &[u8], mode: u32) -> Result<PathBuf> {
    let full_path = staging.join(rel);
    create_parent_dirs(&full_path)?;
    fs::write(&full_path, content)
        .with_context(|| format!("writing '{}'", full_path.display()))?;
    fs::set_permissions(&full_path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode {:o} on '{}'", mode, full_path.display()))?;
    debug!(path = %full_path.display(), mode = %format!("{mode:o}"), "staged file");
    Ok(full_path)
}

/// Copy `src` into the staging tree at `rel` with `mode`.
pub fn install_file(src: &Path, staging: &Path, rel: &Path, mode: u32) -> Result<PathBuf> {
    if !src.is_file() {
        return Err(PipelineError::asset_missing("source file", src).into());
    }

    let dst = staging.join(rel);
    create_parent_dirs(&dst)?;
    fs::copy(src, &dst)
        .with_context(|| format!("copying '{}' -> '{}'", src.display(), dst.display()))?;
    fs::set_permissions(&dst, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode {:o} on '{}'", mode, dst.display()))?;
    debug!(src = %src.display(), dst = %dst.display(), "installed file");
    Ok(dst)
}

fn create_parent_dirs(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(parent)
        .with_context(|| format!("creating directory '{}'", parent.display()))
}

/// Normalize every directory under `root` to 0755.
///
/// dpkg-deb rejects control directories with group/other write bits, and the
/// process umask must not leak into the package.
pub fn normalize_dir_modes(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walking '{}'", root.display()))?;
        if entry.file_type().is_dir() {
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(MODE_DIR))
                .with_context(|| format!("setting mode on '{}'", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Installed size in KiB, computed the way dpkg-gencontrol does.
///
/// Regular files contribute `ceil(bytes / 1024)`; directories, symlinks
/// and other entries contribute 1 each. The control directory and the
/// staging root itself are not counted.
pub fn installed_size_kib(staging: &Path) -> Result<u64> {
    let mut total = 0u64;
    let walker = WalkDir::new(staging)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == CONTROL_DIR));

    for entry in walker {
        let entry = entry.with_context(|| format!("walking '{}'", staging.display()))?;
        if entry.file_type().is_file() {
            let len = entry
                .metadata()
                .with_context(|| format!("reading metadata of '{}'", entry.path().display()))?
                .len();
            total += len.div_ceil(1024);
        } else {
            total += 1;
        }
    }

    Ok(total)
}
