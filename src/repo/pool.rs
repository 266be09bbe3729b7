//! Input scanning and the content pool.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PipelineError;

/// `(package, version, architecture)` parsed from `<name>_<version>_<arch>.deb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebIdent {
    pub package: String,
    pub version: String,
    pub arch: String,
}

/// A built archive found in the input directory.
#[derive(Debug, Clone)]
pub struct DebArchive {
    pub path: PathBuf,
    pub file_name: String,
    pub ident: Option<DebIdent>,
}

pub fn parse_deb_file_name(name: &str) -> Option<DebIdent> {
    let stem = name.strip_suffix(".deb")?;
    let mut parts = stem.split('_');
    let (package, version, arch) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || package.is_empty() || version.is_empty() || arch.is_empty() {
        return None;
    }
    Some(DebIdent {
        package: package.to_string(),
        version: version.to_string(),
        arch: arch.to_string(),
    })
}

/// All `*.deb` files directly under `deb_dir`, sorted by file name.
pub fn scan_archives(deb_dir: &Path) -> Result<Vec<DebArchive>> {
    if !deb_dir.is_dir() {
        return Err(PipelineError::asset_missing("input directory", deb_dir).into());
    }

    let mut archives = Vec::new();
    for entry in fs::read_dir(deb_dir)
        .with_context(|| format!("reading input directory '{}'", deb_dir.display()))?
    {
        let entry = entry
            .with_context(|| format!("reading entry under '{}'", deb_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".deb") || file_name.starts_with('.') {
            continue;
        }
        archives.push(DebArchive {
            ident: parse_deb_file_name(file_name),
            file_name: file_name.to_string(),
            path,
        });
    }

    if archives.is_empty() {
        return Err(PipelineError::NoArtifacts {
            dir: deb_dir.to_path_buf(),
        }
        .into());
    }

    archives.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(archives)
}

/// Copy archives into `pool_dir` unchanged and verify each copy.
pub fn copy_into_pool(archives: &[DebArchive], pool_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::with_capacity(archives.len());
    for archive in archives {
        let dst = pool_dir.join(&archive.file_name);
        fs::copy(&archive.path, &dst).with_context(|| {
            format!(
                "copying '{}' into pool '{}'",
                archive.path.display(),
                pool_dir.display()
            )
        })?;

        let (src_sha, _) = sha256_file(&archive.path)?;
        let (dst_sha, size) = sha256_file(&dst)?;
        if src_sha != dst_sha {
            anyhow::bail!(
                "pool copy of '{}' does not match its source\n  expected: {}\n  actual:   {}",
                archive.file_name,
                src_sha,
                dst_sha
            );
        }
        debug!(file = %archive.file_name, size, sha256 = %dst_sha, "pooled archive");
        copied.push(dst);
    }
    Ok(copied)
}

pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    let sha = format!("{:x}", hasher.finalize());
    Ok((sha, size))
}
