//! Release version resolution.
//!
//! Precedence is strict: explicit argument, then the `VERSION` environment
//! variable, then the first top-level `version:` line of the version file.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Environment, ENV_VERSION};
use crate::error::PipelineError;

/// Where the resolved version came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    Argument,
    Environment,
    VersionFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub value: String,
    pub source: VersionSource,
}

pub fn resolve_version(
    arg: Option<&str>,
    env: &Environment,
    version_file: &Path,
) -> Result<ResolvedVersion> {
    if let Some(value) = arg.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(ResolvedVersion {
            value: value.to_string(),
            source: VersionSource::Argument,
        });
    }

    if let Some(value) = env.get(ENV_VERSION) {
        return Ok(ResolvedVersion {
            value: value.to_string(),
            source: VersionSource::Environment,
        });
    }

    if let Some(value) = read_version_file(version_file)? {
        return Ok(ResolvedVersion {
            value,
            source: VersionSource::VersionFile(version_file.to_path_buf()),
        });
    }

    Err(PipelineError::configuration(format!(
        "release version not set: pass it as an argument, set {ENV_VERSION}, \
         or add a 'version:' line to '{}'",
        version_file.display()
    ))
    .into())
}

fn read_version_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(parse_version_file(&contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading version file '{}'", path.display())),
    }
}

/// Value of the first unindented `version:` line, quotes stripped.
///
/// Only the first match counts, even if its value is empty.
pub fn parse_version_file(contents: &str) -> Option<String> {
    let line = contents.lines().find(|l| l.starts_with("version:"))?;
    let value: String = line["version:".len()..]
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect();
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
