//! Package index generation and per-architecture encodings.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};

pub const PACKAGES: &str = "Packages";
pub const PACKAGES_GZ: &str = "Packages.gz";
pub const PACKAGES_XZ: &str = "Packages.xz";

/// Canonical index text held in a scratch file for the duration of a run.
///
/// The file is removed when this value is dropped, whether the run
/// succeeded or not.
#[derive(Debug)]
pub struct ScratchIndex {
    file: NamedTempFile,
    packages: usize,
}

impl ScratchIndex {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of package stanzas in the index.
    pub fn packages(&self) -> usize {
        self.packages
    }
}

/// Scan the whole pool once with `dpkg-scanpackages --multiversion`.
///
/// Runs from `repo_dir` so every `Filename:` field is repo-relative.
pub fn scan_pool(
    repo_dir: &Path,
    component: &str,
    tools: &dyn ToolRunner,
) -> Result<ScratchIndex> {
    let pool_rel = format!("pool/{component}");
    let output = Cmd::new("dpkg-scanpackages")
        .args(["--multiversion", pool_rel.as_str(), "/dev/null"])
        .current_dir(repo_dir)
        .error_msg(format!("dpkg-scanpackages failed to index {pool_rel}"))
        .run(tools)?;

    let text = output.stdout_text();
    let packages = count_stanzas(&text);
    if packages == 0 {
        return Err(PipelineError::ExternalTool {
            tool: "dpkg-scanpackages".to_string(),
            status: "exit code 0".to_string(),
            message: format!("index for {pool_rel} lists no packages"),
        }
        .into());
    }

    let mut file = tempfile::Builder::new()
        .prefix(".packages-")
        .tempfile_in(repo_dir)
        .with_context(|| format!("creating scratch index in '{}'", repo_dir.display()))?;
    file.write_all(text.as_bytes())
        .and_then(|_| file.flush())
        .context("writing scratch index")?;

    debug!(packages, path = %file.path().display(), "generated package index");
    Ok(ScratchIndex { file, packages })
}

/// Number of `Package:` stanzas in an index.
pub fn count_stanzas(index: &str) -> usize {
    index.lines().filter(|l| l.starts_with("Package:")).count()
}

/// Write `Packages`, `Packages.gz` and `Packages.xz` into `binary_dir` and
/// check that both compressed files decode to the plain bytes.
pub fn write_encodings(
    index: &Path,
    binary_dir: &Path,
    arch: &str,
    tools: &dyn ToolRunner,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(binary_dir)
        .with_context(|| format!("creating '{}'", binary_dir.display()))?;

    let plain_path = binary_dir.join(PACKAGES);
    let plain = fs::read(index).with_context(|| format!("reading '{}'", index.display()))?;
    fs::write(&plain_path, &plain)
        .with_context(|| format!("writing '{}'", plain_path.display()))?;

    let gz_path = binary_dir.join(PACKAGES_GZ);
    let gz = Cmd::new("gzip")
        .args(["-9", "-n", "-c"])
        .arg_path(&plain_path)
        .error_msg(format!("gzip failed for binary-{arch}"))
        .run(tools)?;
    fs::write(&gz_path, &gz.stdout).with_context(|| format!("writing '{}'", gz_path.display()))?;

    let xz_path = binary_dir.join(PACKAGES_XZ);
    let xz = Cmd::new("xz")
        .args(["-9", "-c"])
        .arg_path(&plain_path)
        .error_msg(format!("xz failed for binary-{arch}"))
        .run(tools)?;
    fs::write(&xz_path, &xz.stdout).with_context(|| format!("writing '{}'", xz_path.display()))?;

    verify_decodes_to(tools, "gzip", &gz_path, &plain, arch)?;
    verify_decodes_to(tools, "xz", &xz_path, &plain, arch)?;

    debug!(arch, dir = %binary_dir.display(), "wrote index encodings");
    Ok(vec![plain_path, gz_path, xz_path])
}

fn verify_decodes_to(
    tools: &dyn ToolRunner,
    program: &str,
    encoded: &Path,
    expected: &[u8],
    arch: &str,
) -> Result<()> {
    let decoded = Cmd::new(program)
        .args(["-d", "-c"])
        .arg_path(encoded)
        .error_msg(format!("{program} could not decode {}", encoded.display()))
        .run(tools)
        .map_err(|err| PipelineError::IndexEncoding {
            arch: arch.to_string(),
            detail: format!("{err:#}"),
        })?;

    if decoded.stdout != expected {
        return Err(PipelineError::IndexEncoding {
            arch: arch.to_string(),
            detail: format!(
                "{} decodes to {} bytes that differ from the {}-byte plain index",
                encoded.display(),
                decoded.stdout.len(),
                expected.len()
            ),
        }
        .into());
    }
    Ok(())
}
