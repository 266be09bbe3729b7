//! End-to-end repository publish run.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use super::index::{scan_pool, write_encodings};
use super::pool::{copy_into_pool, scan_archives};
use super::release::{generate_release, sign_release};
use super::retention::apply_retention;
use crate::config::PublishConfig;
use crate::preflight::check_publish_tools;
use crate::process::ToolRunner;
use crate::workspace::RebuildDir;

/// What a publish run produced.
#[derive(Debug, Clone)]
pub struct PublishSummary {
    pub repo_dir: PathBuf,
    pub dist: String,
    pub component: String,
    pub architectures: Vec<String>,
    pub pooled: Vec<PathBuf>,
    pub dropped: Vec<String>,
    pub packages: usize,
    pub release: PathBuf,
    pub signed: bool,
}

impl fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repository:    {}", self.repo_dir.display())?;
        writeln!(f, "Distribution:  {}", self.dist)?;
        writeln!(f, "Component:     {}", self.component)?;
        writeln!(f, "Architectures: {}", self.architectures.join(" "))?;
        writeln!(
            f,
            "Packages:      {} ({} archives pooled)",
            self.packages,
            self.pooled.len()
        )?;
        if !self.dropped.is_empty() {
            writeln!(f, "Retired:       {}", self.dropped.join(", "))?;
        }
        write!(
            f,
            "Release:       {} ({})",
            self.release.display(),
            if self.signed { "signed" } else { "unsigned" }
        )
    }
}

/// Rebuild the repository under `config.repo_dir` from `config.deb_dir`.
///
/// The pool and distribution directories are recreated from scratch. If any
/// step fails both are removed again, so a failed run never leaves a
/// half-published repository behind.
pub fn publish_repository(
    config: &PublishConfig,
    tools: &dyn ToolRunner,
) -> Result<PublishSummary> {
    check_publish_tools(tools, config.signing_key.is_some())?;

    let mut archives = scan_archives(&config.deb_dir)?;
    let mut dropped = Vec::new();
    if let Some(keep) = config.keep_versions {
        let (kept, retired) = apply_retention(archives, keep);
        for archive in &retired {
            warn!(file = %archive.file_name, keep, "not publishing superseded archive");
        }
        archives = kept;
        dropped = retired.into_iter().map(|a| a.file_name).collect();
    }

    info!(
        archives = archives.len(),
        repo = %config.repo_dir.display(),
        "publishing repository"
    );
    println!(
        "[publish] {} archive(s) from {}",
        archives.len(),
        config.deb_dir.display()
    );

    fs::create_dir_all(&config.repo_dir)
        .with_context(|| format!("creating repository '{}'", config.repo_dir.display()))?;
    let pool = RebuildDir::acquire(&config.pool_dir())?;
    let dists = RebuildDir::acquire(&config.dist_dir())?;

    let pooled = copy_into_pool(&archives, pool.path())?;

    let index = scan_pool(&config.repo_dir, &config.component, tools)?;
    for arch in &config.architectures {
        write_encodings(index.path(), &config.binary_dir(arch), arch, tools)
            .with_context(|| format!("writing binary-{arch} indices"))?;
        println!("[publish] indexed binary-{arch}");
    }
    let packages = index.packages();
    drop(index);

    let release = generate_release(config, tools)?;
    let signed = match &config.signing_key {
        Some(key) => {
            sign_release(&release, key, tools)?;
            true
        }
        None => false,
    };

    pool.promote();
    dists.promote();

    let summary = PublishSummary {
        repo_dir: config.repo_dir.clone(),
        dist: config.dist.clone(),
        component: config.component.clone(),
        architectures: config.architectures.clone(),
        pooled,
        dropped,
        packages,
        release,
        signed,
    };
    println!("{summary}");
    Ok(summary)
}
