use anyhow::{Context, Result};

use ankor_release::config::{current_root, BuildConfig, Environment, PublishConfig};
use ankor_release::process::HostTools;
use ankor_release::{build_package, publish_repository};

pub(crate) fn run_build(version: Option<&str>, env: &Environment) -> Result<()> {
    let root = current_root()?;
    let config = BuildConfig::resolve(&root, version, env)?;
    let built = build_package(&config, &HostTools)
        .with_context(|| format!("building {} {}", config.package_name, config.version))?;
    tracing::debug!(
        archive = %built.archive.display(),
        installed_size_kib = built.installed_size_kib,
        "build finished"
    );
    Ok(())
}

pub(crate) fn run_publish(
    deb_dir: Option<&str>,
    repo_dir: Option<&str>,
    env: &Environment,
) -> Result<()> {
    let root = current_root()?;
    let config = PublishConfig::resolve(&root, deb_dir, repo_dir, env)?;
    let summary = publish_repository(&config, &HostTools)
        .with_context(|| format!("publishing into {}", config.repo_dir.display()))?;
    tracing::debug!(
        packages = summary.packages,
        signed = summary.signed,
        "publish finished"
    );
    Ok(())
}
