//! End-to-end package build: staging, control rendering and archiving.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::filesystem::{
    install_file, installed_size_kib, launcher_script, normalize_dir_modes, write_file_mode,
    InstallLayout, CONTROL_DIR, MODE_DATA, MODE_EXEC,
};
use super::template::{self, render};
use crate::config::BuildConfig;
use crate::error::PipelineError;
use crate::preflight::{check_required_tools, BUILD_TOOLS};
use crate::process::{Cmd, ToolRunner};
use crate::workspace::{discard_file, partial_path, promote_file, RebuildDir};

/// Result of a successful package build.
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    pub archive: PathBuf,
    pub staging_dir: PathBuf,
    pub installed_size_kib: u64,
}

/// Stage, render and archive one package.
///
/// Pre-flight checks (tools, source assets) run before the staging tree is
/// touched. The archive is produced under a hidden partial name and only
/// renamed onto `<dist>/<name>_<version>_<arch>.deb` once dpkg-deb succeeds.
pub fn build_package(config: &BuildConfig, tools: &dyn ToolRunner) -> Result<BuiltPackage> {
    check_required_tools(tools, BUILD_TOOLS)?;
    check_assets(config)?;

    info!(
        package = %config.package_name,
        version = %config.version,
        source = ?config.version_source,
        "building package"
    );
    println!(
        "[build] {} {} ({})",
        config.package_name, config.version, config.architecture
    );

    let staging = RebuildDir::acquire(&config.staging_dir())?;
    let installed_size = stage_tree(config, staging.path())?;

    let archive = config.archive_path();
    archive_tree(staging.path(), &archive, tools)?;
    let staging_dir = staging.promote();

    println!("[build] wrote {}", archive.display());
    Ok(BuiltPackage {
        archive,
        staging_dir,
        installed_size_kib: installed_size,
    })
}

fn check_assets(config: &BuildConfig) -> Result<()> {
    let assets = &config.assets;
    for (what, path) in [
        ("application entry point", &assets.entry_point),
        ("desktop entry", &assets.desktop_entry),
        ("icon", &assets.icon),
        ("documentation", &assets.documentation),
        ("control template", &assets.control_template),
    ] {
        if !path.is_file() {
            return Err(PipelineError::asset_missing(what, path.clone()).into());
        }
    }
    Ok(())
}

/// Populate `staging` and render the control file; returns the installed size.
pub fn stage_tree(config: &BuildConfig, staging: &Path) -> Result<u64> {
    let name = &config.package_name;
    let assets = &config.assets;
    let layout = InstallLayout::for_package(name, &assets.icon);

    let entry_file = file_name(&assets.entry_point)?;
    install_file(
        &assets.entry_point,
        staging,
        &layout.share_dir.join(&entry_file),
        MODE_DATA,
    )?;
    write_file_mode(
        staging,
        &layout.launcher,
        launcher_script(name, &entry_file).as_bytes(),
        MODE_EXEC,
    )?;
    install_file(&assets.desktop_entry, staging, &layout.desktop_entry, MODE_DATA)?;

    let icon_ext = assets
        .icon
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    install_file(
        &assets.icon,
        staging,
        &layout.icon_dir.join(format!("{name}{icon_ext}")),
        MODE_DATA,
    )?;
    install_file(
        &assets.documentation,
        staging,
        &layout.doc_dir.join(file_name(&assets.documentation)?),
        MODE_DATA,
    )?;

    let installed_size = installed_size_kib(staging)?;
    let control = render_control(config, installed_size)?;
    write_file_mode(
        staging,
        &Path::new(CONTROL_DIR).join("control"),
        control.as_bytes(),
        MODE_DATA,
    )?;
    normalize_dir_modes(staging)?;

    Ok(installed_size)
}

/// Render the control template for `config`.
pub fn render_control(config: &BuildConfig, installed_size_kib: u64) -> Result<String> {
    let path = &config.assets.control_template;
    let template_text = fs::read_to_string(path)
        .with_context(|| format!("reading control template '{}'", path.display()))?;

    let mapping = BTreeMap::from([
        (template::PACKAGE, config.package_name.clone()),
        (template::VERSION, config.version.clone()),
        (template::ARCH, config.architecture.clone()),
        (template::MAINTAINER, config.maintainer.clone()),
        (template::INSTALLED_SIZE, installed_size_kib.to_string()),
    ]);
    let mut control = render(&template_text, &mapping)
        .with_context(|| format!("rendering control template '{}'", path.display()))?;
    if !control.ends_with('\n') {
        control.push('\n');
    }
    Ok(control)
}

fn archive_tree(staging: &Path, archive: &Path, tools: &dyn ToolRunner) -> Result<()> {
    let dist_dir = archive.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dist_dir)
        .with_context(|| format!("creating output directory '{}'", dist_dir.display()))?;

    let partial = partial_path(archive);
    discard_file(&partial);

    let result = Cmd::new("dpkg-deb")
        .args(["--root-owner-group", "--build"])
        .arg_path(staging)
        .arg_path(&partial)
        .error_msg(format!("dpkg-deb failed to build {}", archive.display()))
        .run(tools);

    if let Err(err) = result {
        discard_file(&partial);
        return Err(err);
    }
    if !partial.is_file() {
        return Err(PipelineError::ExternalTool {
            tool: "dpkg-deb".to_string(),
            status: "exit code 0".to_string(),
            message: format!("no archive written at '{}'", partial.display()),
        }
        .into());
    }

    promote_file(&partial, archive)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            anyhow::Error::from(PipelineError::configuration(format!(
                "'{}' has no file name",
                path.display()
            )))
        })
}
