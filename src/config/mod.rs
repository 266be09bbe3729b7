//! Per-invocation configuration.
//!
//! Both pipelines receive an immutable config built once from the command
//! line, an [`Environment`] snapshot, the optional `packaging.toml` and the
//! version file. Nothing downstream reads the process environment.
//!
//! Precedence per field: positional argument, environment, `packaging.toml`,
//! built-in default.

mod file;
pub mod version;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
pub use file::CONFIG_FILE_NAME;
use file::load_packaging_toml;
pub use version::{parse_version_file, resolve_version, ResolvedVersion, VersionSource};

pub const ENV_VERSION: &str = "VERSION";
pub const ENV_PACKAGE_NAME: &str = "PACKAGE_NAME";
pub const ENV_ARCH: &str = "ARCH";
pub const ENV_MAINTAINER: &str = "MAINTAINER";
pub const ENV_DIST: &str = "DIST";
pub const ENV_COMPONENT: &str = "COMPONENT";
pub const ENV_ARCHS: &str = "ARCHS";
pub const ENV_ORIGIN: &str = "ORIGIN";
pub const ENV_LABEL: &str = "LABEL";
pub const ENV_DESCRIPTION: &str = "DESCRIPTION";
pub const ENV_SIGNING_KEY: &str = "GPG_KEY_ID";
pub const ENV_KEEP_VERSIONS: &str = "KEEP_VERSIONS";

pub const DEFAULT_PACKAGE_NAME: &str = "ankor-device-info";
pub const DEFAULT_ARCH: &str = "all";
pub const DEFAULT_MAINTAINER: &str = "Ankor Maintainers <maintainers@ankor.dev>";
pub const DEFAULT_DEB_DIR: &str = "dist";
pub const DEFAULT_REPO_DIR: &str = "apt-repo";
pub const DEFAULT_DIST: &str = "stable";
pub const DEFAULT_COMPONENT: &str = "main";
pub const DEFAULT_ARCHITECTURES: &[&str] = &["amd64", "all"];
pub const DEFAULT_ORIGIN: &str = "Ankor";
pub const DEFAULT_LABEL: &str = "Ankor Device Info";
pub const DEFAULT_DESCRIPTION: &str = "APT repository for Ankor Device Info";

const DEFAULT_ENTRY_POINT: &str = "main.py";
const DEFAULT_DESKTOP_ENTRY: &str = "packaging/ankor-device-info.desktop";
const DEFAULT_ICON: &str = "packaging/ankor-device-info.png";
const DEFAULT_DOCUMENTATION: &str = "README.md";
const DEFAULT_CONTROL_TEMPLATE: &str = "packaging/debian/control.in";
const DEFAULT_VERSION_FILE: &str = "snap/snapcraft.yaml";

/// Snapshot of environment variables taken once at startup.
///
/// Empty values are treated as unset. Variables whose name or value is not
/// valid UTF-8 are skipped.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Source files copied into the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub entry_point: PathBuf,
    pub desktop_entry: PathBuf,
    pub icon: PathBuf,
    pub documentation: PathBuf,
    pub control_template: PathBuf,
}

/// Everything the package builder needs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub root: PathBuf,
    pub version: String,
    pub version_source: VersionSource,
    pub package_name: String,
    pub architecture: String,
    pub maintainer: String,
    pub assets: AssetPaths,
}

impl BuildConfig {
    pub fn resolve(root: &Path, version_arg: Option<&str>, env: &Environment) -> Result<Self> {
        let toml = load_packaging_toml(root)?;

        let version_file = root.join(
            toml.assets
                .version_file
                .as_deref()
                .unwrap_or(DEFAULT_VERSION_FILE),
        );
        let version = resolve_version(version_arg, env, &version_file)?;

        let package_name = pick(env, ENV_PACKAGE_NAME, toml.package.name, DEFAULT_PACKAGE_NAME);
        let architecture = pick(env, ENV_ARCH, toml.package.architecture, DEFAULT_ARCH);
        let maintainer = pick(env, ENV_MAINTAINER, toml.package.maintainer, DEFAULT_MAINTAINER);

        validate_package_name(&package_name)?;
        validate_version(&version.value)?;
        validate_token("architecture", &architecture)?;
        validate_single_line("maintainer", &maintainer)?;

        let asset = |value: Option<String>, default: &str| {
            root.join(value.unwrap_or_else(|| default.to_string()))
        };
        let assets = AssetPaths {
            entry_point: asset(toml.assets.entry_point, DEFAULT_ENTRY_POINT),
            desktop_entry: asset(toml.assets.desktop_entry, DEFAULT_DESKTOP_ENTRY),
            icon: asset(toml.assets.icon, DEFAULT_ICON),
            documentation: asset(toml.assets.documentation, DEFAULT_DOCUMENTATION),
            control_template: asset(toml.assets.control_template, DEFAULT_CONTROL_TEMPLATE),
        };

        Ok(Self {
            root: root.to_path_buf(),
            version: version.value,
            version_source: version.source,
            package_name,
            architecture,
            maintainer,
            assets,
        })
    }

    /// `<name>_<version>`, the staging directory name.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.package_name, self.version)
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}_{}.deb", self.stem(), self.architecture)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("build/deb").join(self.stem())
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(DEFAULT_DEB_DIR)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dist_dir().join(self.archive_file_name())
    }
}

/// Everything the repository publisher needs.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub deb_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub dist: String,
    pub component: String,
    pub architectures: Vec<String>,
    pub origin: String,
    pub label: String,
    pub description: String,
    pub signing_key: Option<String>,
    /// Newest versions kept per package and architecture; `None` keeps all.
    pub keep_versions: Option<usize>,
}

impl PublishConfig {
    pub fn resolve(
        root: &Path,
        deb_dir_arg: Option<&str>,
        repo_dir_arg: Option<&str>,
        env: &Environment,
    ) -> Result<Self> {
        let toml = load_packaging_toml(root)?;
        let repo = toml.repository;

        let dir = |arg: Option<&str>, value: Option<String>, default: &str| {
            let raw = arg
                .map(str::to_string)
                .or(value)
                .unwrap_or_else(|| default.to_string());
            root.join(raw)
        };
        let deb_dir = dir(deb_dir_arg, repo.deb_dir, DEFAULT_DEB_DIR);
        let repo_dir = dir(repo_dir_arg, repo.repo_dir, DEFAULT_REPO_DIR);

        let dist = pick(env, ENV_DIST, repo.dist, DEFAULT_DIST);
        let component = pick(env, ENV_COMPONENT, repo.component, DEFAULT_COMPONENT);
        validate_segment("distribution", &dist)?;
        validate_segment("component", &component)?;

        let architectures = match env.get(ENV_ARCHS) {
            Some(raw) => raw.split_whitespace().map(str::to_string).collect(),
            None => repo.architectures.unwrap_or_else(|| {
                DEFAULT_ARCHITECTURES.iter().map(|a| a.to_string()).collect()
            }),
        };
        let architectures = normalize_architectures(architectures)?;

        let origin = pick(env, ENV_ORIGIN, repo.origin, DEFAULT_ORIGIN);
        let label = pick(env, ENV_LABEL, repo.label, DEFAULT_LABEL);
        let description = pick(env, ENV_DESCRIPTION, repo.description, DEFAULT_DESCRIPTION);
        for (field, value) in [
            ("origin", &origin),
            ("label", &label),
            ("description", &description),
        ] {
            validate_single_line(field, value)?;
        }

        let signing_key = env
            .get(ENV_SIGNING_KEY)
            .map(str::to_string)
            .or(repo.signing_key.filter(|k| !k.trim().is_empty()));
        if let Some(key) = &signing_key {
            validate_token("signing key id", key)?;
        }

        let keep_versions = match env.get(ENV_KEEP_VERSIONS) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                PipelineError::configuration(format!(
                    "{ENV_KEEP_VERSIONS} must be a positive integer, got '{raw}'"
                ))
            })?),
            None => repo.keep_versions,
        };
        if keep_versions == Some(0) {
            return Err(PipelineError::configuration("keep_versions must be >= 1").into());
        }

        let config = Self {
            deb_dir,
            repo_dir,
            dist,
            component,
            architectures,
            origin,
            label,
            description,
            signing_key,
            keep_versions,
        };
        config.check_input_outside_outputs()?;
        Ok(config)
    }

    /// The pool and distribution directories are wiped at the start of a
    /// run, so the input directory must not live inside either.
    fn check_input_outside_outputs(&self) -> Result<()> {
        let input = resolve_existing_prefix(&self.deb_dir);
        for (what, output) in [("pool", self.pool_dir()), ("distribution", self.dist_dir())] {
            let output = resolve_existing_prefix(&output);
            if input.starts_with(&output) {
                return Err(PipelineError::configuration(format!(
                    "input directory '{}' lies inside the {what} directory '{}', \
                     which is rebuilt on every publish",
                    self.deb_dir.display(),
                    output.display()
                ))
                .into());
            }
        }
        Ok(())
    }

    pub fn pool_dir(&self) -> PathBuf {
        self.repo_dir.join("pool").join(&self.component)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.repo_dir.join("dists").join(&self.dist)
    }

    pub fn binary_dir(&self, arch: &str) -> PathBuf {
        self.dist_dir()
            .join(&self.component)
            .join(format!("binary-{arch}"))
    }
}

/// Project root for CLI invocations.
pub fn current_root() -> Result<PathBuf> {
    std::env::current_dir().context("resolving current directory")
}

/// Canonicalize the longest existing ancestor of `path` and append the rest.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => resolve_existing_prefix(parent).join(name),
        _ => path.to_path_buf(),
    }
}

fn pick(env: &Environment, key: &str, file_value: Option<String>, default: &str) -> String {
    env.get(key)
        .map(str::to_string)
        .or_else(|| file_value.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}

fn normalize_architectures(raw: Vec<String>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for arch in raw {
        let arch = arch.trim().to_string();
        if arch.is_empty() || out.contains(&arch) {
            continue;
        }
        validate_segment("architecture", &arch)?;
        out.push(arch);
    }
    if out.is_empty() {
        return Err(PipelineError::configuration("architecture list is empty").into());
    }
    Ok(out)
}

/// Debian package names: lowercase alphanumerics and `+-.`, at least two
/// characters, starting with an alphanumeric.
pub fn validate_package_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    let starts_alnum = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if name.len() < 2 || !valid_chars || !starts_alnum {
        return Err(PipelineError::configuration(format!(
            "invalid package name '{name}': use lowercase letters, digits, '+', '-' or '.', \
             starting with a letter or digit"
        ))
        .into());
    }
    Ok(())
}

pub fn validate_version(version: &str) -> Result<()> {
    let starts_digit = version.chars().next().is_some_and(|c| c.is_ascii_digit());
    if !starts_digit || version.chars().any(char::is_whitespace) || version.contains('/') {
        return Err(PipelineError::configuration(format!(
            "invalid version '{version}': must start with a digit and contain no whitespace or '/'"
        ))
        .into());
    }
    Ok(())
}

fn validate_token(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(PipelineError::configuration(format!(
            "{field} must be a single non-empty token, got '{value}'"
        ))
        .into());
    }
    Ok(())
}

fn validate_single_line(field: &str, value: &str) -> Result<()> {
    if value.contains('\n') || value.contains('\r') {
        return Err(
            PipelineError::configuration(format!("{field} must not contain line breaks")).into(),
        );
    }
    Ok(())
}

fn validate_segment(field: &str, value: &str) -> Result<()> {
    validate_token(field, value)?;
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        return Err(PipelineError::configuration(format!(
            "{field} must be a safe path segment, got '{value}'"
        ))
        .into());
    }
    Ok(())
}
