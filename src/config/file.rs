use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::PipelineError;

/// Optional project file read from the project root.
pub const CONFIG_FILE_NAME: &str = "packaging.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PackagingToml {
    #[serde(default)]
    pub(crate) package: PackageToml,
    #[serde(default)]
    pub(crate) assets: AssetsToml,
    #[serde(default)]
    pub(crate) repository: RepositoryToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PackageToml {
    pub(crate) name: Option<String>,
    pub(crate) architecture: Option<String>,
    pub(crate) maintainer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AssetsToml {
    pub(crate) entry_point: Option<String>,
    pub(crate) desktop_entry: Option<String>,
    pub(crate) icon: Option<String>,
    pub(crate) documentation: Option<String>,
    pub(crate) control_template: Option<String>,
    pub(crate) version_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RepositoryToml {
    pub(crate) deb_dir: Option<String>,
    pub(crate) repo_dir: Option<String>,
    pub(crate) dist: Option<String>,
    pub(crate) component: Option<String>,
    pub(crate) architectures: Option<Vec<String>>,
    pub(crate) origin: Option<String>,
    pub(crate) label: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) signing_key: Option<String>,
    pub(crate) keep_versions: Option<usize>,
}

/// Load `<root>/packaging.toml`, or defaults when it does not exist.
pub(crate) fn load_packaging_toml(root: &Path) -> Result<PackagingToml> {
    let path = root.join(CONFIG_FILE_NAME);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PackagingToml::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading '{}'", path.display()));
        }
    };

    toml::from_str::<PackagingToml>(&contents).map_err(|err| {
        anyhow::Error::from(PipelineError::configuration(format!(
            "invalid '{}': {}",
            path.display(),
            err
        )))
    })
}
