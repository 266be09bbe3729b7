//! Preflight checks for release runs.
//!
//! Validates that the host system has the required tools before any
//! directory is touched, so a missing `xz` does not surface halfway through
//! a publish.
//!
//! # Example
//!
//! ```rust,ignore
//! use ankor_release::preflight::{check_required_tools, BUILD_TOOLS};
//! use ankor_release::process::HostTools;
//!
//! if let Err(e) = check_required_tools(&HostTools, BUILD_TOOLS) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::Result;

use crate::error::PipelineError;
use crate::process::ToolRunner;

/// Host tools needed to build a package.
///
/// Each tuple is (command_name, package_name).
pub const BUILD_TOOLS: &[(&str, &str)] = &[("dpkg-deb", "dpkg")];

/// Host tools needed to publish a repository.
pub const PUBLISH_TOOLS: &[(&str, &str)] = &[
    ("dpkg-scanpackages", "dpkg-dev"),
    ("apt-ftparchive", "apt-utils"),
    ("gzip", "gzip"),
    ("xz", "xz-utils"),
];

/// Additional tool needed when a signing key is configured.
pub const SIGNING_TOOLS: &[(&str, &str)] = &[("gpg", "gnupg")];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with [`PipelineError::MissingDependency`] listing every missing
///   tool and its package
pub fn check_required_tools(tools: &dyn ToolRunner, required: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in required {
        if !tools.is_available(tool) {
            missing.push((tool.to_string(), package.to_string()));
        }
    }

    if !missing.is_empty() {
        return Err(PipelineError::MissingDependency { tools: missing }.into());
    }

    Ok(())
}

/// Check the tools a publish run needs, including `gpg` when signing.
pub fn check_publish_tools(tools: &dyn ToolRunner, signing: bool) -> Result<()> {
    let mut required = PUBLISH_TOOLS.to_vec();
    if signing {
        required.extend_from_slice(SIGNING_TOOLS);
    }
    check_required_tools(tools, &required)
}
