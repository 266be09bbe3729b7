//! Error taxonomy shared by both pipelines.
//!
//! Pipeline functions return [`anyhow::Result`] with a [`PipelineError`] at
//! the root of the chain, so callers can add context freely and still
//! recover the category with `downcast_ref::<PipelineError>()`.

use std::path::PathBuf;

/// Every failure is fatal to the current invocation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required input could not be resolved or is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One or more host tools are not on `PATH`.
    #[error("missing required host tools:\n{}", format_missing(.tools))]
    MissingDependency {
        /// `(command, debian package)` pairs.
        tools: Vec<(String, String)>,
    },

    /// The input directory holds no archives.
    #[error("no .deb archives found in {}", .dir.display())]
    NoArtifacts { dir: PathBuf },

    /// A source file or directory the pipeline reads is absent.
    #[error("missing {what}: {}", .path.display())]
    AssetMissing { what: String, path: PathBuf },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed ({status}): {message}")]
    ExternalTool {
        tool: String,
        status: String,
        message: String,
    },

    /// The encoded package indices disagree with the plain index.
    #[error("index encoding failed for binary-{arch}: {detail}")]
    IndexEncoding { arch: String, detail: String },

    /// A signing step failed; no signature file was committed.
    #[error("signing aborted at {step}; no signature files were written: {detail}")]
    SigningInconsistency { step: String, detail: String },
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn asset_missing(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::AssetMissing {
            what: what.into(),
            path: path.into(),
        }
    }
}

fn format_missing(tools: &[(String, String)]) -> String {
    tools
        .iter()
        .map(|(t, p)| format!("  {} (install: {})", t, p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Category of the root cause of `err`, if it came from this crate.
pub fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
}
