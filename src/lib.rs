//! Release tooling for Ankor Device Info.
//!
//! Two pipelines share this crate:
//!
//! - **Build** - stage the application into a Debian filesystem tree, render
//!   the control file and archive it with `dpkg-deb`
//! - **Publish** - lay built archives into an APT repository pool, generate
//!   per-architecture indices and a Release manifest, optionally signed
//!
//! # Architecture
//!
//! ```text
//! ankor-release (binary)
//!     │
//!     ├── config      resolves BuildConfig / PublishConfig once per run
//!     ├── preflight   checks host tools before any output is touched
//!     ├── build       staging tree, control rendering, dpkg-deb
//!     └── repo        pool, retention, indices, Release, signing
//!
//! process / workspace
//!     └── external tool invocation and rebuild-from-scratch directories
//! ```
//!
//! External programs run through [`ToolRunner`], so both pipelines can be
//! exercised against a fake host in tests.

pub mod build;
pub mod config;
pub mod error;
pub mod preflight;
pub mod process;
pub mod repo;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use build::{build_package, BuiltPackage};
pub use config::{BuildConfig, Environment, PublishConfig};
pub use error::{pipeline_error, PipelineError};
pub use process::{HostTools, ToolRunner};
pub use repo::{publish_repository, PublishSummary};
