//! Static APT repository publishing.
//!
//! - [`pool`] - Input scanning and the content pool
//! - [`retention`] - Optional per-package version limits
//! - [`index`] - `Packages` generation in plain, gzip and xz encodings
//! - [`release`] - `Release` manifest and its signatures
//! - [`publish`] - The end-to-end publish run
//!
//! Produced layout:
//!
//! ```text
//! <repo>/pool/<component>/*.deb
//! <repo>/dists/<dist>/<component>/binary-<arch>/Packages{,.gz,.xz}
//! <repo>/dists/<dist>/Release
//! <repo>/dists/<dist>/Release.gpg   (signed only)
//! <repo>/dists/<dist>/InRelease     (signed only)
//! ```

pub mod index;
pub mod pool;
pub mod publish;
pub mod release;
pub mod retention;

pub use publish::{publish_repository, PublishSummary};
