//! Debian package assembly.
//!
//! - [`filesystem`] - Staging layout, file modes and installed-size accounting
//! - [`template`] - Control-file placeholder rendering
//! - [`package`] - The end-to-end build run

pub mod filesystem;
pub mod package;
pub mod template;

pub use package::{build_package, BuiltPackage};
