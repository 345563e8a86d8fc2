//! Vendoring of Rust `.crate` archives.
//!
//! This crate expands `.crate` archives (gzip-compressed tarballs) into a
//! vendor directory and writes the `.cargo-checksum.json` manifest cargo
//! requires for source replacement. It backs the `crate-vendor` binary and
//! can be driven programmatically.
//!
//! # Modules
//!
//! - [`archive`] - Archive reading, extraction, hashing, and manifests
//! - [`cli`] - Command-line argument definitions
//! - [`error`] - Error taxonomy shared by every stage
//! - [`logging`] - Explicit log sink passed through the pipeline
//! - [`vendor`] - Per-archive state machine and batch orchestration

pub mod archive;
pub mod cli;
pub mod error;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod vendor;
