//! Error types for the crate vendoring pipeline.
//!
//! Every variant names the path it concerns so that the single error line
//! logged by the CLI is enough to locate the offending archive or file.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while vendoring `.crate` archives.
#[derive(Debug, Error)]
pub enum VendorError {
    /// The command line named a source or vendor directory that cannot be used.
    #[error("{message}")]
    Usage {
        /// Human-readable description naming the offending argument.
        message: String,
    },

    /// The archive could not be opened or is not a gzip-compressed tarball.
    #[error("cannot read {path} as a gzip-compressed tar archive: {source}")]
    ArchiveFormat {
        /// Path to the archive.
        path: Utf8PathBuf,
        /// The underlying decoder or tar error.
        #[source]
        source: std::io::Error,
    },

    /// An archive entry is absolute or climbs out of the vendor directory.
    #[error("path traversal detected in {archive}: entry {entry}")]
    PathTraversal {
        /// Path to the archive holding the entry.
        archive: Utf8PathBuf,
        /// The offending entry name.
        entry: String,
    },

    /// An archive entry lies outside the directory named after the archive stem.
    #[error("entry {entry} in {archive} is outside the package directory {package_dir}")]
    EntryOutsidePackage {
        /// Path to the archive holding the entry.
        archive: Utf8PathBuf,
        /// The offending entry name.
        entry: String,
        /// The destination directory the entry was expected under.
        package_dir: Utf8PathBuf,
    },

    /// A path is not valid UTF-8 and cannot be recorded in the manifest.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the rejected path.
        path: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being read, written, or removed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The checksum manifest could not be serialised or parsed.
    #[error("invalid checksum manifest {path}: {source}")]
    Manifest {
        /// Path of the manifest file.
        path: Utf8PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A string is not a 64-character lowercase hex SHA-256 digest.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidDigest {
        /// Description of the validation failure.
        reason: String,
    },

    /// One or more archives failed while `--continue-on-error` was set.
    #[error("{failed} crate(s) failed to expand")]
    BatchFailed {
        /// Number of archives that failed.
        failed: usize,
    },
}

impl VendorError {
    /// Wrap an I/O error with the path it concerns.
    #[must_use]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using [`VendorError`].
pub type Result<T> = std::result::Result<T, VendorError>;
