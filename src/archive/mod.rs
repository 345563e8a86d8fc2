//! Reading, unpacking, and checksumming `.crate` archives.
//!
//! # Sub-modules
//!
//! - [`checksum`]: SHA-256 digest newtype and file hashing.
//! - [`extraction`]: Entry unpacking with path traversal protection.
//! - [`manifest`]: The `.cargo-checksum.json` document.
//! - [`path_safety`]: Containment of entry paths within the package directory.
//! - [`reader`]: Forward-only iteration over gzip-compressed tar entries.

pub mod checksum;
pub mod extraction;
pub mod manifest;
pub mod path_safety;
pub mod reader;

use camino::Utf8Path;

/// File extension recognised when scanning a directory for archives.
pub const ARCHIVE_EXTENSION: &str = "crate";

/// Return the archive's file name without its final extension.
///
/// The stem names the package directory under the vendor root.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use crate_vendor::archive::archive_stem;
///
/// assert_eq!(archive_stem(Utf8Path::new("crates/foo-1.0.0.crate")), Some("foo-1.0.0"));
/// ```
#[must_use]
pub fn archive_stem(archive: &Utf8Path) -> Option<&str> {
    archive.file_stem().filter(|stem| !stem.is_empty())
}

/// Whether a directory entry named `file_name` should be treated as an archive.
///
/// Hidden files are ignored, matching shell glob semantics for `*.crate`.
#[must_use]
pub fn is_archive_name(file_name: &str) -> bool {
    !file_name.starts_with('.')
        && Utf8Path::new(file_name).extension() == Some(ARCHIVE_EXTENSION)
}
