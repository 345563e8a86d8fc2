//! The `.cargo-checksum.json` manifest written beside each vendored crate.
//!
//! Cargo reads this file when building from a vendor directory, so the
//! filename and schema are fixed:
//!
//! ```json
//! {
//!   "files": {
//!     "src/lib.rs": "<sha256>"
//!   },
//!   "package": "<sha256 of the .crate file>"
//! }
//! ```
//!
//! Keys are sorted at both levels, indentation is two spaces, and the
//! document ends with a newline.

use super::checksum::{Sha256Digest, digest_file};
use super::path_safety::PackageRoot;
use crate::error::{Result, VendorError};
use crate::logging::LogSink;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

/// Fixed filename of the checksum manifest inside a package directory.
pub const MANIFEST_FILE_NAME: &str = ".cargo-checksum.json";

/// Return the manifest location for `package_dir`.
#[must_use]
pub fn manifest_path(package_dir: &Utf8Path) -> Utf8PathBuf {
    package_dir.join(MANIFEST_FILE_NAME)
}

/// Checksums for one vendored crate.
///
/// Field order matches the sorted key order of the serialised document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    files: BTreeMap<String, Sha256Digest>,
    package: Sha256Digest,
}

impl Manifest {
    /// Assemble a manifest from precomputed digests.
    #[must_use]
    pub const fn new(package: Sha256Digest, files: BTreeMap<String, Sha256Digest>) -> Self {
        Self { files, package }
    }

    /// Hash each extracted file and key it by its path inside the package.
    ///
    /// Files are read back from disk so the digests describe exactly what
    /// was written. A path listed twice yields one entry.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Io`] if a file cannot be read, or
    /// [`VendorError::EntryOutsidePackage`] if a path is not inside the
    /// package directory.
    pub fn from_extracted(
        root: &PackageRoot,
        package: Sha256Digest,
        extracted: &[Utf8PathBuf],
    ) -> Result<Self> {
        let mut files = BTreeMap::new();
        for path in extracted {
            let key = root.manifest_key(path)?;
            if files.contains_key(&key) {
                continue;
            }
            files.insert(key, digest_file(path)?);
        }
        Ok(Self::new(package, files))
    }

    /// Digest of the `.crate` archive itself.
    #[must_use]
    pub const fn package(&self) -> &Sha256Digest {
        &self.package
    }

    /// Digests of the regular files, keyed by package-relative path.
    #[must_use]
    pub const fn files(&self) -> &BTreeMap<String, Sha256Digest> {
        &self.files
    }

    /// Render the manifest document, including its trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Manifest`] if serialisation fails.
    pub fn to_json(&self, path: &Utf8Path) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).map_err(|e| VendorError::Manifest {
            path: path.to_owned(),
            source: e,
        })?;
        json.push('\n');
        Ok(json)
    }

    /// Write the manifest into `package_dir`, replacing any existing one.
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed into place, so readers never see a partial manifest.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Io`] if the file cannot be written and
    /// [`VendorError::Manifest`] if serialisation fails.
    pub fn write(&self, package_dir: &Utf8Path, log: &mut dyn LogSink) -> Result<Utf8PathBuf> {
        let path = manifest_path(package_dir);
        let json = self.to_json(&path)?;
        log.debug(&format!("checksum manifest for {path}"));
        log.debug(json.trim_end());

        let io_err = |e| VendorError::io(path.clone(), e);
        let mut temp = tempfile::NamedTempFile::new_in(package_dir).map_err(io_err)?;
        temp.write_all(json.as_bytes()).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(io_err)?;
        }
        temp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(path)
    }

    /// Read a manifest previously written to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Io`] if the file cannot be read and
    /// [`VendorError::Manifest`] if it is not a valid manifest document.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| VendorError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| VendorError::Manifest {
            path: path.to_owned(),
            source: e,
        })
    }
}
