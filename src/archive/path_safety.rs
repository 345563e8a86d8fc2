//! Containment checks for archive entry paths.
//!
//! Both the extractor and the manifest writer go through [`PackageRoot`], so
//! the rule "every entry lands inside `<vendor_root>/<stem>`" is enforced in
//! one place. [`PackageRoot::resolve`] checks the entry name;
//! [`PackageRoot::ensure_contained`] checks what is already on disk, so a
//! symlink unpacked earlier cannot redirect a later write into another
//! package.

use crate::error::{Result, VendorError};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

/// The destination of one archive: the vendor root plus the package directory
/// named after the archive stem.
#[derive(Debug, Clone)]
pub struct PackageRoot {
    archive: Utf8PathBuf,
    vendor_root: Utf8PathBuf,
    stem: String,
    package_dir: Utf8PathBuf,
}

impl PackageRoot {
    /// Describe where `archive` expands to under `vendor_root`.
    #[must_use]
    pub fn new(archive: &Utf8Path, vendor_root: &Utf8Path, stem: &str) -> Self {
        Self {
            archive: archive.to_owned(),
            vendor_root: vendor_root.to_owned(),
            stem: stem.to_owned(),
            package_dir: vendor_root.join(stem),
        }
    }

    /// Path of the archive being expanded.
    #[must_use]
    pub fn archive(&self) -> &Utf8Path {
        &self.archive
    }

    /// Root directory that all archive entries are unpacked relative to.
    #[must_use]
    pub fn vendor_root(&self) -> &Utf8Path {
        &self.vendor_root
    }

    /// The `<vendor_root>/<stem>` directory owned by this archive.
    #[must_use]
    pub fn package_dir(&self) -> &Utf8Path {
        &self.package_dir
    }

    /// Resolve an archive entry name to its on-disk destination.
    ///
    /// `.` components are dropped. The result always lies inside
    /// [`Self::package_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::PathTraversal`] for absolute names and names
    /// containing `..`, and [`VendorError::EntryOutsidePackage`] for names
    /// that do not start with the package directory.
    pub fn resolve(&self, entry: &Utf8Path) -> Result<Utf8PathBuf> {
        let mut relative = Utf8PathBuf::new();
        for component in entry.components() {
            match component {
                Utf8Component::Normal(part) => relative.push(part),
                Utf8Component::CurDir => {}
                Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                    return Err(VendorError::PathTraversal {
                        archive: self.archive.clone(),
                        entry: entry.to_string(),
                    });
                }
            }
        }

        let resolved = self.vendor_root.join(relative);
        if !resolved.starts_with(&self.package_dir) {
            return Err(self.outside(entry));
        }
        Ok(resolved)
    }

    /// Check that writing `dest` cannot leave the package directory.
    ///
    /// `dest` must come from [`Self::resolve`]. The nearest existing ancestor
    /// of `dest` inside the package directory is resolved through any
    /// symlinks and must still lie under `<vendor_root>/<stem>`. Ancestors
    /// that do not exist yet are created as plain directories by the
    /// unpacker, so they need no check.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::EntryOutsidePackage`] if an existing ancestor
    /// resolves elsewhere (including a dangling symlink), and
    /// [`VendorError::Io`] if the filesystem cannot be inspected.
    pub fn ensure_contained(&self, entry: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        let mut current = dest.parent();
        while let Some(dir) = current {
            if !dir.starts_with(&self.package_dir) {
                break;
            }
            match fs::symlink_metadata(dir) {
                Ok(_) => {
                    let real_package = self.real_package_dir()?;
                    return match dir.canonicalize_utf8() {
                        Ok(real) if real.starts_with(&real_package) => Ok(()),
                        Ok(_) => Err(self.outside(entry)),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(self.outside(entry)),
                        Err(e) => Err(VendorError::io(dir, e)),
                    };
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => current = dir.parent(),
                Err(e) => return Err(VendorError::io(dir, e)),
            }
        }
        Ok(())
    }

    /// `<vendor_root>/<stem>` with the vendor root resolved but the package
    /// directory itself taken literally, so a package directory that is a
    /// symlink never matches.
    fn real_package_dir(&self) -> Result<Utf8PathBuf> {
        let vendor_root = self
            .vendor_root
            .canonicalize_utf8()
            .map_err(|e| VendorError::io(&self.vendor_root, e))?;
        Ok(vendor_root.join(&self.stem))
    }

    fn outside(&self, entry: &Utf8Path) -> VendorError {
        VendorError::EntryOutsidePackage {
            archive: self.archive.clone(),
            entry: entry.to_string(),
            package_dir: self.package_dir.clone(),
        }
    }

    /// Render a destination path as a manifest key.
    ///
    /// Keys are relative to [`Self::package_dir`] and always use `/`
    /// separators, whatever the host platform.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::EntryOutsidePackage`] if `path` is not inside
    /// the package directory.
    pub fn manifest_key(&self, path: &Utf8Path) -> Result<String> {
        let relative = path
            .strip_prefix(&self.package_dir)
            .map_err(|_| self.outside(path))?;
        let parts: Vec<&str> = relative.components().map(|c| c.as_str()).collect();
        Ok(parts.join("/"))
    }
}
