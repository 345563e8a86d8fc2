//! Per-archive vendoring state machine and batch orchestration.
//!
//! Each archive moves through [`VendorState`]: an existing package directory
//! is `Vendored` and is either skipped or, with `--force`, deleted and
//! re-expanded. Expansion extracts every entry, hashes the regular files, and
//! writes the checksum manifest last, so a manifest only ever describes a
//! complete tree.

use crate::archive::checksum::digest_file;
use crate::archive::extraction::extract_entries;
use crate::archive::manifest::Manifest;
use crate::archive::path_safety::PackageRoot;
use crate::archive::reader::ArchiveReader;
use crate::archive::{archive_stem, is_archive_name};
use crate::error::{Result, VendorError};
use crate::logging::LogSink;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

/// Runtime switches for a vendoring run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VendorOptions {
    /// Re-expand archives whose package directory already exists.
    pub force: bool,
    /// Keep going after an archive in a directory source fails.
    pub continue_on_error: bool,
}

/// Lifecycle of a single archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorState {
    /// No package directory exists yet.
    Unvendored,
    /// A package directory already exists.
    Vendored,
    /// The existing package directory has been deleted for re-expansion.
    ForceOverwrite,
    /// Extraction and manifest writing completed.
    Done,
    /// The archive was already vendored and left untouched.
    Skipped,
    /// Expansion failed; no manifest was left behind.
    Failed,
}

/// Decide the initial state of an archive from its package directory.
///
/// Anything at the package path counts as vendored, including a file or a
/// dangling symlink, so `--force` can clear it.
///
/// # Errors
///
/// Returns [`VendorError::Io`] if the package directory cannot be inspected.
pub fn initial_state(package_dir: &Utf8Path) -> Result<VendorState> {
    match fs::symlink_metadata(package_dir) {
        Ok(_) => Ok(VendorState::Vendored),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(VendorState::Unvendored),
        Err(e) => Err(VendorError::io(package_dir, e)),
    }
}

/// Tally of archive outcomes across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VendorSummary {
    /// Archives expanded (fresh or forced).
    pub expanded: usize,
    /// Archives skipped because they were already vendored.
    pub skipped: usize,
    /// Archives that failed while `continue_on_error` was set.
    pub failed: usize,
}

impl VendorSummary {
    fn record(&mut self, state: VendorState) {
        match state {
            VendorState::Done => self.expanded += 1,
            VendorState::Skipped => self.skipped += 1,
            VendorState::Failed => self.failed += 1,
            VendorState::Unvendored | VendorState::Vendored | VendorState::ForceOverwrite => {}
        }
    }
}

/// Vendor a single archive or every `*.crate` file in a directory.
///
/// # Errors
///
/// Returns [`VendorError::Usage`] if `vendor_root` is not an existing
/// directory or `source` is neither a file nor a directory. Without
/// `continue_on_error`, the first archive failure is returned as-is; with it,
/// failures are logged and reported together as
/// [`VendorError::BatchFailed`].
pub fn vendor_source(
    source: &Utf8Path,
    vendor_root: &Utf8Path,
    options: VendorOptions,
    log: &mut dyn LogSink,
) -> Result<VendorSummary> {
    if !vendor_root.is_dir() {
        return Err(VendorError::Usage {
            message: format!("VENDOR_DIR {vendor_root} must be existing directory"),
        });
    }

    let archives = if source.is_file() {
        vec![source.to_owned()]
    } else if source.is_dir() {
        find_archives(source)?
    } else {
        return Err(VendorError::Usage {
            message: format!("SOURCE {source} must be a single .crate or a directory of crates"),
        });
    };

    let mut summary = VendorSummary::default();
    for archive in &archives {
        match vendor_crate(archive, vendor_root, options, log) {
            Ok(state) => summary.record(state),
            Err(err) if options.continue_on_error => {
                log.error(&err.to_string());
                summary.record(VendorState::Failed);
            }
            Err(err) => return Err(err),
        }
    }

    log.debug(&format!(
        "expanded {}, skipped {}, failed {} crate(s)",
        summary.expanded, summary.skipped, summary.failed
    ));
    if summary.failed > 0 {
        return Err(VendorError::BatchFailed {
            failed: summary.failed,
        });
    }
    Ok(summary)
}

/// List the archives directly inside `dir`, sorted by file name.
///
/// Only regular files named `*.crate` are returned; hidden files and
/// subdirectories are ignored.
///
/// # Errors
///
/// Returns [`VendorError::Io`] if the directory cannot be read, or
/// [`VendorError::NonUtf8Path`] for an archive whose name is not UTF-8.
pub fn find_archives(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| VendorError::io(dir, e))? {
        let entry = entry.map_err(|e| VendorError::io(dir, e))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            let lossy = file_name.to_string_lossy();
            if is_archive_name(&lossy) {
                return Err(VendorError::NonUtf8Path {
                    path: entry.path().display().to_string(),
                });
            }
            continue;
        };
        let path = dir.join(name);
        if is_archive_name(name) && path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// Run one archive through the vendoring state machine.
///
/// Returns the final state, either [`VendorState::Done`] or
/// [`VendorState::Skipped`].
///
/// # Errors
///
/// Returns the error that moved the archive to [`VendorState::Failed`]. The
/// partially written package directory is removed first, so a failed archive
/// never looks vendored to a later run.
pub fn vendor_crate(
    archive: &Utf8Path,
    vendor_root: &Utf8Path,
    options: VendorOptions,
    log: &mut dyn LogSink,
) -> Result<VendorState> {
    let stem = archive_stem(archive).ok_or_else(|| VendorError::Usage {
        message: format!("cannot derive a package name from {archive}"),
    })?;
    let root = PackageRoot::new(archive, vendor_root, stem);

    let state = match initial_state(root.package_dir())? {
        VendorState::Vendored if !options.force => {
            log.debug(&format!("skipping existing crate {stem}"));
            return Ok(VendorState::Skipped);
        }
        VendorState::Vendored => {
            log.info(&format!("overwriting existing crate {stem}"));
            remove_package_dir(root.package_dir())?;
            VendorState::ForceOverwrite
        }
        other => {
            log.info(&format!("expanding crate {stem}"));
            other
        }
    };
    log.debug(&format!("{stem}: {state:?}"));

    match expand(&root, log) {
        Ok(()) => Ok(VendorState::Done),
        Err(err) => {
            discard_partial(&root, log);
            Err(err)
        }
    }
}

/// Extract, hash, and write the manifest for one archive.
fn expand(root: &PackageRoot, log: &mut dyn LogSink) -> Result<()> {
    let mut reader = ArchiveReader::open(root.archive())?;
    let package = digest_file(root.archive())?;

    fs::create_dir_all(root.package_dir()).map_err(|e| VendorError::io(root.package_dir(), e))?;
    let extracted = extract_entries(reader.entries()?, root, log)?;

    let manifest = Manifest::from_extracted(root, package, &extracted)?;
    manifest.write(root.package_dir(), log)?;
    Ok(())
}

fn remove_package_dir(package_dir: &Utf8Path) -> Result<()> {
    let metadata = fs::symlink_metadata(package_dir).map_err(|e| VendorError::io(package_dir, e))?;
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(package_dir)
    } else {
        fs::remove_file(package_dir)
    };
    removed.map_err(|e| VendorError::io(package_dir, e))
}

/// Remove whatever a failed expansion left in the package directory.
fn discard_partial(root: &PackageRoot, log: &mut dyn LogSink) {
    let package_dir = root.package_dir();
    if fs::symlink_metadata(package_dir).is_err() {
        return;
    }
    log.debug(&format!("removing partial package directory {package_dir}"));
    if let Err(err) = remove_package_dir(package_dir) {
        log.warn(&format!("failed to clean up after {}: {err}", root.archive()));
    }
}
