//! Unpacking of `.crate` archive entries into the vendor directory.
//!
//! Every entry name is checked against the package root before anything is
//! written, guarding against zip-slip style escapes. The on-disk path is
//! checked too, so symlinks unpacked from the same archive cannot redirect
//! writes into another package.

use super::path_safety::PackageRoot;
use super::reader::{ArchiveEntries, ArchiveEntry, EntryKind};
use crate::error::{Result, VendorError};
use crate::logging::LogSink;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fs;
use std::io;

/// Unpack every entry from `entries` beneath the vendor root of `root`.
///
/// Entries keep their archive-relative paths and declared permission bits.
/// Returns the on-disk paths of the regular files left by the archive, in
/// the order they were first written. A path that a later entry replaces
/// with a non-regular entry is dropped; non-regular entries are unpacked but
/// not returned.
///
/// # Errors
///
/// Returns [`VendorError::PathTraversal`] or
/// [`VendorError::EntryOutsidePackage`] for entries (or hard link targets)
/// that would land outside the package directory,
/// [`VendorError::ArchiveFormat`] for corrupt archive data, and
/// [`VendorError::Io`] when writing an entry fails.
pub fn extract_entries(
    mut entries: ArchiveEntries<'_>,
    root: &PackageRoot,
    log: &mut dyn LogSink,
) -> Result<Vec<Utf8PathBuf>> {
    let mut regular_files = Vec::new();
    let mut written = HashSet::new();

    while let Some(mut entry) = entries.next_entry()? {
        let dest_path = root.resolve(entry.path())?;
        root.ensure_contained(entry.path(), &dest_path)?;
        check_hard_link(&entry, root)?;
        log.debug(&format!("extracting {}", entry.path()));

        clear_destination(&dest_path, entry.kind())?;
        let unpacked = entry
            .unpack_in(root.vendor_root())
            .map_err(|e| VendorError::io(dest_path.clone(), e))?;
        if !unpacked {
            return Err(VendorError::PathTraversal {
                archive: root.archive().to_owned(),
                entry: entry.path().to_string(),
            });
        }

        if entry.kind() == EntryKind::Regular {
            if written.insert(dest_path.clone()) {
                regular_files.push(dest_path);
            }
        } else if written.remove(&dest_path) {
            regular_files.retain(|path| path != &dest_path);
        }
    }

    Ok(regular_files)
}

/// A hard link may only point at a file of the same package.
fn check_hard_link(entry: &ArchiveEntry<'_>, root: &PackageRoot) -> Result<()> {
    if entry.kind() != EntryKind::HardLink {
        return Ok(());
    }
    let Some(target) = entry.link_name() else {
        return Ok(());
    };
    let target_path = root.resolve(target)?;
    root.ensure_contained(target, &target_path)
}

/// Remove what an earlier entry left at `dest` so it is replaced, never
/// written through. Existing directories are kept for directory entries.
fn clear_destination(dest: &Utf8Path, kind: EntryKind) -> Result<()> {
    match fs::symlink_metadata(dest) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(metadata) if metadata.file_type().is_symlink() || kind != EntryKind::Directory => {
            fs::remove_file(dest).map_err(|e| VendorError::io(dest, e))
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VendorError::io(dest, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::reader::ArchiveReader;
    use crate::logging::StreamLogger;
    use crate::test_utils::{CrateFixture, utf8_tempdir};
    use log::LevelFilter;
    use rstest::rstest;
    use std::fs;

    struct Fixture {
        _temp: tempfile::TempDir,
        archive: Utf8PathBuf,
        vendor: Utf8PathBuf,
    }

    /// Build `pkg-0.1.0.crate` whose entries are appended by `fill`.
    fn fixture(fill: impl FnOnce(&mut CrateFixture)) -> Fixture {
        let (temp, dir) = utf8_tempdir().expect("temp dir");
        let vendor = dir.join("vendor");
        fs::create_dir(&vendor).expect("create vendor");

        let mut builder = CrateFixture::create(&dir.join("pkg-0.1.0.crate")).expect("create");
        fill(&mut builder);
        let archive = builder.finish().expect("finish archive");

        Fixture {
            _temp: temp,
            archive,
            vendor,
        }
    }

    fn run(fixture: &Fixture) -> Result<Vec<Utf8PathBuf>> {
        let root = PackageRoot::new(&fixture.archive, &fixture.vendor, "pkg-0.1.0");
        let mut reader = ArchiveReader::open(&fixture.archive).expect("open archive");
        let mut log = StreamLogger::new(Vec::new(), LevelFilter::Off);
        extract_entries(reader.entries().expect("entries"), &root, &mut log)
    }

    #[test]
    fn extracts_regular_files_under_package_dir() {
        let fixture = fixture(|b| {
            b.file("pkg-0.1.0/Cargo.toml", b"[package]")
                .expect("append")
                .file("pkg-0.1.0/src/lib.rs", b"pub fn f() {}")
                .expect("append");
        });

        let files = run(&fixture).expect("extract");
        let package_dir = fixture.vendor.join("pkg-0.1.0");
        assert_eq!(
            files,
            vec![package_dir.join("Cargo.toml"), package_dir.join("src/lib.rs")]
        );
        assert_eq!(
            fs::read_to_string(package_dir.join("src/lib.rs")).expect("read lib.rs"),
            "pub fn f() {}"
        );
    }

    #[test]
    fn directories_and_symlinks_are_created_but_not_reported() {
        let fixture = fixture(|b| {
            b.dir("pkg-0.1.0/empty/")
                .expect("append dir")
                .file("pkg-0.1.0/Cargo.toml", b"[package]")
                .expect("append file")
                .symlink("pkg-0.1.0/Cargo.toml.orig", "Cargo.toml")
                .expect("append link");
        });

        let files = run(&fixture).expect("extract");
        let package_dir = fixture.vendor.join("pkg-0.1.0");
        assert_eq!(files, vec![package_dir.join("Cargo.toml")]);
        assert!(package_dir.join("empty").is_dir());
        assert!(
            fs::symlink_metadata(package_dir.join("Cargo.toml.orig"))
                .expect("symlink metadata")
                .file_type()
                .is_symlink()
        );
    }

    #[cfg(unix)]
    #[test]
    fn preserves_declared_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = fixture(|b| {
            b.file_with_mode("pkg-0.1.0/build.sh", b"#!/bin/sh\n", 0o755)
                .expect("append");
        });

        run(&fixture).expect("extract");
        let mode = fs::metadata(fixture.vendor.join("pkg-0.1.0/build.sh"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("pkg-0.1.0/../../escape.txt")]
    #[case::absolute("/tmp/escape.txt")]
    fn rejects_traversal_before_writing(#[case] name: &str) {
        let fixture = fixture(|b| {
            b.raw_file(name, b"x").expect("append raw entry");
        });

        let result = run(&fixture);
        assert!(
            matches!(result, Err(VendorError::PathTraversal { .. })),
            "expected PathTraversal for {name}"
        );
        let parent = fixture.vendor.parent().expect("vendor has parent");
        assert!(!parent.join("escape.txt").exists());
        assert!(!fixture.vendor.join("pkg-0.1.0").exists());
    }

    #[test]
    fn rejects_entries_for_another_package() {
        let fixture = fixture(|b| {
            b.file("other-9.9.9/Cargo.toml", b"[package]").expect("append");
        });

        let result = run(&fixture);
        assert!(matches!(result, Err(VendorError::EntryOutsidePackage { .. })));
        assert!(!fixture.vendor.join("other-9.9.9").exists());
    }

    /// Create `vendor/victim-1.0.0/Cargo.toml` next to the package.
    fn vendored_victim(fixture: &Fixture) -> Utf8PathBuf {
        let victim = fixture.vendor.join("victim-1.0.0");
        fs::create_dir(&victim).expect("create victim");
        let manifest = victim.join("Cargo.toml");
        fs::write(&manifest, "[package]\nname = \"victim\"\n").expect("write victim");
        manifest
    }

    #[cfg(unix)]
    #[rstest]
    #[case::vendor_parent("../..")]
    #[case::sibling_package("../victim-1.0.0")]
    fn refuses_to_write_through_escaping_symlink(#[case] target: &str) {
        let fixture = fixture(|b| {
            b.symlink("pkg-0.1.0/out", target)
                .expect("append link")
                .file("pkg-0.1.0/out/Cargo.toml", b"overwritten")
                .expect("append file");
        });
        let victim = vendored_victim(&fixture);

        let result = run(&fixture);
        assert!(
            matches!(result, Err(VendorError::EntryOutsidePackage { .. })),
            "expected EntryOutsidePackage, got {result:?}"
        );
        let parent = fixture.vendor.parent().expect("vendor has parent");
        assert!(!parent.join("Cargo.toml").exists());
        assert_eq!(
            fs::read_to_string(&victim).expect("read victim"),
            "[package]\nname = \"victim\"\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn file_replaces_symlink_instead_of_following_it() {
        let fixture = fixture(|b| {
            b.symlink("pkg-0.1.0/Cargo.toml", "../victim-1.0.0/Cargo.toml")
                .expect("append link")
                .file("pkg-0.1.0/Cargo.toml", b"[package]")
                .expect("append file");
        });
        let victim = vendored_victim(&fixture);

        let files = run(&fixture).expect("extract");
        let own = fixture.vendor.join("pkg-0.1.0/Cargo.toml");
        assert_eq!(files, vec![own.clone()]);
        assert!(fs::symlink_metadata(&own).expect("metadata").is_file());
        assert_eq!(fs::read_to_string(&own).expect("read own"), "[package]");
        assert_eq!(
            fs::read_to_string(&victim).expect("read victim"),
            "[package]\nname = \"victim\"\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_replacing_file_drops_it_from_results() {
        let fixture = fixture(|b| {
            b.file("pkg-0.1.0/Cargo.toml", b"[package]")
                .expect("append manifest")
                .file("pkg-0.1.0/a", b"first")
                .expect("append file")
                .symlink("pkg-0.1.0/a", "Cargo.toml")
                .expect("append link");
        });

        let files = run(&fixture).expect("extract");
        let package_dir = fixture.vendor.join("pkg-0.1.0");
        assert_eq!(files, vec![package_dir.join("Cargo.toml")]);
        assert!(
            fs::symlink_metadata(package_dir.join("a"))
                .expect("metadata")
                .file_type()
                .is_symlink()
        );
    }

    #[test]
    fn repeated_file_is_reported_once() {
        let fixture = fixture(|b| {
            b.file("pkg-0.1.0/a", b"first")
                .expect("append")
                .file("pkg-0.1.0/a", b"second")
                .expect("append again");
        });

        let files = run(&fixture).expect("extract");
        let path = fixture.vendor.join("pkg-0.1.0/a");
        assert_eq!(files, vec![path.clone()]);
        assert_eq!(fs::read_to_string(path).expect("read"), "second");
    }

    #[rstest]
    #[case::other_package("victim-1.0.0/Cargo.toml")]
    #[case::parent_dir("pkg-0.1.0/../victim-1.0.0/Cargo.toml")]
    fn rejects_hard_links_out_of_package(#[case] target: &str) {
        let fixture = fixture(|b| {
            b.hard_link("pkg-0.1.0/stolen", target).expect("append hard link");
        });
        vendored_victim(&fixture);

        let result = run(&fixture);
        assert!(
            matches!(
                result,
                Err(VendorError::EntryOutsidePackage { .. } | VendorError::PathTraversal { .. })
            ),
            "expected a containment error, got {result:?}"
        );
        assert!(!fixture.vendor.join("pkg-0.1.0/stolen").exists());
    }

    #[test]
    fn hard_links_within_package_are_unpacked_but_not_reported() {
        let fixture = fixture(|b| {
            b.file("pkg-0.1.0/Cargo.toml", b"[package]")
                .expect("append file")
                .hard_link("pkg-0.1.0/Cargo.toml.orig", "pkg-0.1.0/Cargo.toml")
                .expect("append hard link");
        });

        let files = run(&fixture).expect("extract");
        let package_dir = fixture.vendor.join("pkg-0.1.0");
        assert_eq!(files, vec![package_dir.join("Cargo.toml")]);
        assert_eq!(
            fs::read_to_string(package_dir.join("Cargo.toml.orig")).expect("read link"),
            "[package]"
        );
    }
}
