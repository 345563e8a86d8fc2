//! Shared sandbox for behaviour suites.
//!
//! A [`Sandbox`] owns a temporary directory holding a `crates/` directory of
//! fixture archives and a `vendor/` destination that may or may not exist.

use camino::Utf8PathBuf;
use crate_vendor::archive::manifest::{Manifest, manifest_path};
use crate_vendor::test_utils::{CrateFixture, utf8_tempdir, write_crate};
use std::collections::BTreeMap;
use std::fs;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Contents and modification time of every file under a directory, keyed by
/// relative path.
pub type TreeSnapshot = BTreeMap<Utf8PathBuf, (Vec<u8>, SystemTime)>;

/// Temporary source and vendor directories for one scenario.
pub struct Sandbox {
    _temp: TempDir,
    /// Directory holding fixture `.crate` files.
    pub crates: Utf8PathBuf,
    /// Destination directory; created by [`Sandbox::create_vendor`].
    pub vendor: Utf8PathBuf,
}

impl Sandbox {
    /// Create the sandbox with an empty crates directory and no vendor
    /// directory.
    pub fn new() -> Self {
        let (temp, root) = utf8_tempdir().expect("temp dir");
        let crates = root.join("crates");
        fs::create_dir(&crates).expect("create crates dir");
        Self {
            _temp: temp,
            crates,
            vendor: root.join("vendor"),
        }
    }

    /// Create the vendor directory.
    pub fn create_vendor(&self) {
        fs::create_dir_all(&self.vendor).expect("create vendor dir");
    }

    /// Path of the archive for `stem`.
    pub fn archive(&self, stem: &str) -> Utf8PathBuf {
        self.crates.join(format!("{stem}.crate"))
    }

    /// Path of the expanded package for `stem`.
    pub fn package_dir(&self, stem: &str) -> Utf8PathBuf {
        self.vendor.join(stem)
    }

    /// Write `<stem>.crate` holding `<stem>/<file>` for each of `files`.
    pub fn add_crate(&self, stem: &str, files: &[&str]) -> Utf8PathBuf {
        let names: Vec<String> = files.iter().map(|file| format!("{stem}/{file}")).collect();
        let entries: Vec<(&str, &str)> = names
            .iter()
            .zip(files)
            .map(|(name, file)| (name.as_str(), *file))
            .collect();
        write_crate(&self.archive(stem), &entries).expect("write crate")
    }

    /// Write `<stem>.crate` with a regular entry followed by `../<stem>.txt`.
    pub fn add_escaping_crate(&self, stem: &str) -> Utf8PathBuf {
        let mut fixture = CrateFixture::create(&self.archive(stem)).expect("create crate");
        fixture
            .file(&format!("{stem}/Cargo.toml"), b"[package]")
            .expect("append entry")
            .raw_file(&format!("../{stem}.txt"), b"escaped")
            .expect("append escaping entry");
        fixture.finish().expect("finish crate")
    }

    /// Write `<stem>.crate` containing bytes that are not gzip data.
    pub fn add_corrupt_crate(&self, stem: &str) -> Utf8PathBuf {
        let path = self.archive(stem);
        fs::write(&path, b"definitely not a tarball").expect("write corrupt crate");
        path
    }

    /// Copy `stem`'s archive from `other` into this sandbox with a different
    /// modification time.
    pub fn copy_crate_from(&self, other: &Self, stem: &str) -> Utf8PathBuf {
        let path = self.archive(stem);
        fs::copy(other.archive(stem), &path).expect("copy crate");
        let file = fs::File::options()
            .write(true)
            .open(&path)
            .expect("open copied crate");
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400))
            .expect("set crate mtime");
        path
    }

    /// Snapshot every file under the package directory for `stem`.
    pub fn snapshot_package(&self, stem: &str) -> TreeSnapshot {
        let root = self.package_dir(stem);
        let mut snapshot = TreeSnapshot::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in dir.read_dir_utf8().expect("read package dir") {
                let entry = entry.expect("dir entry");
                let path = entry.path().to_owned();
                let metadata = fs::symlink_metadata(&path).expect("metadata");
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                let relative = path.strip_prefix(&root).expect("inside package").to_owned();
                let contents = fs::read(&path).expect("read file");
                let modified = metadata.modified().expect("mtime");
                snapshot.insert(relative, (contents, modified));
            }
        }
        snapshot
    }

    /// Raw bytes of the manifest for `stem`.
    pub fn manifest_bytes(&self, stem: &str) -> Vec<u8> {
        fs::read(manifest_path(&self.package_dir(stem))).expect("read manifest")
    }

    /// Parsed manifest for `stem`.
    pub fn manifest(&self, stem: &str) -> Manifest {
        Manifest::load(&manifest_path(&self.package_dir(stem))).expect("load manifest")
    }
}
