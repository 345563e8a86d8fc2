//! Shared test utilities for building `.crate` fixtures.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration test suites.

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io;
use tempfile::TempDir;

/// Create a temporary directory and return it with its UTF-8 path.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or its path is not
/// valid UTF-8.
pub fn utf8_tempdir() -> io::Result<(TempDir, Utf8PathBuf)> {
    let temp = tempfile::tempdir()?;
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok((temp, path))
}

/// Incremental builder for a gzip-compressed tar archive.
pub struct CrateFixture {
    path: Utf8PathBuf,
    builder: tar::Builder<GzEncoder<File>>,
}

impl CrateFixture {
    /// Start a new archive at `path`, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Utf8Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_owned(),
            builder: tar::Builder::new(GzEncoder::new(file, Compression::default())),
        })
    }

    /// Append a regular file with mode `0o644`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn file(&mut self, name: &str, contents: &[u8]) -> io::Result<&mut Self> {
        self.file_with_mode(name, contents, 0o644)
    }

    /// Append a regular file with explicit permission bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn file_with_mode(
        &mut self,
        name: &str,
        contents: &[u8],
        mode: u32,
    ) -> io::Result<&mut Self> {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(mode);
        header.set_mtime(0);
        self.builder.append_data(&mut header, name, contents)?;
        Ok(self)
    }

    /// Append a directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn dir(&mut self, name: &str) -> io::Result<&mut Self> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(0);
        self.builder.append_data(&mut header, name, io::empty())?;
        Ok(self)
    }

    /// Append a symbolic link pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn symlink(&mut self, name: &str, target: &str) -> io::Result<&mut Self> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_mtime(0);
        self.builder.append_link(&mut header, name, target)?;
        Ok(self)
    }

    /// Append a hard link to the earlier entry `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn hard_link(&mut self, name: &str, target: &str) -> io::Result<&mut Self> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Link);
        header.set_size(0);
        header.set_mode(0o644);
        header.set_mtime(0);
        self.builder.append_link(&mut header, name, target)?;
        Ok(self)
    }

    /// Append a regular file whose name is stored verbatim.
    ///
    /// `tar::Builder` refuses names containing `..` or a leading `/`; this
    /// writes the header bytes directly so hostile archives can be built.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` does not fit the 100-byte name field or the
    /// entry cannot be written.
    pub fn raw_file(&mut self, name: &str, contents: &[u8]) -> io::Result<&mut Self> {
        let mut header = tar::Header::new_old();
        let name_field = header
            .as_old_mut()
            .name
            .get_mut(..name.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "entry name too long"))?;
        name_field.copy_from_slice(name.as_bytes());
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder.append(&header, contents)?;
        Ok(self)
    }

    /// Finish both the tar and gzip layers and return the archive path.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be flushed to disk.
    pub fn finish(self) -> io::Result<Utf8PathBuf> {
        self.builder.into_inner()?.finish()?;
        Ok(self.path)
    }
}

/// Write an archive at `path` containing the given regular files.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn write_crate(path: &Utf8Path, files: &[(&str, &str)]) -> io::Result<Utf8PathBuf> {
    let mut fixture = CrateFixture::create(path)?;
    for (name, contents) in files {
        fixture.file(name, contents.as_bytes())?;
    }
    fixture.finish()
}
