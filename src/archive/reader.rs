//! Forward-only reader for gzip-compressed tar archives.
//!
//! [`ArchiveReader::entries`] yields entries lazily in archive order. The
//! underlying stream cannot be rewound, so a second pass means opening the
//! archive again.

use crate::error::{Result, VendorError};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};

type TarStream = GzDecoder<File>;

/// Classification of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file; the only kind recorded in the checksum manifest.
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
    /// A hard link to an earlier entry.
    HardLink,
    /// Device nodes, FIFOs and any other entry type.
    Other,
}

impl EntryKind {
    fn of(entry_type: tar::EntryType) -> Self {
        if entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse() {
            Self::Regular
        } else if entry_type.is_dir() {
            Self::Directory
        } else if entry_type.is_symlink() {
            Self::Symlink
        } else if entry_type.is_hard_link() {
            Self::HardLink
        } else {
            Self::Other
        }
    }
}

/// Whether an entry only carries tar bookkeeping (PAX or GNU long-name data).
fn is_metadata(entry_type: tar::EntryType) -> bool {
    entry_type.is_pax_global_extensions()
        || entry_type.is_pax_local_extensions()
        || entry_type.is_gnu_longname()
        || entry_type.is_gnu_longlink()
}

/// An opened `.crate` archive.
pub struct ArchiveReader {
    path: Utf8PathBuf,
    archive: tar::Archive<TarStream>,
}

impl ArchiveReader {
    /// Open `path` as a gzip-compressed tar archive.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::ArchiveFormat`] if the file cannot be opened.
    /// A file that opens but is not gzip-compressed tar data is reported by
    /// the first call to [`ArchiveEntries::next_entry`].
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| format_error(path, e))?;
        Ok(Self {
            path: path.to_owned(),
            archive: tar::Archive::new(GzDecoder::new(file)),
        })
    }

    /// Path of the archive on disk.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Start the single pass over the archive's entries.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::ArchiveFormat`] if the archive has already been
    /// read.
    pub fn entries(&mut self) -> Result<ArchiveEntries<'_>> {
        let inner = self
            .archive
            .entries()
            .map_err(|e| format_error(&self.path, e))?;
        Ok(ArchiveEntries {
            path: &self.path,
            inner,
        })
    }
}

/// Lazy sequence of entries from an [`ArchiveReader`].
pub struct ArchiveEntries<'a> {
    path: &'a Utf8Path,
    inner: tar::Entries<'a, TarStream>,
}

impl<'a> ArchiveEntries<'a> {
    /// Advance to the next entry, or `None` once the archive is exhausted.
    ///
    /// PAX extension headers and GNU long-name records are applied to the
    /// entry they describe and never surface on their own.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::ArchiveFormat`] for corrupt or truncated data
    /// and [`VendorError::NonUtf8Path`] for entry names that are not UTF-8.
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry<'a>>> {
        loop {
            let Some(next) = self.inner.next() else {
                return Ok(None);
            };
            let inner = next.map_err(|e| format_error(self.path, e))?;
            let entry_type = inner.header().entry_type();
            if is_metadata(entry_type) {
                continue;
            }

            let raw_path = inner.path().map_err(|e| format_error(self.path, e))?;
            let path = utf8_path(raw_path.into_owned())?;
            let link_name = inner
                .link_name()
                .map_err(|e| format_error(self.path, e))?
                .map(|name| utf8_path(name.into_owned()))
                .transpose()?;

            return Ok(Some(ArchiveEntry {
                path,
                link_name,
                kind: EntryKind::of(entry_type),
                inner,
            }));
        }
    }
}

impl<'a> Iterator for ArchiveEntries<'a> {
    type Item = Result<ArchiveEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// A single entry read from the archive.
pub struct ArchiveEntry<'a> {
    path: Utf8PathBuf,
    link_name: Option<Utf8PathBuf>,
    kind: EntryKind,
    inner: tar::Entry<'a, TarStream>,
}

impl ArchiveEntry<'_> {
    /// The entry name as recorded in the archive.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Target recorded for symlink and hard link entries.
    ///
    /// Hard link targets are archive paths; symlink targets are relative to
    /// the link's own directory.
    #[must_use]
    pub fn link_name(&self) -> Option<&Utf8Path> {
        self.link_name.as_deref()
    }

    /// The entry's type.
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Unpack the entry beneath `root`, creating parent directories.
    ///
    /// Returns `false` if `tar` skipped the entry because its name escapes
    /// `root`. Escaping through an already-unpacked symlink is an error.
    pub(crate) fn unpack_in(&mut self, root: &Utf8Path) -> io::Result<bool> {
        self.inner.unpack_in(root)
    }
}

impl Read for ArchiveEntry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

fn utf8_path(path: std::path::PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| VendorError::NonUtf8Path {
        path: e.into_path_buf().display().to_string(),
    })
}

fn format_error(path: &Utf8Path, source: io::Error) -> VendorError {
    VendorError::ArchiveFormat {
        path: path.to_owned(),
        source,
    }
}
