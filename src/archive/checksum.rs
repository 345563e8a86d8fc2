//! SHA-256 digests for archives and extracted files.
//!
//! Digests depend on file content only; metadata such as modification time
//! or permissions never contributes.

use crate::error::{Result, VendorError};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Read buffer size used while hashing.
const CHUNK_SIZE: usize = 8192;

/// A validated lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use crate_vendor::archive::checksum::Sha256Digest;
///
/// let digest = Sha256Digest::of_bytes(b"hello world");
/// assert_eq!(
///     digest.as_str(),
///     "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(bytes))
    }

    fn from_hasher(hasher: Sha256) -> Self {
        // sha2 lowercase hex output is always 64 valid characters.
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = VendorError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = VendorError;

    fn try_from(value: String) -> Result<Self> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl From<Sha256Digest> for String {
    fn from(digest: Sha256Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// The file is streamed in fixed-size chunks, so large archives are never
/// held in memory.
///
/// # Errors
///
/// Returns [`VendorError::Io`] naming `path` if the file cannot be opened or
/// read.
pub fn digest_file(path: &Utf8Path) -> Result<Sha256Digest> {
    let mut file = fs::File::open(path).map_err(|e| VendorError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| VendorError::io(path, e))?;
        let Some(chunk) = buffer.get(..bytes_read) else {
            break;
        };
        if chunk.is_empty() {
            break;
        }
        hasher.update(chunk);
    }
    Ok(Sha256Digest::from_hasher(hasher))
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(VendorError::InvalidDigest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    match value
        .chars()
        .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
    {
        Some(bad) => Err(VendorError::InvalidDigest {
            reason: format!("'{bad}' is not a lowercase hex digit"),
        }),
        None => Ok(()),
    }
}
