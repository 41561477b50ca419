//! Checksum utilities for Strata
//!
//! Provides file digests and the [`HashEntry`] value recorded in checksum
//! ledgers. Digests are always recomputed from the current file bytes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Digest algorithm used for ledger entries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Algorithm name as used in ledger file names and configuration
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of a hex-encoded digest
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Conventional ledger file name (`.sha256sums` etc.)
    #[must_use]
    pub const fn default_ledger_name(self) -> &'static str {
        match self {
            Self::Sha1 => ".sha1sums",
            Self::Sha256 => ".sha256sums",
            Self::Sha512 => ".sha512sums",
        }
    }

    /// Hex digest of a byte slice
    #[must_use]
    pub fn hex_digest(self, data: &[u8]) -> String {
        match self {
            Self::Sha1 => hex::encode(sha1::Sha1::digest(data)),
            Self::Sha256 => hex::encode(sha2::Sha256::digest(data)),
            Self::Sha512 => hex::encode(sha2::Sha512::digest(data)),
        }
    }

    /// Check that `token` looks like a digest produced by this algorithm
    #[must_use]
    pub fn is_valid_digest(self, token: &str) -> bool {
        token.len() == self.hex_len()
            && token
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(Error::Configuration(format!(
                "unsupported hash algorithm: {other}"
            ))),
        }
    }
}

/// Normalize CRLF and lone CR line endings to LF
fn normalize_newlines(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\r' {
            if bytes.peek() == Some(&b'\n') {
                bytes.next();
            }
            out.push(b'\n');
        } else {
            out.push(b);
        }
    }
    out
}

/// Compute the hex digest of a file's current content
///
/// Binary mode hashes the raw bytes. Text mode hashes the content with
/// line endings normalized to `\n`.
pub fn digest_file(path: &Path, algorithm: HashAlgorithm, binary: bool) -> Result<String> {
    let data = std::fs::read(path).map_err(|e| Error::io_at(path, e))?;
    if binary {
        Ok(algorithm.hex_digest(&data))
    } else {
        Ok(algorithm.hex_digest(&normalize_newlines(&data)))
    }
}

/// A single checksum record: `<digest> <flag><path>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashEntry {
    /// File the digest was computed for
    pub path: PathBuf,
    /// Algorithm that produced the digest
    pub algorithm: HashAlgorithm,
    /// Lower-case hex digest
    pub digest: String,
    /// Whether the file was hashed as raw bytes (`*`) or as text (` `)
    pub binary: bool,
}

impl HashEntry {
    /// Create an entry from already-known parts
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        algorithm: HashAlgorithm,
        digest: impl Into<String>,
        binary: bool,
    ) -> Self {
        Self {
            path: path.into(),
            algorithm,
            digest: digest.into(),
            binary,
        }
    }

    /// Hash a file's current content
    pub fn compute(path: &Path, algorithm: HashAlgorithm, binary: bool) -> Result<Self> {
        let digest = digest_file(path, algorithm, binary)?;
        Ok(Self::new(path, algorithm, digest, binary))
    }

    /// Mode flag written between the digest and the path
    #[must_use]
    pub const fn mode_flag(&self) -> char {
        if self.binary { '*' } else { ' ' }
    }

    /// Recompute the digest of the file with this entry's algorithm and mode
    pub fn current_digest(&self) -> Result<String> {
        digest_file(&self.path, self.algorithm, self.binary)
    }

    /// Check whether the file still matches the recorded digest
    pub fn verify(&self) -> Result<bool> {
        Ok(self.current_digest()? == self.digest)
    }
}

impl fmt::Display for HashEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.digest,
            self.mode_flag(),
            self.path.display()
        )
    }
}
