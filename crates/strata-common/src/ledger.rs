//! Checksum ledger
//!
//! A ledger is a plain text file of [`HashEntry`] lines in the familiar
//! `sha256sum` layout:
//!
//! ```text
//! <hex-digest> <flag><path>
//! ```
//!
//! where `<flag>` is `*` for binary mode and a space for text mode. Entries
//! are looked up by a leading linear scan; re-recording a path replaces its
//! line in place (last writer wins) and new paths are appended.

use crate::checksum::{HashAlgorithm, HashEntry};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A ledger line split into its parts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitLine {
    pub digest: String,
    pub binary: bool,
    pub path: PathBuf,
}

/// Strategy for splitting ledger lines while searching for a target
pub trait LineSplit {
    /// Split `line` if it concerns `target`.
    ///
    /// Returns `Ok(None)` for lines about other files and
    /// [`Error::MalformedLine`] for a line that concerns the target but
    /// cannot be split.
    fn split(&self, line: &str, target: &Path) -> Result<Option<SplitLine>>;
}

/// Default line splitting: match on the target's base name, then require a
/// well-formed digest token of the algorithm's length.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasenameSplit {
    algorithm: HashAlgorithm,
}

impl BasenameSplit {
    #[must_use]
    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl LineSplit for BasenameSplit {
    fn split(&self, line: &str, target: &Path) -> Result<Option<SplitLine>> {
        let Some(name) = target.file_name() else {
            return Ok(None);
        };
        if !line.contains(&*name.to_string_lossy()) {
            return Ok(None);
        }
        parse_line(line, self.algorithm)
            .map(Some)
            .ok_or_else(|| Error::MalformedLine {
                line: line.to_string(),
            })
    }
}

/// Parse `<digest> <flag><path>`, requiring a digest of `algorithm`'s length
#[must_use]
pub fn parse_line(line: &str, algorithm: HashAlgorithm) -> Option<SplitLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (digest, rest) = line.split_once(' ')?;
    if !algorithm.is_valid_digest(digest) {
        return None;
    }

    let mut chars = rest.chars();
    let binary = match chars.next()? {
        '*' => true,
        ' ' => false,
        _ => return None,
    };
    let path = chars.as_str();
    if path.is_empty() {
        return None;
    }

    Some(SplitLine {
        digest: digest.to_string(),
        binary,
        path: PathBuf::from(path),
    })
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::path::absolute(a), std::path::absolute(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Default ledger location for a target: a sibling file named `file_name`
#[must_use]
pub fn default_ledger_path(target: &Path, file_name: &str) -> PathBuf {
    target
        .parent()
        .map_or_else(|| PathBuf::from(file_name), |dir| dir.join(file_name))
}

/// Checksum ledger file
#[derive(Clone, Debug)]
pub struct Ledger {
    path: PathBuf,
    algorithm: HashAlgorithm,
}

impl Ledger {
    /// Open a ledger at `path` whose entries use `algorithm`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Self {
        Self {
            path: path.into(),
            algorithm,
        }
    }

    /// Path of the ledger file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Algorithm of the ledger's entries
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Whether the ledger file exists
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: self.path.clone(),
                }
            } else {
                Error::io_at(&self.path, e)
            }
        })?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Find the recorded entry for `target` using `split`
    pub fn find(&self, target: &Path, split: &dyn LineSplit) -> Result<Option<HashEntry>> {
        for line in self.read_lines()? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(parts) = split.split(&line, target)? {
                if same_path(&parts.path, target) {
                    return Ok(Some(HashEntry::new(
                        parts.path,
                        self.algorithm,
                        parts.digest,
                        parts.binary,
                    )));
                }
            }
        }
        Ok(None)
    }

    /// All well-formed entries, in file order
    pub fn entries(&self) -> Result<Vec<HashEntry>> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| parse_line(line, self.algorithm))
            .map(|parts| HashEntry::new(parts.path, self.algorithm, parts.digest, parts.binary))
            .collect())
    }

    /// Record `entry`, replacing any line for the same path
    pub fn upsert(&self, entry: &HashEntry) -> Result<()> {
        self.upsert_all(std::slice::from_ref(entry))
    }

    /// Record several entries with a single rewrite of the ledger file
    ///
    /// Lines the ledger cannot parse are preserved verbatim. The ledger is
    /// created if it does not exist yet.
    pub fn upsert_all(&self, entries: &[HashEntry]) -> Result<()> {
        let mut lines = if self.path.exists() {
            self.read_lines()?
        } else {
            Vec::new()
        };

        for entry in entries {
            let mut replaced = false;
            lines.retain_mut(|line| {
                let matches = parse_line(line, self.algorithm)
                    .is_some_and(|parts| same_path(&parts.path, &entry.path));
                if !matches {
                    return true;
                }
                if replaced {
                    return false;
                }
                *line = entry.to_string();
                replaced = true;
                true
            });
            if !replaced {
                lines.push(entry.to_string());
            }
            debug!("Ledger {}: recorded {}", self.path.display(), entry.path.display());
        }

        self.write_lines(&lines)
    }

    /// Replace the whole ledger with `entries`
    pub fn rewrite(&self, entries: &[HashEntry]) -> Result<()> {
        let lines: Vec<String> = entries.iter().map(ToString::to_string).collect();
        self.write_lines(&lines)
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut text = lines.join("\n");
        text.push('\n');
        std::fs::write(&self.path, text).map_err(|e| Error::io_at(&self.path, e))
    }
}
