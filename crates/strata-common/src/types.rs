//! Core type definitions for Strata
//!
//! This module defines the small value types shared by the archive and
//! build engines: sanitized directory segments and data/metadata file
//! associations.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Segment used for cells that are missing or sanitize to nothing
pub const MISSING_SEGMENT: &str = "_";

/// A single sanitized directory name in the archive tree
///
/// Segments are lower-cased, spaces and path separators become
/// underscores, trailing periods are stripped and a leading period becomes
/// an underscore. Sanitizing a segment
/// that is already sanitized returns it unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct PathSegment(String);

impl PathSegment {
    /// Sanitize a raw cell value into a directory segment
    #[must_use]
    pub fn sanitize(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self(MISSING_SEGMENT.to_string());
        };

        let mut segment: String = value
            .to_lowercase()
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                other => other,
            })
            .collect();

        let trimmed = segment.trim_end_matches('.').len();
        segment.truncate(trimmed);

        if segment.is_empty() {
            segment.push_str(MISSING_SEGMENT);
        }
        // A leading period would make the directory hidden
        if segment.starts_with('.') {
            segment.replace_range(..1, "_");
        }
        Self(segment)
    }

    /// Get the segment as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for PathSegment {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// A data file and the metadata files that describe it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFileRecord {
    /// Path to the data file
    pub data: PathBuf,
    /// Metadata files to merge into every row of the data file
    pub metadata: Vec<PathBuf>,
}

impl DataFileRecord {
    /// Create a record for a data file with its metadata files
    #[must_use]
    pub const fn new(data: PathBuf, metadata: Vec<PathBuf>) -> Self {
        Self { data, metadata }
    }
}
