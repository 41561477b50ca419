//! Advisory directory locks
//!
//! A lock is a marker file (by default `#lock`) created inside a directory
//! while an archive operation reads from it. The marker holds the owner id
//! of the invocation that created it. Other cooperating invocations see the
//! marker and leave it alone; nothing stops a writer that ignores it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use strata_common::config::DEFAULT_LOCK_FILE;
use strata_common::{Error, Result};
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of acquiring a directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockToken {
    /// The marker was created by this coordinator and will be released by it
    Held(PathBuf),
    /// A marker owned by another invocation was already present
    Foreign(PathBuf),
}

impl LockToken {
    #[must_use]
    pub fn marker(&self) -> &Path {
        match self {
            Self::Held(path) | Self::Foreign(path) => path,
        }
    }

    #[must_use]
    pub const fn is_held(&self) -> bool {
        matches!(self, Self::Held(_))
    }
}

/// Tracks every marker one invocation created
#[derive(Debug)]
pub struct LockCoordinator {
    marker_name: String,
    owner: Uuid,
    held: Vec<PathBuf>,
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_FILE)
    }
}

impl LockCoordinator {
    /// Create a coordinator using `marker_name` as the marker file name
    pub fn new(marker_name: impl Into<String>) -> Self {
        Self {
            marker_name: marker_name.into(),
            owner: Uuid::new_v4(),
            held: Vec::new(),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> Uuid {
        self.owner
    }

    /// Markers currently held
    #[must_use]
    pub fn held(&self) -> &[PathBuf] {
        &self.held
    }

    /// Place a marker in `dir`
    ///
    /// Acquiring a directory already held is a no-op.
    pub fn acquire(&mut self, dir: &Path) -> Result<LockToken> {
        let marker = dir.join(&self.marker_name);
        if self.held.contains(&marker) {
            return Ok(LockToken::Held(marker));
        }

        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(mut file) => {
                let written = file.write_all(self.owner.to_string().as_bytes());
                // Record before checking the write so a partial marker is still released.
                self.held.push(marker.clone());
                written.map_err(|e| Error::io_at(&marker, e))?;
                debug!("Lock acquired: {}", marker.display());
                Ok(LockToken::Held(marker))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&marker).unwrap_or_default();
                warn!(
                    "Directory {} is locked by {}, continuing without the lock",
                    dir.display(),
                    owner.trim()
                );
                Ok(LockToken::Foreign(marker))
            }
            Err(e) => Err(Error::io_at(&marker, e)),
        }
    }

    /// Remove every held marker
    pub fn release_all(&mut self) {
        for marker in self.held.drain(..) {
            match fs::remove_file(&marker) {
                Ok(()) => debug!("Lock released: {}", marker.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to release lock {}: {}", marker.display(), e),
            }
        }
    }
}

impl Drop for LockCoordinator {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Deepest directory containing every path in `paths`
///
/// Relative paths are made absolute first. Returns `None` for an empty
/// slice.
#[must_use]
pub fn common_parent(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs = paths.iter().map(|path| {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        absolute
            .parent()
            .map_or_else(|| absolute.clone(), Path::to_path_buf)
    });

    let first = dirs.next()?;
    let mut common: Vec<Component<'_>> = first.components().collect();

    for dir in dirs {
        let shared = common
            .iter()
            .zip(dir.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    Some(common.iter().collect())
}
