//! Configuration types for Strata
//!
//! This module defines the configuration structures read from the
//! optional `strata.toml` file. Every field has a default, so an empty or
//! absent file is equivalent to `Config::default()`.

use crate::checksum::HashAlgorithm;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default advisory lock marker name
pub const DEFAULT_LOCK_FILE: &str = "#lock";

/// Default schema file name inside an archive root
pub const DEFAULT_SCHEMA_FILE: &str = ".schema.json";

/// Root configuration for Strata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archive configuration
    pub archive: ArchiveConfig,
    /// Checksum ledger configuration
    pub hash: HashConfig,
    /// Build configuration
    pub build: BuildConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        Self::from_toml_str(&text)
    }
}

/// Archive layout configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Name of the advisory lock marker placed in locked directories
    pub lock_file_name: String,
    /// Name of the schema file inside the archive root
    pub schema_file_name: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            lock_file_name: DEFAULT_LOCK_FILE.to_string(),
            schema_file_name: DEFAULT_SCHEMA_FILE.to_string(),
        }
    }
}

/// Checksum ledger configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Digest algorithm for new ledger entries
    pub algorithm: HashAlgorithm,
    /// Hash raw bytes (`*` entries) instead of newline-normalized text
    pub binary: bool,
    /// Ledger file name placed next to the cache (algorithm default if unset)
    pub ledger_file_name: Option<String>,
}

impl HashConfig {
    /// Ledger file name, falling back to the algorithm's conventional name
    #[must_use]
    pub fn ledger_file_name(&self) -> &str {
        self.ledger_file_name
            .as_deref()
            .unwrap_or_else(|| self.algorithm.default_ledger_name())
    }
}

/// Build configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Start from the existing cache when its recorded digest still matches
    pub incremental: bool,
    /// Record the cache digest in the ledger after building
    pub post_hash: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            incremental: true,
            post_hash: true,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
