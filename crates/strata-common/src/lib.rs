//! Strata Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, configuration, archive schema,
//! CSV-backed tables and the checksum ledger used by every Strata
//! component.

pub mod checksum;
pub mod config;
pub mod error;
pub mod ledger;
pub mod schema;
pub mod table;
pub mod types;

pub use checksum::{HashAlgorithm, HashEntry, digest_file};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{BasenameSplit, Ledger, LineSplit, SplitLine, default_ledger_path};
pub use schema::Schema;
pub use table::Table;
pub use types::*;

/// Log an operational decision at `info` when `verbose` is set and at
/// `debug` otherwise.
#[macro_export]
macro_rules! verbose {
    ($on:expr, $($arg:tt)+) => {
        if $on {
            ::tracing::info!($($arg)+);
        } else {
            ::tracing::debug!($($arg)+);
        }
    };
}
