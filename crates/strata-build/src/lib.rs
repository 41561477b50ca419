//! Strata Build - Cache builds and verification
//!
//! This crate folds archived CSV files into a single cache file and keeps
//! the checksum ledger that decides whether a later build may start from
//! that cache.

pub mod build;
pub mod check;

pub use build::{BuildOptions, build, build_tree, collect_sources, source_list_path};
pub use check::{CheckOptions, Verdict, check, check_with, verdict};
