//! Strata Archive - Schema-driven CSV archiving
//!
//! This crate files the rows of CSV data files into a directory tree whose
//! levels follow the archive schema:
//! - Data/metadata file pairing
//! - Metadata merging and broadcasting
//! - Row partitioning into sanitized directory paths
//! - Advisory locking of source directories

pub mod archive;
pub mod filemap;
pub mod init;
pub mod lock;
pub mod merge;
pub mod resolve;

pub use archive::{ArchiveOptions, archive};
pub use filemap::map_files;
pub use init::init;
pub use lock::{LockCoordinator, LockToken, common_parent};
pub use merge::{merge_metadata, merge_metadata_files};
pub use resolve::{Partition, missing_columns, resolve};
