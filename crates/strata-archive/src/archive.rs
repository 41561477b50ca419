//! Archive engine
//!
//! Copies the rows of CSV data files into an archive tree laid out by the
//! schema, merging in the metadata that describes each file. Source
//! directories are locked for the duration of the operation and released
//! on every exit path.

use crate::filemap::map_files;
use crate::lock::{LockCoordinator, common_parent};
use crate::merge::merge_metadata_files;
use crate::resolve::{missing_columns, resolve};
use std::fs;
use std::path::{Path, PathBuf};
use strata_common::config::{ArchiveConfig, DEFAULT_LOCK_FILE};
use strata_common::{DataFileRecord, Error, Result, Schema, Table, verbose};
use tracing::{error, warn};

/// Options for [`archive`]
#[derive(Clone, Debug)]
pub struct ArchiveOptions {
    /// Replace archived files that already exist
    pub overwrite: bool,
    /// Log every read, skip and write at `info`
    pub verbose: bool,
    /// Marker file name used to lock source directories
    pub lock_file_name: String,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            verbose: false,
            lock_file_name: DEFAULT_LOCK_FILE.to_string(),
        }
    }
}

impl ArchiveOptions {
    #[must_use]
    pub fn from_config(config: &ArchiveConfig, overwrite: bool, verbose: bool) -> Self {
        Self {
            overwrite,
            verbose,
            lock_file_name: config.lock_file_name.clone(),
        }
    }
}

/// Archive `data` files under `root`
///
/// Returns `Ok(false)` without touching anything when `data` is empty.
/// Missing schema columns, inconsistent metadata and existing targets
/// (without `overwrite`) abort the whole operation; files written before
/// the failure stay in place.
pub fn archive(
    root: &Path,
    data: &[PathBuf],
    schema: Option<&Schema>,
    meta: &[PathBuf],
    options: &ArchiveOptions,
) -> Result<bool> {
    if data.is_empty() {
        error!("No data files to archive");
        return Ok(false);
    }

    let mut locks = LockCoordinator::new(options.lock_file_name.as_str());
    let result = archive_locked(&mut locks, root, data, schema, meta, options);
    locks.release_all();
    result.map(|written| {
        verbose!(options.verbose, "Archived {} files into {}", written, root.display());
        true
    })
}

fn archive_locked(
    locks: &mut LockCoordinator,
    root: &Path,
    data: &[PathBuf],
    schema: Option<&Schema>,
    meta: &[PathBuf],
    options: &ArchiveOptions,
) -> Result<usize> {
    for sources in [data, meta] {
        if let Some(dir) = common_parent(sources) {
            locks.acquire(&dir)?;
        }
    }

    let columns = schema.map_or(&[][..], Schema::columns);
    let mut written = 0;
    for record in map_files(data, meta) {
        written += archive_record(root, &record, columns, options)?;
    }
    Ok(written)
}

/// Load a data file, skipping it when there is nothing to archive
fn load_data(path: &Path, verbose: bool) -> Result<Option<Table>> {
    let table = match Table::read_csv(path) {
        Ok(table) => table,
        Err(e) if e.is_unparseable() => {
            warn!("Skipping unreadable data file: {}", e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let table = table.drop_empty_columns()?;
    if table.is_empty() {
        verbose!(verbose, "Skipping empty data file {}", path.display());
        return Ok(None);
    }
    verbose!(verbose, "Read {} rows from {}", table.num_rows(), path.display());
    Ok(Some(table))
}

fn archive_record(
    root: &Path,
    record: &DataFileRecord,
    columns: &[String],
    options: &ArchiveOptions,
) -> Result<usize> {
    let Some(mut table) = load_data(&record.data, options.verbose)? else {
        return Ok(0);
    };

    if let Some(metadata) = merge_metadata_files(&record.metadata, table.num_rows())? {
        table = table.hconcat(&metadata)?;
    }

    let missing = missing_columns(columns, &table);
    if let Some(first) = missing.first() {
        for column in &missing {
            error!(
                "Schema column \"{}\" missing from {}",
                column,
                record.data.display()
            );
        }
        return Err(Error::ColumnNotFound {
            column: first.clone(),
        });
    }

    let file_name = record.data.file_name().ok_or_else(|| Error::FileNotFound {
        path: record.data.clone(),
    })?;

    let partitions = resolve(root, columns, &table)?;
    for partition in &partitions {
        let target = partition.target(file_name);
        if target.exists() && !options.overwrite {
            return Err(Error::AlreadyExists { path: target });
        }
        fs::create_dir_all(&partition.directory)
            .map_err(|e| Error::io_at(&partition.directory, e))?;
        partition.rows.write_csv(&target)?;
        verbose!(
            options.verbose,
            "Wrote {} rows to {}",
            partition.rows.num_rows(),
            target.display()
        );
    }
    Ok(partitions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    const SPECIES: [&str; 3] = ["setosa", "versicolor", "virginica"];

    fn iris_csv(rows_per_species: usize) -> String {
        let mut csv = String::from("Index,SepalLength,SepalWidth,Name\n");
        let mut index = 0;
        for species in SPECIES {
            for i in 0..rows_per_species {
                writeln!(csv, "{index},{}.{},3.{},{species}", 4 + i % 3, i % 10, i % 7).unwrap();
                index += 1;
            }
        }
        csv
    }

    fn measurements(rows: usize) -> String {
        let mut csv = String::from("Index,PetalLength\n");
        for i in 0..rows {
            writeln!(csv, "{i},1.{}", i % 10).unwrap();
        }
        csv
    }

    struct Fixture {
        _dir: TempDir,
        input: PathBuf,
        root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let root = dir.path().join("archive");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&root).unwrap();
        Fixture {
            _dir: dir,
            input,
            root,
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn opts() -> ArchiveOptions {
        ArchiveOptions::default()
    }

    #[test]
    fn test_partition_by_name() {
        let fx = fixture();
        let data = write(&fx.input, "iris.csv", &iris_csv(50));
        let schema = Schema::from_headers(["Name"]);

        assert!(archive(&fx.root, &[data], Some(&schema), &[], &opts()).unwrap());

        let mut total = 0;
        for species in SPECIES {
            let target = fx.root.join(species).join("iris.csv");
            let table = Table::read_csv(&target).unwrap();
            assert_eq!(table.distinct_values("Name").unwrap(), vec![species]);
            total += table.num_rows();
        }
        assert_eq!(total, 150);
        assert!(!fx.input.join("#lock").exists());
    }

    #[test]
    fn test_metadata_broadcast_into_one_directory() {
        let fx = fixture();
        let data = write(&fx.input, "run.csv", &measurements(50));
        let meta = write(&fx.input, "run.meta", "Species,Empty\nsetosa,\n");

        let schema = Schema::from_headers(["Species"]);
        assert!(archive(&fx.root, &[data], Some(&schema), &[meta], &opts()).unwrap());

        let entries: Vec<_> = fs::read_dir(&fx.root).unwrap().collect();
        assert_eq!(entries.len(), 1);

        let archived = Table::read_csv(&fx.root.join("setosa").join("run.csv")).unwrap();
        assert_eq!(archived.num_rows(), 50);
        assert!(!archived.has_column("Empty"));
        assert!(
            archived
                .column("Species")
                .unwrap()
                .iter()
                .all(|v| v == Some("setosa"))
        );
    }

    #[test]
    fn test_existing_target_aborts() {
        let fx = fixture();
        let first = write(&fx.input, "a.csv", "Name,Value\nx,1\n");
        let second = write(&fx.input, "b.csv", "Name,Value\nx,2\n");
        let schema = Schema::from_headers(["Name"]);

        fs::create_dir_all(fx.root.join("x")).unwrap();
        write(&fx.root.join("x"), "b.csv", "Name,Value\nold,0\n");

        let err = archive(
            &fx.root,
            &[first, second.clone()],
            Some(&schema),
            &[],
            &opts(),
        )
        .unwrap_err();
        assert!(err.is_already_exists());
        assert!(fx.root.join("x").join("a.csv").exists());
        assert!(!fx.input.join("#lock").exists());

        let overwrite = ArchiveOptions {
            overwrite: true,
            ..opts()
        };
        assert!(archive(&fx.root, &[second], Some(&schema), &[], &overwrite).unwrap());
        let replaced = Table::read_csv(&fx.root.join("x").join("b.csv")).unwrap();
        assert_eq!(replaced.distinct_values("Value").unwrap(), vec!["2"]);
    }

    #[test]
    fn test_missing_schema_column_fails() {
        let fx = fixture();
        let data = write(&fx.input, "a.csv", "Name,Value\nx,1\n");
        let schema = Schema::from_headers(["Name", "Year"]);

        let err = archive(&fx.root, &[data], Some(&schema), &[], &opts()).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { ref column } if column == "Year"));
        assert!(!fx.input.join("#lock").exists());
        assert_eq!(fs::read_dir(&fx.root).unwrap().count(), 0);
    }

    #[test]
    fn test_inconsistent_metadata_fails() {
        let fx = fixture();
        let data = write(&fx.input, "a.csv", "Value\n1\n2\n3\n");
        let meta = write(&fx.input, "a.meta", "Species\nsetosa\nvirginica\n");

        let err = archive(&fx.root, &[data], None, &[meta], &opts()).unwrap_err();
        assert!(matches!(err, Error::InconsistentMetadata { .. }));
        assert!(!fx.input.join("#lock").exists());
    }

    #[test]
    fn test_empty_inputs() {
        let fx = fixture();
        assert!(!archive(&fx.root, &[], None, &[], &opts()).unwrap());

        let empty = write(&fx.input, "empty.csv", "");
        let header_only = write(&fx.input, "header.csv", "Name,Value\n");
        let data = write(&fx.input, "data.csv", "Name,Value\nx,1\n");
        let schema = Schema::from_headers(["Name"]);

        assert!(
            archive(
                &fx.root,
                &[empty, header_only, data],
                Some(&schema),
                &[],
                &opts()
            )
            .unwrap()
        );
        assert!(fx.root.join("x").join("data.csv").exists());
        assert!(!fx.root.join("x").join("empty.csv").exists());
        assert!(!fx.root.join("x").join("header.csv").exists());
    }

    #[test]
    fn test_no_schema_copies_to_root() {
        let fx = fixture();
        let data = write(&fx.input, "a.csv", "Name,Blank,Value\nx,,1\ny,,2\n");

        assert!(archive(&fx.root, &[data], None, &[], &opts()).unwrap());
        let archived = Table::read_csv(&fx.root.join("a.csv")).unwrap();
        assert_eq!(archived.column_names(), vec!["Name", "Value"]);
        assert_eq!(archived.num_rows(), 2);
    }

    #[test]
    fn test_custom_lock_name_and_foreign_lock() {
        let fx = fixture();
        let data = write(&fx.input, "a.csv", "Name\nx\n");
        write(&fx.input, ".busy", "other-owner");

        let options = ArchiveOptions {
            lock_file_name: ".busy".to_string(),
            ..opts()
        };
        assert!(archive(&fx.root, &[data], None, &[], &options).unwrap());
        assert_eq!(
            fs::read_to_string(fx.input.join(".busy")).unwrap(),
            "other-owner"
        );
    }
}
