//! Metadata merging
//!
//! Metadata tables describe a whole data file. Each retained metadata
//! column must carry at most one distinct value; a column that already has
//! one cell per data row is kept as is, any other column is broadcast to the
//! data table's row count.

use arrow::array::{Array, ArrayRef};
use std::path::PathBuf;
use std::sync::Arc;
use strata_common::{Error, Result, Table};
use tracing::warn;

/// Fold metadata tables into one table of `target_rows` rows
///
/// Returns `None` when no metadata column survives.
pub fn merge_metadata(tables: &[Table], target_rows: usize) -> Result<Option<Table>> {
    let mut merged = Table::empty();

    for table in tables {
        let table = table.drop_empty_columns()?;
        for name in table.column_names() {
            let values = table.distinct_values(name).unwrap_or_default();
            if values.len() > 1 {
                return Err(Error::InconsistentMetadata {
                    column: name.to_string(),
                });
            }

            if merged.has_column(name) {
                warn!("Metadata column \"{}\" given more than once, keeping the first", name);
                continue;
            }

            let column = match table.column(name) {
                Some(cells) if cells.len() == target_rows => Arc::new(cells.clone()) as ArrayRef,
                _ => Table::broadcast(values.first().copied(), target_rows),
            };
            merged = merged.with_column(name, column)?;
        }
    }

    Ok((merged.num_columns() > 0).then_some(merged))
}

/// Read metadata files and merge them for a data table of `target_rows` rows
pub fn merge_metadata_files(paths: &[PathBuf], target_rows: usize) -> Result<Option<Table>> {
    let tables = paths
        .iter()
        .map(|path| Table::read_csv(path))
        .collect::<Result<Vec<_>>>()?;
    merge_metadata(&tables, target_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row_broadcasts() {
        let meta = Table::from_columns([("Species", vec![Some("setosa")])]).unwrap();
        let merged = merge_metadata(&[meta], 50).unwrap().unwrap();

        assert_eq!(merged.num_rows(), 50);
        let species = merged.column("Species").unwrap();
        assert!(species.iter().all(|v| v == Some("setosa")));
    }

    #[test]
    fn test_row_aligned_column_kept() {
        let meta = Table::from_columns([(
            "Operator",
            vec![Some("ann"), None, Some("ann")],
        )])
        .unwrap();
        let merged = merge_metadata(&[meta], 3).unwrap().unwrap();

        let operator = merged.column("Operator").unwrap();
        assert_eq!(operator.len(), 3);
        assert_eq!(operator.null_count(), 1);
    }

    #[test]
    fn test_inconsistent_metadata_rejected() {
        let meta = Table::from_columns([
            ("Species", vec![Some("setosa"), Some("setosa")]),
            ("Year", vec![Some("2019"), Some("2020")]),
        ])
        .unwrap();

        let err = merge_metadata(&[meta], 10).unwrap_err();
        assert!(matches!(err, Error::InconsistentMetadata { column } if column == "Year"));
    }

    #[test]
    fn test_empty_columns_dropped_before_checking() {
        let meta = Table::from_columns([
            ("Blank", vec![None::<&str>, None]),
            ("Species", vec![Some("setosa"), None]),
        ])
        .unwrap();

        let merged = merge_metadata(&[meta], 4).unwrap().unwrap();
        assert_eq!(merged.column_names(), vec!["Species"]);
        assert_eq!(merged.distinct_values("Species").unwrap(), vec!["setosa"]);
        assert_eq!(merged.column("Species").unwrap().null_count(), 0);
    }

    #[test]
    fn test_nothing_survives() {
        let meta = Table::from_columns([("Blank", vec![None::<&str>])]).unwrap();
        assert!(merge_metadata(&[meta], 5).unwrap().is_none());
        assert!(merge_metadata(&[], 5).unwrap().is_none());
    }

    #[test]
    fn test_multiple_tables_concatenate() {
        let first = Table::from_columns([("Species", vec![Some("setosa")])]).unwrap();
        let second = Table::from_columns([
            ("Lab", vec![Some("north")]),
            ("Species", vec![Some("other")]),
        ])
        .unwrap();

        let merged = merge_metadata(&[first, second], 2).unwrap().unwrap();
        assert_eq!(merged.column_names(), vec!["Species", "Lab"]);
        assert_eq!(merged.distinct_values("Species").unwrap(), vec!["setosa"]);
    }

    #[test]
    fn test_merge_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.meta");
        std::fs::write(&path, "Species,Empty\nsetosa,\n").unwrap();

        let merged = merge_metadata_files(&[path], 7).unwrap().unwrap();
        assert_eq!(merged.num_rows(), 7);
        assert_eq!(merged.column_names(), vec!["Species"]);
    }
}
