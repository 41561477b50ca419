//! Schema-driven partitioning
//!
//! Rows are split on the value of each schema column in rank order. Every
//! level of the schema adds one sanitized directory segment, so a table
//! archived under `root` with schema `[Species, Year]` ends up in
//! `root/<species>/<year>/`.

use arrow::array::BooleanArray;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use strata_common::{PathSegment, Result, Table};

/// A subset of rows and the directory they are filed under
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    pub directory: PathBuf,
    pub segments: Vec<PathSegment>,
    pub rows: Table,
}

impl Partition {
    /// Path of the archived copy of a file named `file_name`
    #[must_use]
    pub fn target(&self, file_name: &OsStr) -> PathBuf {
        self.directory.join(file_name)
    }
}

/// Schema columns not present in `table`, in rank order
#[must_use]
pub fn missing_columns(schema: &[String], table: &Table) -> Vec<String> {
    schema
        .iter()
        .filter(|column| !table.has_column(column))
        .cloned()
        .collect()
}

/// Partition `table` under `root` following `schema`
///
/// An empty schema yields the whole table under `root`. If a schema column
/// is absent from the table the result is empty; callers decide whether
/// that is an error.
pub fn resolve(root: &Path, schema: &[String], table: &Table) -> Result<Vec<Partition>> {
    let mut partitions = Vec::new();
    descend(root.to_path_buf(), Vec::new(), schema, table.clone(), &mut partitions)?;
    Ok(partitions)
}

fn descend(
    directory: PathBuf,
    segments: Vec<PathSegment>,
    schema: &[String],
    rows: Table,
    out: &mut Vec<Partition>,
) -> Result<()> {
    let Some((column, rest)) = schema.split_first() else {
        out.push(Partition {
            directory,
            segments,
            rows,
        });
        return Ok(());
    };

    for (segment, subset) in split_by(&rows, column)? {
        let mut path = segments.clone();
        let next = directory.join(&segment);
        path.push(segment);
        descend(next, path, rest, subset, out)?;
    }
    Ok(())
}

/// Group rows by the sanitized value of `column`, first-seen order
fn split_by(rows: &Table, column: &str) -> Result<Vec<(PathSegment, Table)>> {
    let Some(cells) = rows.column(column) else {
        return Ok(Vec::new());
    };

    let count = rows.num_rows();
    let mut index: HashMap<PathSegment, usize> = HashMap::new();
    let mut groups: Vec<(PathSegment, Vec<bool>)> = Vec::new();

    for (row, cell) in cells.iter().enumerate() {
        let segment = PathSegment::sanitize(cell);
        let group = match index.get(&segment) {
            Some(&group) => group,
            None => {
                index.insert(segment.clone(), groups.len());
                groups.push((segment, vec![false; count]));
                groups.len() - 1
            }
        };
        groups[group].1[row] = true;
    }

    groups
        .into_iter()
        .map(|(segment, mask)| {
            let subset = rows.filter(&BooleanArray::from(mask))?;
            Ok((segment, subset))
        })
        .collect()
}
