//! Data/metadata file pairing
//!
//! With as many metadata files as data files, each data file is paired
//! with the metadata file of the same name stem (`run1.csv` with
//! `run1.meta`). If that does not pair every data file exactly once, or the
//! counts differ, every data file is associated with all metadata files.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use strata_common::DataFileRecord;

fn stem(path: &Path) -> Option<&OsStr> {
    path.file_stem()
}

/// Try to pair every data file with a distinct same-stem metadata file
fn pair_by_stem(data: &[PathBuf], meta: &[PathBuf]) -> Option<Vec<DataFileRecord>> {
    let mut used = HashSet::new();
    let mut records = Vec::with_capacity(data.len());

    for datafile in data {
        let data_stem = stem(datafile)?;
        let index = meta
            .iter()
            .enumerate()
            .find(|(i, metafile)| !used.contains(i) && stem(metafile) == Some(data_stem))
            .map(|(i, _)| i)?;
        used.insert(index);
        records.push(DataFileRecord::new(
            datafile.clone(),
            vec![meta[index].clone()],
        ));
    }
    Some(records)
}

/// Associate each data file with its metadata files
///
/// The result is ordered by data file path.
#[must_use]
pub fn map_files(data: &[PathBuf], meta: &[PathBuf]) -> Vec<DataFileRecord> {
    let mut data: Vec<PathBuf> = data.to_vec();
    data.sort();
    data.dedup();

    if !meta.is_empty() && data.len() == meta.len() {
        if let Some(records) = pair_by_stem(&data, meta) {
            return records;
        }
    }

    data.into_iter()
        .map(|datafile| DataFileRecord::new(datafile, meta.to_vec()))
        .collect()
}
