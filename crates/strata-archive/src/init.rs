//! Archive initialization

use std::path::Path;
use strata_common::{Result, Schema, verbose};

/// Write the schema for a new archive
///
/// An existing schema file is only replaced when `overwrite` is set.
pub fn init(schema: &Schema, path: &Path, overwrite: bool, verbose: bool) -> Result<()> {
    schema.save(path, overwrite)?;
    verbose!(
        verbose,
        "Wrote schema with {} columns to {}",
        schema.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_root_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive").join(".schema.json");
        let schema = Schema::from_headers(["Species", "Year"]);

        init(&schema, &path, false, true).unwrap();
        assert_eq!(Schema::load(&path).unwrap(), schema);

        assert!(init(&schema, &path, false, false).unwrap_err().is_already_exists());
        init(&Schema::default(), &path, true, false).unwrap();
        assert!(Schema::load(&path).unwrap().is_empty());
    }
}
