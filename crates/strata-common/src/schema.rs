//! Archive storage schema
//!
//! A schema is the ordered list of column names that decides how archived
//! rows nest into directories: rank 0 is the outermost level. On disk it is
//! a JSON object keyed by the rank as a string:
//!
//! ```json
//! {"0": "Species", "1": "Year"}
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered column names, outermost directory level first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Build a schema from column names in rank order
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a schema from explicit ranks, which must be contiguous from 0
    pub fn from_ranks(ranks: BTreeMap<usize, String>) -> Result<Self> {
        for (expected, rank) in ranks.keys().enumerate() {
            if *rank != expected {
                return Err(Error::invalid_schema(format!(
                    "ranks must be contiguous from 0, missing rank {expected}"
                )));
            }
        }
        Ok(Self {
            columns: ranks.into_values().collect(),
        })
    }

    /// Parse the JSON representation
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(text).map_err(|e| Error::invalid_schema(e.to_string()))?;

        let mut ranks = BTreeMap::new();
        for (key, column) in raw {
            let rank: usize = key
                .trim()
                .parse()
                .map_err(|_| Error::invalid_schema(format!("rank {key:?} is not a number")))?;
            if ranks.insert(rank, column).is_some() {
                return Err(Error::invalid_schema(format!("rank {rank} appears twice")));
            }
        }
        Self::from_ranks(ranks)
    }

    /// Render the JSON representation
    pub fn to_json(&self) -> Result<String> {
        let ranked: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .enumerate()
            .map(|(rank, column)| (rank.to_string(), serde_json::Value::from(column.as_str())))
            .collect();
        serde_json::to_string_pretty(&ranked).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a schema file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::io_at(path, e)
            }
        })?;
        Self::from_json(&text)
    }

    /// Write the schema file; an existing file is only replaced when
    /// `overwrite` is set
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            return Err(Error::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| Error::io_at(path, e))
    }

    /// Column names in rank order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_sorted_numerically() {
        let mut json = String::from("{");
        for rank in (0..12).rev() {
            json.push_str(&format!("\"{rank}\": \"col{rank}\","));
        }
        json.pop();
        json.push('}');

        let schema = Schema::from_json(&json).unwrap();
        assert_eq!(schema.len(), 12);
        assert_eq!(schema.columns()[2], "col2");
        assert_eq!(schema.columns()[10], "col10");
    }

    #[test]
    fn test_non_contiguous_ranks_rejected() {
        let err = Schema::from_json(r#"{"0": "Species", "2": "Year"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));

        let err = Schema::from_json(r#"{"first": "Species"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_empty_schema() {
        let schema = Schema::from_json("{}").unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".schema.json");
        let schema = Schema::from_headers(["Species", "Year"]);

        schema.save(&path, false).unwrap();
        assert_eq!(Schema::load(&path).unwrap(), schema);

        let err = schema.save(&path, false).unwrap_err();
        assert!(err.is_already_exists());

        let replacement = Schema::from_headers(["Year"]);
        replacement.save(&path, true).unwrap();
        assert_eq!(Schema::load(&path).unwrap(), replacement);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Schema::load(&dir.path().join("none.json")).unwrap_err().is_not_found());
    }
}
