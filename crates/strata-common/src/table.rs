//! String tables backed by Arrow record batches
//!
//! Every column of a [`Table`] is a nullable `Utf8` array: cells are kept
//! exactly as they appear in the CSV source, an empty CSV field reads as a
//! missing cell and is written back as an empty field. Tables carry no row
//! index; row order is the order of the source rows.

use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, StringArray, new_null_array};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

fn utf8_schema<I, S>(names: I) -> SchemaRef
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields: Vec<Field> = names
        .into_iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    Arc::new(ArrowSchema::new(fields))
}

fn table_err(e: ArrowError) -> Error {
    Error::table(e.to_string())
}

/// An ordered set of named string columns sharing one row count
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    batch: RecordBatch,
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl Table {
    /// A table with no columns and no rows
    #[must_use]
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(ArrowSchema::empty())),
        }
    }

    fn assemble(schema: SchemaRef, columns: Vec<ArrayRef>, rows: usize) -> Result<Self> {
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        RecordBatch::try_new_with_options(schema, columns, &options)
            .map(|batch| Self { batch })
            .map_err(table_err)
    }

    /// Build a table from `(name, cells)` pairs
    pub fn from_columns<N, V, I>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, Vec<Option<V>>)>,
        N: Into<String>,
        V: AsRef<str>,
    {
        let mut names = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        for (name, cells) in columns {
            names.push(name.into());
            let array: StringArray = cells
                .iter()
                .map(|c| c.as_ref().map(AsRef::<str>::as_ref))
                .collect();
            arrays.push(Arc::new(array));
        }
        let rows = arrays.first().map_or(0, |a| a.len());
        Self::assemble(utf8_schema(names), arrays, rows)
    }

    /// A single-column array repeating `value` for `rows` rows
    #[must_use]
    pub fn broadcast(value: Option<&str>, rows: usize) -> ArrayRef {
        Arc::new(std::iter::repeat_n(value, rows).collect::<StringArray>())
    }

    /// Read a CSV file with a header row; every column is read as text
    pub fn read_csv(path: &Path) -> Result<Self> {
        let open = || {
            File::open(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FileNotFound {
                        path: path.to_path_buf(),
                    }
                } else {
                    Error::io_at(path, e)
                }
            })
        };

        let format = Format::default().with_header(true);
        let (inferred, _) = format
            .infer_schema(open()?, Some(0))
            .map_err(|e| Error::csv(path, e))?;
        if inferred.fields().is_empty() {
            return Ok(Self::empty());
        }

        let schema = utf8_schema(inferred.fields().iter().map(|f| f.name().clone()));
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .build(open()?)
            .map_err(|e| Error::csv(path, e))?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::csv(path, e))?;
        let batch = concat_batches(&schema, &batches).map_err(|e| Error::csv(path, e))?;
        Ok(Self { batch })
    }

    /// Render as CSV text: header line, then one line per row
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if self.num_columns() == 0 {
            return Ok(buf);
        }
        {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
            writer.write(&self.batch).map_err(table_err)?;
        }
        Ok(buf)
    }

    /// Write as a CSV file, replacing any existing file
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let bytes = self.to_csv_bytes()?;
        std::fs::write(path, bytes).map_err(|e| Error::io_at(path, e))
    }

    /// Underlying record batch
    #[must_use]
    pub const fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// A table without rows or without columns holds no data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0 || self.num_columns() == 0
    }

    /// Column names in order
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.batch.schema_ref().index_of(name).ok()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of the named column
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&StringArray> {
        self.column_index(name)
            .map(|i| self.batch.column(i).as_string::<i32>())
    }

    /// Distinct non-missing values of a column, in first-seen order
    #[must_use]
    pub fn distinct_values(&self, name: &str) -> Option<Vec<&str>> {
        let column = self.column(name)?;
        let mut seen = HashSet::new();
        Some(
            column
                .iter()
                .flatten()
                .filter(|value| seen.insert(*value))
                .collect(),
        )
    }

    /// Cells of one row, in column order
    #[must_use]
    pub fn row(&self, index: usize) -> Vec<Option<String>> {
        self.batch
            .columns()
            .iter()
            .map(|column| {
                let column = column.as_string::<i32>();
                (!column.is_null(index)).then(|| column.value(index).to_string())
            })
            .collect()
    }

    /// Drop columns whose every cell is missing
    pub fn drop_empty_columns(&self) -> Result<Self> {
        let schema = self.batch.schema_ref();
        let (fields, columns): (Vec<_>, Vec<_>) = schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .filter(|(_, column)| column.null_count() < column.len())
            .map(|(field, column)| (field.name().clone(), Arc::clone(column)))
            .unzip();
        Self::assemble(utf8_schema(fields), columns, self.num_rows())
    }

    /// Append a column at the end
    pub fn with_column(&self, name: &str, column: ArrayRef) -> Result<Self> {
        let mut names: Vec<String> = self.column_names().into_iter().map(String::from).collect();
        let mut columns = self.batch.columns().to_vec();
        let rows = if columns.is_empty() {
            column.len()
        } else {
            self.num_rows()
        };
        names.push(name.to_string());
        columns.push(column);
        Self::assemble(utf8_schema(names), columns, rows)
    }

    /// Place `other`'s columns after this table's columns
    ///
    /// Both tables must have the same row count. A column of `other` whose
    /// name already exists here is skipped with a warning.
    pub fn hconcat(&self, other: &Self) -> Result<Self> {
        if self.num_columns() > 0 && other.num_columns() > 0 && self.num_rows() != other.num_rows()
        {
            return Err(Error::table(format!(
                "cannot join columns of {} rows onto {} rows",
                other.num_rows(),
                self.num_rows()
            )));
        }

        let mut table = self.clone();
        let other_schema = other.batch.schema_ref();
        for (field, column) in other_schema.fields().iter().zip(other.batch.columns()) {
            if table.has_column(field.name()) {
                warn!("Ignoring duplicate column \"{}\"", field.name());
                continue;
            }
            table = table.with_column(field.name(), Arc::clone(column))?;
        }
        Ok(table)
    }

    /// Keep the rows where `mask` is true
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        filter_record_batch(&self.batch, mask)
            .map(|batch| Self { batch })
            .map_err(table_err)
    }

    fn project(&self, schema: &SchemaRef) -> Result<RecordBatch> {
        let rows = self.num_rows();
        let columns = schema
            .fields()
            .iter()
            .map(|field| match self.column_index(field.name()) {
                Some(i) => Arc::clone(self.batch.column(i)),
                None => new_null_array(&DataType::Utf8, rows),
            })
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        RecordBatch::try_new_with_options(Arc::clone(schema), columns, &options).map_err(table_err)
    }

    /// Rows of `self` followed by rows of `other`
    ///
    /// Columns are matched by name. Columns only present in `other` are
    /// added at the end; cells a table has no column for are missing.
    pub fn append(&self, other: &Self) -> Result<Self> {
        if other.num_columns() == 0 {
            return Ok(self.clone());
        }
        if self.num_columns() == 0 {
            return Ok(other.clone());
        }

        let mut names: Vec<&str> = self.column_names();
        for name in other.column_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let schema = utf8_schema(names);

        let head = self.project(&schema)?;
        let tail = other.project(&schema)?;
        concat_batches(&schema, [&head, &tail])
            .map(|batch| Self { batch })
            .map_err(table_err)
    }
}
