//! On-disk data files for dataset and scan tests.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use dsbridge_result::{Error, Result};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tempfile::TempDir;

/// Temporary directory that owns the fixture files written into it.
///
/// Files disappear when the value is dropped.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `file://` URI for `relative` inside this directory.
    pub fn uri(&self, relative: &str) -> String {
        format!("file://{}", self.path().join(relative).display())
    }

    fn prepare(&self, relative: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Write `batches` as one Parquet file; `row_group_rows` caps each row group.
    pub fn write_parquet(
        &self,
        relative: &str,
        batches: &[RecordBatch],
        row_group_rows: Option<usize>,
    ) -> Result<PathBuf> {
        let first = batches
            .first()
            .ok_or_else(|| Error::InvalidArgumentError("no batches to write".into()))?;
        let path = self.prepare(relative)?;
        let mut props = WriterProperties::builder();
        if let Some(rows) = row_group_rows {
            props = props.set_max_row_group_size(rows);
        }
        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, first.schema(), Some(props.build()))
            .map_err(|err| Error::Internal(format!("parquet writer: {err}")))?;
        for batch in batches {
            writer
                .write(batch)
                .map_err(|err| Error::Internal(format!("parquet write: {err}")))?;
        }
        writer
            .close()
            .map_err(|err| Error::Internal(format!("parquet close: {err}")))?;
        Ok(path)
    }

    /// Write `lines` verbatim, newline-terminated.
    pub fn write_text(&self, relative: &str, lines: &[&str]) -> Result<PathBuf> {
        let path = self.prepare(relative)?;
        let mut file = File::create(&path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(path)
    }
}

/// Two-column batch `(a: Int32, s: Utf8)` with `a` counting up from `start`.
pub fn int_utf8_batch(a_name: &str, s_name: &str, start: i32, rows: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new(a_name, DataType::Int32, true),
        Field::new(s_name, DataType::Utf8, true),
    ]));
    let ints: Vec<i32> = (0..rows as i32).map(|i| start + i).collect();
    let strings: Vec<String> = ints.iter().map(|i| format!("row-{i}")).collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(ints)),
        Arc::new(StringArray::from(strings)),
    ];
    RecordBatch::try_new(schema, columns).expect("fixture batch")
}
