//! Reconciled batches handed to the caller.

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::datatypes::SchemaRef;
use dsbridge_column::Column;
use dsbridge_result::{Error, Result};

/// Columns in output order plus the shared row count.
///
/// Each column is a handle this batch owns. Pooled null and partition columns
/// were retained before being attached, so dropping the batch only gives back
/// its own references.
#[derive(Debug)]
pub struct OutputBatch {
    schema: SchemaRef,
    columns: Vec<Column>,
    num_rows: usize,
}

impl OutputBatch {
    pub(crate) fn new(schema: SchemaRef, columns: Vec<Column>, num_rows: usize) -> Result<Self> {
        if schema.fields().len() != columns.len() {
            return Err(Error::Internal(format!(
                "output schema has {} fields but {} columns were assembled",
                schema.fields().len(),
                columns.len()
            )));
        }
        if let Some(short) = columns.iter().find(|c| c.value_count() < num_rows) {
            return Err(Error::Internal(format!(
                "column '{}' reports {} values for a {num_rows}-row batch",
                short.name(),
                short.value_count()
            )));
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// First column whose output field is named exactly `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.schema
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .map(|idx| &self.columns[idx])
    }

    /// Give up the batch and keep its column handles.
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// A new batch over the columns at `indices`, each retained.
    pub fn project(&self, indices: &[usize]) -> Result<OutputBatch> {
        let schema = Arc::new(self.schema.project(indices)?);
        let columns = indices
            .iter()
            .map(|&idx| {
                self.columns.get(idx).map(Column::retain).ok_or_else(|| {
                    Error::InvalidArgumentError(format!(
                        "projection index {idx} out of range for {} columns",
                        self.columns.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        OutputBatch::new(schema, columns, self.num_rows)
    }

    /// Arrow view of this batch, every column sliced to the batch row count.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .map(|c| c.array_with_len(self.num_rows))
            .collect::<Result<_>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        Ok(RecordBatch::try_new_with_options(
            Arc::clone(&self.schema),
            arrays,
            &options,
        )?)
    }
}
