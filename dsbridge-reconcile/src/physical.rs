//! Owned handle over one batch produced by a file reader.

use std::sync::Arc;

use arrow::array::Array;
use arrow::compute::cast_with_options;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use dsbridge_column::{BufferAllocator, Column};
use dsbridge_result::{Error, Result};
use tracing::trace;

use crate::assembler::strict_cast;

/// A batch of rows exactly as a reader decoded it from storage.
///
/// Consumed by [`PhysicalBatch::decode`]; nothing reads from it afterwards.
#[derive(Debug)]
pub struct PhysicalBatch {
    batch: RecordBatch,
}

impl PhysicalBatch {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Wrap every physical column as a [`Column`] typed per `data_schema`.
    ///
    /// Columns are taken positionally. A column whose decoded type differs from
    /// its `data_schema` field is cast; a value the cast cannot represent is an
    /// error, never a null. The batch is released before this
    /// returns, on success and on error.
    pub fn decode(
        self,
        data_schema: &Schema,
        allocator: &Arc<BufferAllocator>,
    ) -> Result<Vec<Column>> {
        let fields = data_schema.fields();
        if fields.len() != self.batch.num_columns() {
            return Err(Error::InvalidArgumentError(format!(
                "data schema has {} fields but the physical batch has {} columns",
                fields.len(),
                self.batch.num_columns()
            )));
        }

        let rows = self.batch.num_rows();
        let mut columns = Vec::with_capacity(fields.len());
        for (field, array) in fields.iter().zip(self.batch.columns()) {
            let array = if array.data_type() == field.data_type() {
                Arc::clone(array)
            } else {
                cast_with_options(array, field.data_type(), &strict_cast())?
            };
            columns.push(Column::from_array(field.name(), array, allocator)?);
        }
        trace!(rows, columns = columns.len(), "physical batch decoded and released");
        Ok(columns)
    }
}

impl From<RecordBatch> for PhysicalBatch {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}
