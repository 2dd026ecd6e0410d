//! Constant columns broadcasting a file's partition values.

use arrow::datatypes::Schema;
use dsbridge_result::{Error, Result};
use dsbridge_types::PartitionValue;
use tracing::debug;

use crate::column::Column;
use crate::lifecycle::TaskContext;

/// Allocate one constant column per field of `partition_schema`.
///
/// `values` is aligned positionally with the schema: position `i` supplies the
/// value for field `i`. A length mismatch, a null for a non-nullable field, or
/// a value that does not belong to the field's type is a
/// [`Error::PartitionValueMismatch`].
///
/// The returned handles are the caller's; the task context holds one more
/// reference per column and releases it at completion.
pub fn materialize_partition_columns(
    ctx: &TaskContext,
    row_count: usize,
    partition_schema: &Schema,
    values: &[PartitionValue],
) -> Result<Vec<Column>> {
    let fields = partition_schema.fields();
    if fields.len() != values.len() {
        return Err(Error::PartitionValueMismatch(format!(
            "partition schema has {} fields but {} values were supplied",
            fields.len(),
            values.len()
        )));
    }

    let mut owned = Vec::with_capacity(fields.len());
    let mut columns = Vec::with_capacity(fields.len());
    for (field, value) in fields.iter().zip(values) {
        if value.is_null() && !field.is_nullable() {
            return Err(Error::PartitionValueMismatch(format!(
                "null value for non-nullable partition field \"{}\"",
                field.name()
            )));
        }
        let column = Column::allocate_constant(
            field.name(),
            field.data_type(),
            value.clone(),
            row_count,
            ctx.allocator(),
        )
        .map_err(|err| match err {
            Error::PartitionValueMismatch(msg) => {
                Error::PartitionValueMismatch(format!("field \"{}\": {msg}", field.name()))
            }
            other => other,
        })?;
        columns.push(column.retain());
        owned.push(column);
    }

    if !owned.is_empty() {
        debug!(
            task_id = ctx.task_id(),
            values = ?values.iter().map(PartitionValue::format_display).collect::<Vec<_>>(),
            rows = row_count,
            "materialized partition columns"
        );
    }
    ctx.release_on_completion(owned);
    Ok(columns)
}
