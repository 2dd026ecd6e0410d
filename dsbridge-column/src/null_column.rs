//! All-null stand-ins for fields a physical file does not contain.

use arrow::datatypes::Schema;
use dsbridge_result::Result;
use tracing::debug;

use crate::column::Column;
use crate::lifecycle::TaskContext;

/// Null columns synthesized once per unit of work and shared by every batch
/// reconciled under it.
///
/// The pool holds one reference per column; the task context holds another and
/// releases it at completion.
#[derive(Debug, Default)]
pub struct NullColumnPool {
    columns: Vec<Column>,
}

impl NullColumnPool {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Field names in synthesis order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// Allocate one all-null column of `row_count` values per field of `schema`.
///
/// Each column is registered with `ctx` for release when the unit of work
/// completes.
pub fn synthesize_null_columns(
    ctx: &TaskContext,
    row_count: usize,
    schema: &Schema,
) -> Result<NullColumnPool> {
    let mut owned = Vec::with_capacity(schema.fields().len());
    let mut pool = NullColumnPool::default();
    for field in schema.fields() {
        let column =
            Column::allocate_null(field.name(), field.data_type(), row_count, ctx.allocator())?;
        pool.columns.push(column.retain());
        owned.push(column);
    }

    if !owned.is_empty() {
        debug!(
            task_id = ctx.task_id(),
            columns = ?pool.names(),
            rows = row_count,
            "synthesized null columns"
        );
    }
    ctx.release_on_completion(owned);
    Ok(pool)
}
