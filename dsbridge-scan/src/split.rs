//! Reading one split as a stream of reconciled batches.

use std::sync::Arc;

use dsbridge_column::{
    Column, NullColumnPool, TaskContext, materialize_partition_columns, synthesize_null_columns,
};
use dsbridge_dataset::{DatasetFactory, NormalizedUri, PhysicalBatchReader};
use dsbridge_reconcile::{OutputBatch, Reconciler};
use dsbridge_result::Result;
use tracing::debug;

use crate::config::{FileSplit, ScanConfig};

/// Batches of one split in the configured required layout.
///
/// Holds one reference to each pooled column; the task context holds another
/// and releases it when the unit of work completes.
#[derive(Debug)]
pub struct SplitScanner {
    ctx: Arc<TaskContext>,
    reconciler: Reconciler,
    null_columns: NullColumnPool,
    partition_columns: Vec<Column>,
    reader: PhysicalBatchReader,
}

impl SplitScanner {
    /// Plan the split and open its file.
    ///
    /// Every required field is checked against the file's schema before any
    /// batch is read.
    pub fn open(
        ctx: &Arc<TaskContext>,
        factory: &DatasetFactory,
        split: &FileSplit,
        config: &ScanConfig,
    ) -> Result<Self> {
        config.validate()?;
        let uri = NormalizedUri::parse(&split.uri)?;
        let data_schema = factory.inspect_uri(&uri)?;

        let reconciler = Reconciler::try_new(
            data_schema,
            Arc::clone(&config.required_schema),
            Arc::clone(&config.partition_schema),
            config.reconcile_options(),
        )?;
        let null_columns =
            synthesize_null_columns(ctx, config.batch_size, &reconciler.missing_fields())?;
        let partition_columns = materialize_partition_columns(
            ctx,
            config.batch_size,
            &config.partition_schema,
            &split.partition_values,
        )?;
        let reader = factory.open(&uri)?;

        debug!(
            task_id = ctx.task_id(),
            uri = %uri,
            missing = null_columns.len(),
            partitions = partition_columns.len(),
            "opened split"
        );
        Ok(Self {
            ctx: Arc::clone(ctx),
            reconciler,
            null_columns,
            partition_columns,
            reader,
        })
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn null_columns(&self) -> &NullColumnPool {
        &self.null_columns
    }

    pub fn partition_columns(&self) -> &[Column] {
        &self.partition_columns
    }

    fn next_batch(&mut self) -> Option<Result<OutputBatch>> {
        if let Err(err) = self.ctx.check_interrupted() {
            return Some(Err(err));
        }
        let physical = match self.reader.next()? {
            Ok(batch) => batch,
            Err(err) => return Some(Err(err)),
        };
        Some(self.reconciler.reconcile(
            &self.ctx,
            physical,
            &self.null_columns,
            &self.partition_columns,
        ))
    }
}

impl Iterator for SplitScanner {
    type Item = Result<OutputBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
