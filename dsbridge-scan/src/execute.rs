use std::sync::Arc;

use dsbridge_column::{BufferAllocator, run_task};
use dsbridge_dataset::DatasetFactory;
use dsbridge_reconcile::OutputBatch;
use dsbridge_result::Result;
use tracing::info;

use crate::config::{FileSplit, ScanConfig};
use crate::split::SplitScanner;

/// Totals for one scanned split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub batches: usize,
    pub rows: usize,
}

/// Scan `split` as one unit of work, handing each batch to `on_batch`.
///
/// Every buffer the scan allocates is released before this returns, whether
/// the scan succeeds, fails, or `on_batch` panics.
pub fn scan_split<F>(
    task_id: u64,
    allocator: Arc<BufferAllocator>,
    factory: &DatasetFactory,
    split: &FileSplit,
    config: &ScanConfig,
    on_batch: &mut F,
) -> Result<ScanSummary>
where
    F: FnMut(OutputBatch) -> Result<()>,
{
    let summary = run_task(task_id, allocator, |ctx| {
        let mut summary = ScanSummary::default();
        for batch in SplitScanner::open(ctx, factory, split, config)? {
            let batch = batch?;
            summary.batches += 1;
            summary.rows += batch.num_rows();
            on_batch(batch)?;
        }
        Ok(summary)
    })?;

    info!(
        task_id,
        uri = %split.uri,
        batches = summary.batches,
        rows = summary.rows,
        "scanned split"
    );
    Ok(summary)
}
