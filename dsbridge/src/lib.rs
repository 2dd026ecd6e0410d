//! dsbridge: columnar batch reconciliation for dataset scans.
//!
//! This crate is the entrypoint for the `dsbridge-*` workspace. It re-exports
//! the pieces a caller needs to scan Parquet or CSV files into batches shaped
//! exactly like a required schema.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use dsbridge::{BufferAllocator, DatasetFactory, FileFormat, FileSplit, ScanConfig, scan_split};
//!
//! let uri = "file:///data/events/dt=2024-06-01/part-0.parquet";
//! let factory = DatasetFactory::new([uri], "parquet".parse::<FileFormat>()?)?;
//! let partition = Arc::new(Schema::new(vec![Field::new("dt", DataType::Utf8, true)]));
//! let config = ScanConfig::new(Arc::new(Schema::new(vec![
//!     Field::new("user_id", DataType::Int64, true),
//!     Field::new("dt", DataType::Utf8, true),
//! ])))
//! .with_partition_schema(Arc::clone(&partition));
//!
//! let split = FileSplit::from_hive_path(uri, &partition)?;
//! let summary = scan_split(0, BufferAllocator::new(), &factory, &split, &config, &mut |batch| {
//!     println!("{} rows", batch.num_rows());
//!     Ok(())
//! })?;
//! println!("{} batches", summary.batches);
//! # Ok::<(), dsbridge::Error>(())
//! ```
//!
//! # Architecture
//!
//! - **Errors** (`dsbridge-result`): one error enum shared by every crate.
//! - **Values** (`dsbridge-types`): partition values and case folding.
//! - **Columns** (`dsbridge-column`): counted column buffers, null and constant
//!   synthesis, and the task lifecycle that releases them.
//! - **Reconciliation** (`dsbridge-reconcile`): field matching and batch assembly.
//! - **Datasets** (`dsbridge-dataset`): URIs, formats and file readers.
//! - **Scans** (`dsbridge-scan`): one unit of work per split.

pub mod cat;

pub use dsbridge_column::{
    BufferAllocator, Column, ColumnKind, NullColumnPool, TaskContext, TaskOutcome,
    materialize_partition_columns, run_task, synthesize_null_columns,
};
pub use dsbridge_dataset::{
    CsvReadOptions, DatasetFactory, FileFormat, NormalizedUri, OrcReadOptions,
    ParquetReadOptions, PhysicalBatchReader, UriScheme, partition_values_from_path, rewrite_uri,
};
pub use dsbridge_reconcile::{
    FieldMatch, FieldMatcher, OutputBatch, PhysicalBatch, ReconcileOptions, Reconciler, assemble,
    match_field,
};
pub use dsbridge_result::{Error, Result};
pub use dsbridge_scan::{FileSplit, ScanConfig, ScanSummary, SplitScanner, scan_split};
pub use dsbridge_types::{HIVE_DEFAULT_PARTITION, PartitionValue};
