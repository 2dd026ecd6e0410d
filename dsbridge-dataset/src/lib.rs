//! File-level collaborators of a dsbridge scan.
//!
//! - [`uri`]: normalization of `s3`/`s3a`, `hdfs` and `file` URIs.
//! - [`format`]: format names and per-format read options.
//! - [`factory`]: schema discovery and batch readers for local files.
//! - [`partition`]: Hive-style `key=value` path segments.

pub mod factory;
pub mod format;
pub mod partition;
pub mod uri;

pub use factory::{DatasetFactory, PhysicalBatchReader};
pub use format::{
    CsvReadOptions, DEFAULT_BATCH_SIZE, FileFormat, OrcReadOptions, ParquetReadOptions,
};
pub use partition::partition_values_from_path;
pub use uri::{NormalizedUri, UriScheme, rewrite_uri};
