//! Shared value types for dsbridge.
//!
//! - [`PartitionValue`]: the constant a file contributes for one partition
//!   column, with strict broadcasting into Arrow arrays.
//! - [`case_fold`]: locale-invariant case folding used when field names are
//!   matched case-insensitively.

pub mod case_fold;
pub mod partition_value;

pub use case_fold::{eq_ignore_case, fold_case};
pub use partition_value::{HIVE_DEFAULT_PARTITION, PartitionValue};
