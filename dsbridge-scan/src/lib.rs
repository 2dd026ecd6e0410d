//! Split scans for dsbridge.
//!
//! A split is one file plus the partition values it carries. Scanning a split
//! is one unit of work: the file's schema is checked against the required
//! schema, null and partition columns are pooled for the whole split, and each
//! physical batch is reconciled into the required layout. [`scan_split`] runs
//! all of it under a task context so pooled buffers are released on every exit
//! path.

pub mod config;
pub mod execute;
pub mod split;

pub use config::{FileSplit, ScanConfig};
pub use execute::{ScanSummary, scan_split};
pub use split::SplitScanner;
