//! Error types and result definitions for dsbridge.
//!
//! This crate provides the unified error type ([`Error`]) and result alias
//! ([`Result<T>`]) used throughout the workspace. Every fallible operation, from
//! URI rewriting to per-batch reconciliation, returns `Result<T>`.
//!
//! # Error Categories
//!
//! - **I/O errors** ([`Error::Io`]): opening or reading input files
//! - **Data format errors** ([`Error::Arrow`]): decoding or casting columnar data
//! - **User input errors** ([`Error::InvalidArgumentError`]): empty file lists,
//!   unknown formats, unsupported URI schemes, malformed options
//! - **Schema resolution** ([`Error::AmbiguousFieldMatch`]): case-insensitive
//!   duplicates in the physical schema
//! - **Task-fatal setup and resource errors** ([`Error::MissingNullColumn`],
//!   [`Error::AllocationFailure`], [`Error::PartitionValueMismatch`])
//! - **Cancellation** ([`Error::TaskInterrupted`])
//! - **Internal errors** ([`Error::Internal`]): bugs or reader failures

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
