//! Reference-counted column buffers and their unit-of-work lifecycle.
//!
//! This crate owns every buffer the reconciliation engine hands out:
//!
//! - [`Column`]: a counted handle to a shared Arrow buffer with explicit
//!   [`Column::retain`] / [`Column::release`] and a refreshable value count.
//! - [`BufferAllocator`]: thread-safe byte accounting with an optional limit,
//!   shared by all units of work.
//! - [`TaskContext`] and [`run_task`]: the completion-action list that frees
//!   task-scoped buffers exactly once, on success, failure, or panic.
//! - [`synthesize_null_columns`] and [`materialize_partition_columns`]: the
//!   pooled all-null and constant columns reused across every batch of a split.
//!
//! # Reference discipline
//!
//! Pooled columns start with two references: one owned by the pool (or the
//! returned `Vec`) and one owned by the task context. Every output batch that
//! attaches a pooled column retains it first, so releasing the batch only
//! returns the batch's own reference.

pub mod allocator;
pub mod column;
pub mod lifecycle;
pub mod null_column;
pub mod partition_column;

pub use allocator::{AllocatorStats, BufferAllocator, Reservation};
pub use column::{Column, ColumnKind};
pub use lifecycle::{TaskContext, TaskOutcome, run_task};
pub use null_column::{NullColumnPool, synthesize_null_columns};
pub use partition_column::materialize_partition_columns;
