//! Reconciliation of physical batches with a caller's required schema.
//!
//! A file reader yields [`PhysicalBatch`]es in the file's own layout. This crate
//! turns each of them into an [`OutputBatch`] whose columns follow the required
//! schema: physical columns are matched by name under the configured case
//! sensitivity, fields the file lacks are served from a pool of null columns,
//! and partition columns are broadcast constants shared across batches.
//!
//! ```
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int32Array, RecordBatch};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use dsbridge_column::{BufferAllocator, NullColumnPool, TaskContext};
//! use dsbridge_reconcile::{PhysicalBatch, ReconcileOptions, Reconciler};
//!
//! let data = Arc::new(Schema::new(vec![Field::new("ID", DataType::Int32, false)]));
//! let required = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)]));
//! let reconciler = Reconciler::try_new(
//!     data.clone(),
//!     required,
//!     Arc::new(Schema::empty()),
//!     ReconcileOptions::default(),
//! )
//! .unwrap();
//!
//! let ctx = TaskContext::new(0, BufferAllocator::new());
//! let ids: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
//! let batch = PhysicalBatch::new(RecordBatch::try_new(data, vec![ids]).unwrap());
//! let out = reconciler.reconcile(&ctx, batch, &NullColumnPool::empty(), &[]).unwrap();
//! assert_eq!(out.schema().field(0).name(), "id");
//! assert_eq!(out.num_rows(), 2);
//! ```

pub mod assembler;
pub mod matcher;
pub mod output;
pub mod physical;

pub use assembler::{FieldSource, ReconcileOptions, Reconciler, assemble};
pub use matcher::{FieldMatch, FieldMatcher, match_field};
pub use output::OutputBatch;
pub use physical::PhysicalBatch;
