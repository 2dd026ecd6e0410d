use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all dsbridge operations.
///
/// Every crate in the workspace returns this enum so failures flow across crate
/// boundaries with `?`. Variants are grouped by who is expected to act on them:
///
/// - **User-facing**: [`Error::InvalidArgumentError`] and [`Error::AmbiguousFieldMatch`]
///   describe a problem with the caller's schema, URI, or options.
/// - **Task-fatal**: [`Error::AllocationFailure`], [`Error::MissingNullColumn`],
///   [`Error::PartitionValueMismatch`] and [`Error::Internal`] abort the unit of work.
///   Cleanup registered with the task context still runs before the error reaches
///   the caller.
///
/// See [`Error::is_task_fatal`] for the classification used by the scan layer.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while opening or reading an input file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Arrow error while decoding, casting, or assembling columnar data.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Invalid user input or API parameter.
    ///
    /// Raised for an empty input file list, an unrecognized format name, an
    /// unsupported URI scheme, malformed format options, and schema shapes that
    /// do not line up with the physical batch.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Case-insensitive resolution found more than one physical field for a
    /// required field name.
    ///
    /// `matched` lists every physical field name that folded to the same key,
    /// in physical schema order.
    #[error(
        "Found duplicate field(s) \"{required}\": [{}] in case-insensitive mode",
        .matched.join(", ")
    )]
    AmbiguousFieldMatch {
        required: String,
        matched: Vec<String>,
    },

    /// A required field has neither a physical column nor a pooled null column.
    ///
    /// The null-column pool must be populated with every required field the
    /// physical schema lacks before batches are reconciled, so this indicates a
    /// setup bug rather than bad data.
    #[error("no null column was synthesized for missing field \"{0}\"")]
    MissingNullColumn(String),

    /// The buffer allocator could not satisfy a reservation.
    #[error(
        "allocation of {requested} bytes failed: {outstanding} bytes outstanding, limit {limit}"
    )]
    AllocationFailure {
        requested: usize,
        outstanding: usize,
        limit: usize,
    },

    /// A partition value does not fit its declared field, or the value tuple
    /// does not line up with the partition schema.
    #[error("partition value mismatch: {0}")]
    PartitionValueMismatch(String),

    /// The unit of work was interrupted before it finished.
    #[error("task interrupted: {0}")]
    TaskInterrupted(String),

    /// Internal error indicating a bug or unexpected state.
    ///
    /// Also used for reader failures from the Parquet and CSV decoders, with a
    /// message naming the step that failed.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid argument error from any displayable value.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsbridge_result::Error;
    ///
    /// fn parse_batch_size(input: &str) -> Result<usize, Error> {
    ///     input.parse::<usize>().map_err(Error::invalid_argument)
    /// }
    ///
    /// assert_eq!(parse_batch_size("42").unwrap(), 42);
    /// assert!(matches!(parse_batch_size("abc"), Err(Error::InvalidArgumentError(_))));
    /// ```
    #[inline]
    pub fn invalid_argument<E: fmt::Display>(err: E) -> Self {
        Error::InvalidArgumentError(err.to_string())
    }

    /// Create an internal error from any displayable value.
    #[inline]
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        Error::Internal(err.to_string())
    }

    /// Whether this error terminates the unit of work rather than describing a
    /// problem the caller can fix and retry.
    ///
    /// ```
    /// use dsbridge_result::Error;
    ///
    /// assert!(Error::MissingNullColumn("b".into()).is_task_fatal());
    /// assert!(!Error::InvalidArgumentError("bad scheme".into()).is_task_fatal());
    /// ```
    pub fn is_task_fatal(&self) -> bool {
        matches!(
            self,
            Error::AllocationFailure { .. }
                | Error::MissingNullColumn(_)
                | Error::PartitionValueMismatch(_)
                | Error::Internal(_)
        )
    }
}
