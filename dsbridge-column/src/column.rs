//! Reference-counted column buffers.
//!
//! A [`Column`] is one counted reference to a shared buffer. [`Column::retain`]
//! adds a reference and hands back a new handle; [`Column::release`] (or simply
//! dropping the handle) gives one back. The buffer and its allocator
//! reservation are freed when the last reference is released. Because
//! `release` consumes the handle, the same reference can never be released
//! twice.
//!
//! Pooled null and constant columns are shared by many output batches. Each
//! output batch holds its own retained handle, so dropping a batch never frees a
//! column that the pool or another batch still references.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering, fence};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arrow::array::{Array, ArrayRef, new_null_array};
use arrow::datatypes::DataType;
use dsbridge_result::{Error, Result};
use dsbridge_types::PartitionValue;
use tracing::trace;

use crate::allocator::{BufferAllocator, Reservation};

/// Where a column's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Decoded from a physical batch.
    Data,
    /// Synthesized all-null stand-in for a field the file lacks.
    Null,
    /// Broadcast of a single partition value.
    Constant,
}

/// How to rebuild a buffer when a pooled column has to grow.
#[derive(Debug)]
enum Fill {
    Data,
    Null,
    Constant(PartitionValue),
}

impl Fill {
    fn kind(&self) -> ColumnKind {
        match self {
            Fill::Data => ColumnKind::Data,
            Fill::Null => ColumnKind::Null,
            Fill::Constant(_) => ColumnKind::Constant,
        }
    }
}

struct ColumnState {
    buffer: Option<ArrayRef>,
    reservation: Option<Reservation>,
    value_count: usize,
}

struct ColumnInner {
    name: String,
    data_type: DataType,
    fill: Fill,
    ref_count: AtomicUsize,
    allocator: Arc<BufferAllocator>,
    state: Mutex<ColumnState>,
}

impl ColumnInner {
    fn lock_state(&self) -> MutexGuard<'_, ColumnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn materialize(&self, len: usize) -> Result<ArrayRef> {
        match &self.fill {
            Fill::Null => Ok(new_null_array(&self.data_type, len)),
            Fill::Constant(value) => value.to_array(&self.data_type, len),
            Fill::Data => Err(Error::Internal(format!(
                "decoded column '{}' cannot be re-materialized",
                self.name
            ))),
        }
    }
}

/// One counted reference to a shared column buffer.
pub struct Column {
    inner: Arc<ColumnInner>,
}

impl Column {
    fn new(
        name: impl Into<String>,
        data_type: DataType,
        fill: Fill,
        buffer: ArrayRef,
        value_count: usize,
        allocator: &Arc<BufferAllocator>,
    ) -> Result<Self> {
        let reservation = allocator.reserve(buffer.get_array_memory_size())?;
        let name = name.into();
        trace!(
            column = %name,
            kind = ?fill.kind(),
            rows = buffer.len(),
            bytes = reservation.bytes(),
            "column buffer allocated"
        );
        Ok(Self {
            inner: Arc::new(ColumnInner {
                name,
                data_type,
                fill,
                ref_count: AtomicUsize::new(1),
                allocator: Arc::clone(allocator),
                state: Mutex::new(ColumnState {
                    buffer: Some(buffer),
                    reservation: Some(reservation),
                    value_count,
                }),
            }),
        })
    }

    /// Wrap a decoded physical array. The column reports every decoded value.
    pub fn from_array(
        name: impl Into<String>,
        array: ArrayRef,
        allocator: &Arc<BufferAllocator>,
    ) -> Result<Self> {
        let data_type = array.data_type().clone();
        let rows = array.len();
        Self::new(name, data_type, Fill::Data, array, rows, allocator)
    }

    /// Allocate an all-null column able to hold `rows` values.
    ///
    /// The buffer is allocated and null-filled first; the reported value count
    /// is fixed afterwards.
    pub fn allocate_null(
        name: impl Into<String>,
        data_type: &DataType,
        rows: usize,
        allocator: &Arc<BufferAllocator>,
    ) -> Result<Self> {
        let buffer = new_null_array(data_type, rows);
        let column = Self::new(name, data_type.clone(), Fill::Null, buffer, 0, allocator)?;
        column.set_value_count(rows)?;
        Ok(column)
    }

    /// Allocate a constant column holding `value` in each of `rows` slots.
    pub fn allocate_constant(
        name: impl Into<String>,
        data_type: &DataType,
        value: PartitionValue,
        rows: usize,
        allocator: &Arc<BufferAllocator>,
    ) -> Result<Self> {
        let buffer = value.to_array(data_type, rows)?;
        let column = Self::new(
            name,
            data_type.clone(),
            Fill::Constant(value),
            buffer,
            0,
            allocator,
        )?;
        column.set_value_count(rows)?;
        Ok(column)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.inner.data_type
    }

    pub fn kind(&self) -> ColumnKind {
        self.inner.fill.kind()
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.inner.fill, Fill::Constant(_))
    }

    /// The constant this column broadcasts, if it is a constant column.
    pub fn constant_value(&self) -> Option<&PartitionValue> {
        match &self.inner.fill {
            Fill::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Number of live references to the shared buffer.
    pub fn ref_count(&self) -> usize {
        self.inner.ref_count.load(Ordering::Acquire)
    }

    /// Whether two handles reference the same buffer.
    pub fn same_buffer(&self, other: &Column) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of values this column currently reports.
    pub fn value_count(&self) -> usize {
        self.inner.lock_state().value_count
    }

    /// Number of values the current buffer holds.
    pub fn capacity(&self) -> usize {
        self.inner
            .lock_state()
            .buffer
            .as_ref()
            .map_or(0, |buffer| buffer.len())
    }

    /// Bytes reserved for the current buffer.
    pub fn reserved_bytes(&self) -> usize {
        self.inner
            .lock_state()
            .reservation
            .as_ref()
            .map_or(0, Reservation::bytes)
    }

    /// Add a reference and return a handle that owns it.
    #[must_use = "dropping the retained handle releases the reference immediately"]
    pub fn retain(&self) -> Column {
        self.inner.ref_count.fetch_add(1, Ordering::Relaxed);
        Column {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give this reference back. Frees the buffer when it was the last one.
    pub fn release(self) {
        drop(self);
    }

    /// Refresh the number of values this column reports.
    ///
    /// Every handle sharing the buffer observes the new count. Null and
    /// constant columns grow their buffer when `count` exceeds the capacity;
    /// decoded columns cannot report more values than were decoded.
    pub fn set_value_count(&self, count: usize) -> Result<()> {
        let mut state = self.inner.lock_state();
        let capacity = state.buffer.as_ref().map_or(0, |buffer| buffer.len());
        if count > capacity {
            if matches!(self.inner.fill, Fill::Data) {
                return Err(Error::InvalidArgumentError(format!(
                    "column '{}' holds {capacity} decoded values, cannot report {count}",
                    self.inner.name
                )));
            }
            let grown = self.inner.materialize(count)?;
            let reservation = self.inner.allocator.reserve(grown.get_array_memory_size())?;
            trace!(
                column = %self.inner.name,
                from = capacity,
                to = count,
                bytes = reservation.bytes(),
                "column buffer grown"
            );
            state.buffer = Some(grown);
            state.reservation = Some(reservation);
        }
        state.value_count = count;
        Ok(())
    }

    /// The buffer sliced to the reported value count.
    pub fn array(&self) -> Result<ArrayRef> {
        let state = self.inner.lock_state();
        Self::slice(&self.inner.name, &state, state.value_count)
    }

    /// The buffer sliced to exactly `len` values.
    pub fn array_with_len(&self, len: usize) -> Result<ArrayRef> {
        let state = self.inner.lock_state();
        Self::slice(&self.inner.name, &state, len)
    }

    fn slice(name: &str, state: &ColumnState, len: usize) -> Result<ArrayRef> {
        let buffer = state
            .buffer
            .as_ref()
            .ok_or_else(|| Error::Internal(format!("column '{name}' was already released")))?;
        if len > buffer.len() {
            return Err(Error::InvalidArgumentError(format!(
                "column '{name}' holds {} values, {len} requested",
                buffer.len()
            )));
        }
        if len == buffer.len() {
            return Ok(Arc::clone(buffer));
        }
        Ok(buffer.slice(0, len))
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.inner.ref_count.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);

        let mut state = self.inner.lock_state();
        state.buffer = None;
        if let Some(reservation) = state.reservation.take() {
            trace!(
                column = %self.inner.name,
                bytes = reservation.bytes(),
                "column buffer released"
            );
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.inner.name)
            .field("data_type", &self.inner.data_type)
            .field("kind", &self.kind())
            .field("ref_count", &self.ref_count())
            .field("value_count", &self.value_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Int32Array};
    use arrow::datatypes::Int32Type;

    #[test]
    fn retain_and_release_balance() {
        let allocator = BufferAllocator::new();
        let column = Column::allocate_null("x", &DataType::Int64, 8, &allocator).unwrap();
        assert!(allocator.outstanding_bytes() > 0);

        let shared = column.retain();
        assert_eq!(column.ref_count(), 2);
        assert!(column.same_buffer(&shared));

        column.release();
        assert_eq!(shared.ref_count(), 1);
        assert!(allocator.outstanding_bytes() > 0);

        shared.release();
        assert_eq!(allocator.outstanding_bytes(), 0);
    }

    #[test]
    fn null_column_reports_all_null() {
        let allocator = BufferAllocator::new();
        let column = Column::allocate_null("x", &DataType::Utf8, 5, &allocator).unwrap();
        assert_eq!(column.kind(), ColumnKind::Null);
        assert_eq!(column.value_count(), 5);
        let array = column.array().unwrap();
        assert_eq!(array.len(), 5);
        assert!((0..5).all(|row| array.is_null(row)));
    }

    #[test]
    fn refresh_last_write_wins_and_siblings_stay_valid() {
        let allocator = BufferAllocator::new();
        let column = Column::allocate_null("x", &DataType::Int32, 4, &allocator).unwrap();
        let sibling = column.retain();

        column.set_value_count(2).unwrap();
        column.set_value_count(3).unwrap();
        assert_eq!(column.value_count(), 3);
        assert_eq!(sibling.value_count(), 3);
        assert_eq!(sibling.array().unwrap().len(), 3);
        assert_eq!(sibling.capacity(), 4);
    }

    #[test]
    fn pooled_column_grows_past_capacity() {
        let allocator = BufferAllocator::new();
        let column = Column::allocate_constant(
            "p",
            &DataType::Int32,
            PartitionValue::Int(9),
            2,
            &allocator,
        )
        .unwrap();
        let before = allocator.outstanding_bytes();

        column.set_value_count(6).unwrap();
        assert_eq!(column.capacity(), 6);
        assert!(allocator.outstanding_bytes() >= before);
        let array = column.array().unwrap();
        assert!(array.as_primitive::<Int32Type>().values().iter().all(|v| *v == 9));

        drop(column);
        assert_eq!(allocator.outstanding_bytes(), 0);
    }

    #[test]
    fn decoded_column_cannot_grow() {
        let allocator = BufferAllocator::new();
        let column =
            Column::from_array("a", Arc::new(Int32Array::from(vec![1, 2, 3])), &allocator).unwrap();
        assert_eq!(column.value_count(), 3);
        assert!(matches!(
            column.set_value_count(4),
            Err(Error::InvalidArgumentError(_))
        ));
        column.set_value_count(2).unwrap();
        assert_eq!(column.array().unwrap().len(), 2);
        assert_eq!(column.array_with_len(3).unwrap().len(), 3);
    }

    #[test]
    fn allocation_failure_surfaces() {
        let allocator = BufferAllocator::with_limit(16);
        let err = Column::allocate_null("big", &DataType::Int64, 10_000, &allocator).unwrap_err();
        assert!(matches!(err, Error::AllocationFailure { .. }));
        assert_eq!(allocator.outstanding_bytes(), 0);
    }
}
