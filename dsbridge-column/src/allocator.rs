//! Byte accounting for column buffers.
//!
//! Arrow owns the actual memory; the allocator tracks how many bytes are held
//! by live column buffers and enforces an optional ceiling. One allocator is
//! normally shared by every unit of work in the process, so all counters are
//! atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dsbridge_result::{Error, Result};

/// Thread-safe allocation counters.
#[derive(Debug, Default)]
pub struct AllocatorStats {
    pub allocations: AtomicU64,
    pub releases: AtomicU64,
    pub failures: AtomicU64,
}

/// Shared accounting for column buffer memory.
#[derive(Debug, Default)]
pub struct BufferAllocator {
    limit: Option<usize>,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    stats: AllocatorStats,
}

impl BufferAllocator {
    /// An allocator without a byte limit.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An allocator that refuses reservations once `limit` bytes are held.
    pub fn with_limit(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit: Some(limit),
            ..Self::default()
        })
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Bytes currently held by live reservations.
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Highest value `outstanding_bytes` has reached.
    pub fn peak_bytes(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &AllocatorStats {
        &self.stats
    }

    /// Reserve `bytes` for a buffer. The bytes return to the allocator when the
    /// returned [`Reservation`] is dropped.
    pub fn reserve(self: &Arc<Self>, bytes: usize) -> Result<Reservation> {
        let mut current = self.outstanding.load(Ordering::Acquire);
        let next = loop {
            let next = current.checked_add(bytes).ok_or_else(|| {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Error::AllocationFailure {
                    requested: bytes,
                    outstanding: current,
                    limit: self.limit.unwrap_or(usize::MAX),
                }
            })?;
            if let Some(limit) = self.limit
                && next > limit
            {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                return Err(Error::AllocationFailure {
                    requested: bytes,
                    outstanding: current,
                    limit,
                });
            }
            match self.outstanding.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break next,
                Err(actual) => current = actual,
            }
        };

        self.peak.fetch_max(next, Ordering::AcqRel);
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(Reservation {
            allocator: Arc::clone(self),
            bytes,
        })
    }
}

/// Bytes held on behalf of one column buffer.
#[derive(Debug)]
pub struct Reservation {
    allocator: Arc<BufferAllocator>,
    bytes: usize,
}

impl Reservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.allocator
            .outstanding
            .fetch_sub(self.bytes, Ordering::AcqRel);
        self.allocator
            .stats
            .releases
            .fetch_add(1, Ordering::Relaxed);
    }
}
