//! Phase-scoped concurrency ceiling.
//!
//! [`ConcurrencyLimiter`] wraps a Tokio semaphore and records how many
//! permits are held at once, so tests can assert the ceiling was never
//! exceeded. A new limiter is built for every phase; phases never share
//! budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Error type for limiter construction and acquisition.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// Ceiling of zero would deadlock every phase.
    #[error("invalid concurrency value {value}: must be at least 1")]
    InvalidCeiling {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("concurrency limiter closed unexpectedly")]
    Closed,
}

#[derive(Debug)]
struct LimiterInner {
    semaphore: Arc<Semaphore>,
    ceiling: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Counting limiter that caps in-flight identities within one phase.
///
/// Cloning shares the same budget.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<LimiterInner>,
}

/// A held slot. The slot is released when this guard drops.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    inner: Arc<LimiterInner>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing at most `ceiling` concurrent permits.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidCeiling`] when `ceiling` is zero.
    pub fn new(ceiling: usize) -> Result<Self, LimiterError> {
        if ceiling == 0 {
            return Err(LimiterError::InvalidCeiling { value: ceiling });
        }
        Ok(Self {
            inner: Arc::new(LimiterInner {
                semaphore: Arc::new(Semaphore::new(ceiling)),
                ceiling,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        })
    }

    /// Waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::Closed`] if the underlying semaphore was closed.
    pub async fn acquire(&self) -> Result<LimiterPermit, LimiterError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed)?;

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        trace!(in_flight = now, ceiling = self.inner.ceiling, "slot acquired");

        Ok(LimiterPermit {
            _permit: permit,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Returns the number of slots currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the highest number of slots held at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}
