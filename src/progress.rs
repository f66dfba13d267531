//! Cooperative cancellation and progress reporting.
//!
//! The analysis is meant to run off the interactive thread. The caller keeps
//! a clone of the [`CancellationToken`] and flips it from any thread; the
//! analyzer polls it before each pair and each hotspot iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress callback invoked with (completed pairs, total pairs).
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Thread-safe cancellation flag shared between a caller and a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Fraction of work completed, in `[0, 1]`. Zero total counts as done.
pub fn progress_fraction(completed: u32, total: u32) -> f64 {
    if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    }
}
