use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A simple cancellation token for cooperative cancellation.
///
/// Clones share the same flag. Computations poll it once per relaxation
/// step or backtracking step and again immediately before publishing.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
