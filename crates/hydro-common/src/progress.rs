//! Progress reporting and cooperative cancellation for long-running imports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives best-effort progress updates from a long-running operation.
///
/// Implementations must not block: updates are delivered on the importing
/// job's own execution context, and a slow sink would stall the pipeline.
pub trait ProgressSink: Send + Sync {
    /// Report completion percentage (0-100) with a status message.
    fn report(&self, percent: u8, message: &str);
}

/// Cooperative cancellation flag, polled at suspension points.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread, more than once.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
