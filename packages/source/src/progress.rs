//! Progress reporting for collection runs.
//!
//! The collector reports per-dataset task progress through
//! [`ProgressCallback`] so the CLI can render bars while tests and
//! headless runs stay silent.

use std::sync::Arc;

/// Receives progress updates from a running dataset collection.
///
/// Implementations must be `Send + Sync`: the six dataset collectors run on
/// separate tokio tasks and share one renderer.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of `(region, year)` tasks expected.
    fn set_total(&self, total: u64);

    /// Advances by `delta` completed tasks.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the collection as complete.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
