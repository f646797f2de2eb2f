//! Progress reporting for pipeline runs.
//!
//! The pipeline reports through [`ProgressCallback`] so that the library
//! never depends on a terminal. The CLI plugs in `indicatif` bars; tests and
//! embedders use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates while a batch of trips is processed.
pub trait ProgressCallback: Send + Sync {
    /// Set the number of trips in the batch.
    fn set_total(&self, total: u64);

    /// Advance by `delta` trips.
    fn inc(&self, delta: u64);

    /// Replace the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the batch as done.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Shared [`NullProgress`] handle.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
