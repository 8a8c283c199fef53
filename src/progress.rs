//! Progress-callback trait for batch processing events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as [`crate::process::process_batch`] works through its inputs.
//!
//! # Example
//!
//! ```rust
//! use harina::{BatchProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, index: usize, total: usize, _degraded: bool, data_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Reply {}/{} done ({} bytes)", index + 1, total, data_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each reply.
///
/// Items are processed concurrently, so `on_item_start`, `on_item_complete`
/// and `on_item_error` may be called from different threads at once.
/// All methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any reply is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a reply enters the pipeline.
    ///
    /// `index` is the 0-based position of the reply in the batch input.
    fn on_item_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a reply produced output.
    ///
    /// # Arguments
    /// * `index`    — 0-based input position
    /// * `total`    — batch size
    /// * `degraded` — true when the validator fell back to raw text
    /// * `data_len` — byte length of the produced XML or CSV
    fn on_item_complete(&self, index: usize, total: usize, degraded: bool, data_len: usize) {
        let _ = (index, total, degraded, data_len);
    }

    /// Called when a reply failed with a fatal error.
    fn on_item_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every reply has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        degraded: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_item_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _index: usize, _total: usize, degraded: bool, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            if degraded {
                self.degraded.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_item_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_item_start(0, 2);
        cb.on_item_complete(0, 2, false, 42);
        cb.on_item_error(1, 2, "no markup");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_item_start(0, 3);
        tracker.on_item_complete(0, 3, false, 100);
        tracker.on_item_start(1, 3);
        tracker.on_item_complete(1, 3, true, 80);
        tracker.on_item_start(2, 3);
        tracker.on_item_error(2, 3, "no markup");
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.degraded.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 2);
    }
}
