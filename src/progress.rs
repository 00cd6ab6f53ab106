//! Progress-callback trait for per-resume trawl events.
//!
//! Inject an [`Arc<dyn TrawlProgressCallback>`] via
//! [`crate::config::TrawlConfigBuilder::progress_callback`] to receive events
//! as the orchestrator works through a folder. The CLI uses it to drive its
//! progress bar; library callers can forward events anywhere they like.
//!
//! # Example
//!
//! ```rust
//! use resume_trawler::{ResumeRow, TrawlConfig, TrawlProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl TrawlProgressCallback for FailureCounter {
//!     fn on_resume_complete(&self, _index: usize, _total: usize, row: &ResumeRow) {
//!         if !row.is_success() {
//!             self.failed.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failed: AtomicUsize::new(0) });
//! let config = TrawlConfig::builder()
//!     .progress_callback(counter as Arc<dyn TrawlProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::report::ResumeRow;
use std::sync::Arc;

/// Called by the orchestrator as it processes each resume.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1`,
/// `on_resume_start` may be called from several tasks at once. All methods
/// have default no-op implementations.
pub trait TrawlProgressCallback: Send + Sync {
    /// Called once before the first resume, with the number discovered.
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a resume is rasterised.
    ///
    /// `index` is 1-based in discovery order.
    fn on_resume_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when a resume's row is final, whatever its status.
    fn on_resume_complete(&self, index: usize, total: usize, row: &ResumeRow) {
        let _ = (index, total, row);
    }

    /// Called once after every resume has been attempted.
    fn on_run_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TrawlProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TrawlConfig`].
pub type ProgressCallback = Arc<dyn TrawlProgressCallback>;
