//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the batch runner moves each document through the pipeline.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftables::{BatchProgressCallback, ExtractionConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, path: &Path, artifacts: usize) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("#{index} {} → {artifacts} files", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::DocumentState;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch runner as it processes each document.
///
/// `index` is the 1-based position of the document in the batch. With
/// `concurrency > 1` events of different documents interleave and may come
/// from different threads, so implementations must synchronise shared state.
/// All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first document is loaded.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document enters the pipeline.
    fn on_document_start(&self, index: usize, path: &Path) {
        let _ = (index, path);
    }

    /// Called on every state transition of a document.
    fn on_document_state(&self, index: usize, path: &Path, state: DocumentState) {
        let _ = (index, path, state);
    }

    /// Called when every artifact of a document has been written.
    fn on_document_complete(&self, index: usize, path: &Path, artifacts: usize) {
        let _ = (index, path, artifacts);
    }

    /// Called when a document fails.
    fn on_document_error(&self, index: usize, path: &Path, error: &str) {
        let _ = (index, path, error);
    }

    /// Called once after all documents have been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
