//! Shared fixtures for the integration tests: generated PDFs and a scripted
//! table model that never touches the network.

#![allow(dead_code)]

use edgequake_pdftables::pipeline::load::testing;
use edgequake_pdftables::{DocumentPayload, ModelReply, PageRange, PdfTablesError, TableModel};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// A generated PDF of `pages` pages whose page dictionaries carry their
/// original page number as `Marker`.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    testing::sample_pdf(pages).expect("generate sample pdf")
}

/// Write a generated PDF of `pages` pages to `dir/name`.
pub fn write_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create pdf dir");
    }
    std::fs::write(&path, sample_pdf(pages)).expect("write pdf");
    path
}

/// Original page numbers (the `Marker` entries) of a PDF, in page order.
pub fn page_markers(bytes: &[u8]) -> Vec<i64> {
    testing::page_markers(bytes).expect("page markers")
}

// ── Scripted model ───────────────────────────────────────────────────────────

type Script = Box<dyn Fn(&DocumentPayload) -> Result<String, PdfTablesError> + Send + Sync>;

/// What the scripted model saw in one extraction call.
#[derive(Debug, Clone)]
pub struct SeenUnit {
    pub source: PathBuf,
    pub range: Option<PageRange>,
    pub page_count: usize,
    pub markers: Vec<i64>,
}

/// A [`TableModel`] answering from closures and recording every call.
pub struct ScriptedModel {
    detect: Script,
    extract: Script,
    pub detect_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
    pub seen: Mutex<Vec<SeenUnit>>,
}

impl ScriptedModel {
    pub fn new<D, E>(detect: D, extract: E) -> Self
    where
        D: Fn(&DocumentPayload) -> Result<String, PdfTablesError> + Send + Sync + 'static,
        E: Fn(&DocumentPayload) -> Result<String, PdfTablesError> + Send + Sync + 'static,
    {
        Self {
            detect: Box::new(detect),
            extract: Box::new(extract),
            detect_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fixed replies for both calls.
    pub fn fixed(detect: &'static str, extract: &'static str) -> Self {
        Self::new(move |_| Ok(detect.to_string()), move |_| Ok(extract.to_string()))
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenUnit> {
        self.seen.lock().expect("seen lock").clone()
    }
}

impl TableModel for ScriptedModel {
    fn detect_ranges<'a>(
        &'a self,
        document: &'a DocumentPayload,
    ) -> BoxFuture<'a, Result<ModelReply, PdfTablesError>> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let reply = (self.detect)(document).map(ModelReply::text);
        async move { reply }.boxed()
    }

    fn extract_tables<'a>(
        &'a self,
        document: &'a DocumentPayload,
    ) -> BoxFuture<'a, Result<ModelReply, PdfTablesError>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("seen lock").push(SeenUnit {
            source: document.source.clone(),
            range: document.range,
            page_count: document.page_count,
            markers: page_markers(&document.bytes),
        });
        let reply = (self.extract)(document).map(ModelReply::text);
        async move { reply }.boxed()
    }
}

/// Detection must not run for this test.
pub fn no_detection(_: &DocumentPayload) -> Result<String, PdfTablesError> {
    Err(PdfTablesError::Internal("range detection was not expected".into()))
}
