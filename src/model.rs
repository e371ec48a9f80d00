//! The model capability: the two remote calls the pipeline depends on.
//!
//! Everything the pipeline needs from the generative-AI service is behind
//! [`TableModel`]: "which page ranges hold tables?" and "give me the tables
//! of this document as JSON". Both return the raw reply text; parsing and
//! validation live in [`crate::pipeline`] so a fixture implementation only
//! has to hand back canned text.
//!
//! The production implementation is [`crate::pipeline::llm::LlmTableModel`].

use crate::error::PdfTablesError;
use crate::output::PageRange;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A document (or a page-range slice of one) as sent to the model.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    /// The input file this payload comes from.
    pub source: PathBuf,
    /// Absolute range in `source`; `None` when the whole document is sent.
    pub range: Option<PageRange>,
    /// Page count of the payload itself.
    pub page_count: usize,
    /// Complete PDF bytes of the payload.
    pub bytes: Arc<[u8]>,
}

impl DocumentPayload {
    pub fn whole(source: &Path, page_count: usize, bytes: Arc<[u8]>) -> Self {
        Self {
            source: source.to_path_buf(),
            range: None,
            page_count,
            bytes,
        }
    }

    pub fn slice(source: &Path, range: PageRange, bytes: Vec<u8>) -> Self {
        Self {
            source: source.to_path_buf(),
            range: Some(range),
            page_count: range.len(),
            bytes: bytes.into(),
        }
    }

    /// File name used in prompts and logs, e.g. `rates.pdf [pages 24-30]`.
    pub fn label(&self) -> String {
        let name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string());
        match self.range {
            Some(r) => format!("{name} [pages {r}]"),
            None => name,
        }
    }
}

/// Raw model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Remote table-understanding capability.
///
/// Implementations must be `Send + Sync`: the batch runner shares one model
/// across concurrently processed documents. Errors should be
/// [`PdfTablesError::Api`] so the retry loop can tell transient failures
/// from permanent ones.
pub trait TableModel: Send + Sync {
    /// Ask which page ranges of `document` contain tables.
    fn detect_ranges<'a>(
        &'a self,
        document: &'a DocumentPayload,
    ) -> BoxFuture<'a, Result<ModelReply, PdfTablesError>>;

    /// Ask for the tables of `document` as JSON.
    fn extract_tables<'a>(
        &'a self,
        document: &'a DocumentPayload,
    ) -> BoxFuture<'a, Result<ModelReply, PdfTablesError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_labels() {
        let bytes: Arc<[u8]> = Arc::from(&b"%PDF"[..]);
        let whole = DocumentPayload::whole(Path::new("/data/rates.pdf"), 40, bytes);
        assert_eq!(whole.label(), "rates.pdf");

        let slice = DocumentPayload::slice(Path::new("/data/rates.pdf"), PageRange::new(24, 30), vec![]);
        assert_eq!(slice.label(), "rates.pdf [pages 24-30]");
        assert_eq!(slice.page_count, 7);
    }
}
