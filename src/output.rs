//! Output types: page ranges, extracted tables and run reports.

use crate::error::{ErrorKind, PdfTablesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// An inclusive, 1-indexed span of pages believed to contain tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Create a range without validating it; see
    /// [`crate::pipeline::split::validate_ranges`].
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The implicit range covering a whole document.
    pub fn whole(page_count: usize) -> Self {
        Self::new(1, page_count)
    }

    /// Number of pages in the range (0 if reversed).
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, page: usize) -> bool {
        page >= self.start && page <= self.end
    }

    pub fn overlaps(&self, other: &PageRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One table row: column name → scalar cell value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The tables found on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageTable {
    /// 1-indexed page number in the source document.
    pub page: usize,
    pub table: Vec<Row>,
}

/// The persisted output shape: `[{"page": n, "table": [{…}, …]}, …]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    pub pages: Vec<PageTable>,
}

impl ExtractionResult {
    pub fn total_rows(&self) -> usize {
        self.pages.iter().map(|p| p.table.len()).sum()
    }

    /// Shift page numbers from sub-document–relative to absolute, given the
    /// range the sub-document was cut from.
    pub fn rebase(&mut self, range: PageRange) {
        for page in &mut self.pages {
            page.page = range.start + page.page - 1;
        }
    }
}

/// Where a document currently is in the pipeline.
///
/// `Loaded → RangesDetected → Split → Extracted → Written`; `Split` is
/// skipped for documents at or under the split threshold. The first
/// unrecovered error moves the document to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Loaded,
    RangesDetected,
    Split,
    Extracted,
    Written,
    Failed(ErrorKind),
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentState::Written | DocumentState::Failed(_))
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentState::Pending => f.write_str("pending"),
            DocumentState::Loaded => f.write_str("loaded"),
            DocumentState::RangesDetected => f.write_str("ranges detected"),
            DocumentState::Split => f.write_str("split"),
            DocumentState::Extracted => f.write_str("extracted"),
            DocumentState::Written => f.write_str("written"),
            DocumentState::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// Result of extracting one unit (whole document or one sub-document).
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutput {
    /// Absolute page range of the unit in the source document.
    pub range: PageRange,
    /// Whether the unit is a split-out sub-document.
    pub split: bool,
    pub result: ExtractionResult,
    /// Artifact path (set once written).
    pub artifact: Option<PathBuf>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Successful conversion of one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutput {
    pub source: PathBuf,
    pub page_count: usize,
    /// Ranges the units were cut from (`[1, page_count]` when not split).
    pub ranges: Vec<PageRange>,
    pub units: Vec<UnitOutput>,
    /// Tokens spent on range detection (zero when not split).
    pub detection_input_tokens: usize,
    pub detection_output_tokens: usize,
    pub duration_ms: u64,
}

impl DocumentOutput {
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.units.iter().filter_map(|u| u.artifact.clone()).collect()
    }

    pub fn was_split(&self) -> bool {
        self.units.iter().any(|u| u.split)
    }
}

/// Per-document entry of a [`BatchReport`].
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub input: PathBuf,
    pub state: DocumentState,
    pub page_count: Option<usize>,
    pub ranges: Vec<PageRange>,
    pub artifacts: Vec<PathBuf>,
    pub pages_with_tables: usize,
    pub rows: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub hint: Option<String>,
}

impl DocumentReport {
    pub fn succeeded(&self) -> bool {
        self.state == DocumentState::Written
    }

    pub(crate) fn from_output(output: &DocumentOutput) -> Self {
        Self {
            input: output.source.clone(),
            state: DocumentState::Written,
            page_count: Some(output.page_count),
            ranges: output.ranges.clone(),
            artifacts: output.artifacts(),
            pages_with_tables: output.units.iter().map(|u| u.result.pages.len()).sum(),
            rows: output.units.iter().map(|u| u.result.total_rows()).sum(),
            input_tokens: output.detection_input_tokens
                + output.units.iter().map(|u| u.input_tokens).sum::<usize>(),
            output_tokens: output.detection_output_tokens
                + output.units.iter().map(|u| u.output_tokens).sum::<usize>(),
            duration_ms: output.duration_ms,
            error: None,
            hint: None,
        }
    }

    pub(crate) fn failed(input: PathBuf, error: &PdfTablesError, duration_ms: u64) -> Self {
        Self {
            input,
            state: DocumentState::Failed(error.kind()),
            page_count: None,
            ranges: Vec::new(),
            artifacts: Vec::new(),
            pages_with_tables: 0,
            rows: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            error: Some(error.to_string()),
            hint: error.hint().map(str::to_string),
        }
    }
}

/// Outcome of a whole batch run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    /// True when every document reached `Written`.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}
