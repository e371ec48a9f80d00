//! # edgequake-pdftables
//!
//! Find the tables in PDF documents and convert them to structured JSON
//! with a multimodal LLM.
//!
//! ## Why this crate?
//!
//! Layout-based table extractors guess column boundaries from glyph
//! positions and break on merged cells, rotated headers and scanned pages.
//! This crate instead hands the PDF itself to a model that reads it the way
//! a person does, and validates what comes back against a fixed schema:
//!
//! ```json
//! [{"page": 2, "table": [{"name": "A", "amount": 1}, {"name": "B", "amount": 2}]}]
//! ```
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Load     read + parse with lopdf, count pages (spawn_blocking)
//!  ├─ 2. Detect   > 23 pages only: ask the model which page ranges hold tables
//!  ├─ 3. Split    one in-memory sub-PDF per range
//!  ├─ 4. Extract  one model call per unit, strict JSON parsing, page rebasing
//!  └─ 5. Write    <stem>.json or <stem>_pages_<s>-<e>.json, atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdftables::{convert, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini by default; reads GEMINI_API_KEY
//!     let config = ExtractionConfig::builder()
//!         .output_dir("json_outputs")
//!         .build()?;
//!     let output = convert("rates.pdf", &config).await?;
//!     for path in output.artifacts() {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftables` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdftables = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, DEFAULT_MODEL, DEFAULT_OUTPUT_DIR,
    DEFAULT_PROVIDER, DEFAULT_SPLIT_THRESHOLD,
};
pub use convert::{collect_inputs, convert, convert_batch, resolve_model};
pub use error::{ApiErrorKind, ErrorKind, PdfTablesError, Stage};
pub use model::{DocumentPayload, ModelReply, TableModel};
pub use output::{
    BatchReport, DocumentOutput, DocumentReport, DocumentState, ExtractionResult, PageRange,
    PageTable, Row, UnitOutput,
};
pub use pipeline::llm::LlmTableModel;
pub use pipeline::load::{inspect, DocumentInfo};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
