//! End-to-end integration tests for edgequake-pdftables.
//!
//! These tests use real PDF files in `./test_cases/` and make live LLM API
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use edgequake_pdftables::{convert, convert_batch, inspect, ExtractionConfig, ExtractionResult};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir(name: &str) -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases/output")
        .join(name);
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            println!("       Copy table-heavy PDFs into ./test_cases/");
            return;
        }
        p
    }};
}

fn live_config(name: &str) -> ExtractionConfig {
    let mut builder = ExtractionConfig::builder().output_dir(output_dir(name));
    if let Ok(model) = std::env::var("EDGEQUAKE_MODEL") {
        builder = builder.model(model);
    }
    if let Ok(provider) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        builder = builder.provider_name(provider);
    }
    builder.build().expect("valid config")
}

/// Assert an artifact is a schema-conforming, non-empty extraction.
fn assert_artifact_quality(path: &Path, page_count: usize, context: &str) {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("[{context}] cannot read {}: {e}", path.display()));
    assert!(text.ends_with('\n'), "[{context}] artifact must end with a newline");

    let result: ExtractionResult =
        serde_json::from_str(&text).unwrap_or_else(|e| panic!("[{context}] bad schema: {e}"));
    for entry in &result.pages {
        assert!(
            (1..=page_count).contains(&entry.page),
            "[{context}] page {} outside 1..={page_count}",
            entry.page
        );
    }
    println!(
        "[{context}] ✓  {} page(s) with tables, {} row(s)",
        result.pages.len(),
        result.total_rows()
    );
}

// ── Inspect tests (no LLM, instant) ──────────────────────────────────────────

#[tokio::test]
async fn test_inspect_rate_notification() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("rate_notification.pdf"));

    let info = inspect(&path).await.expect("inspect() should succeed");

    assert!(info.page_count > 0);
    assert!(!info.pdf_version.is_empty());
    println!("Info: {:?}", info);
}

// ── Live extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_short_document() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("rate_notification.pdf"));
    let config = live_config("short");

    let output = convert(&path, &config).await.expect("conversion should succeed");

    assert!(!output.was_split(), "expected a document of at most 23 pages");
    assert_eq!(output.artifacts().len(), 1);
    for artifact in output.artifacts() {
        assert_artifact_quality(&artifact, output.page_count, "short");
    }
}

#[tokio::test]
async fn test_extract_long_document() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("annual_report.pdf"));
    let config = live_config("long");

    let output = convert(&path, &config).await.expect("conversion should succeed");

    assert!(output.page_count > 23, "expected a document of more than 23 pages");
    for range in &output.ranges {
        assert!(range.start >= 1 && range.end <= output.page_count);
    }
    for artifact in output.artifacts() {
        assert_artifact_quality(&artifact, output.page_count, "long");
    }
}

#[tokio::test]
async fn test_batch_over_test_cases() {
    let dir = e2e_skip_unless_ready!(test_cases_dir());
    let config = live_config("batch");

    let report = convert_batch(&[dir], &config)
        .await
        .expect("batch should start");

    for doc in &report.documents {
        println!(
            "{} → {} ({} rows)",
            doc.input.display(),
            doc.state,
            doc.rows
        );
    }
    assert!(report.succeeded() > 0, "at least one document should succeed");
}
