//! Document and batch entry points.
//!
//! [`convert`] runs one document through the pipeline and returns its
//! output or its error. [`convert_batch`] runs many, turning each
//! document's error into a failed [`DocumentReport`] so one bad file never
//! takes its siblings down with it.

use crate::config::ExtractionConfig;
use crate::error::PdfTablesError;
use crate::model::{DocumentPayload, TableModel};
use crate::output::{BatchReport, DocumentOutput, DocumentReport, DocumentState, PageRange};
use crate::pipeline::detect::detect_ranges;
use crate::pipeline::extract::extract_unit;
use crate::pipeline::llm::LlmTableModel;
use crate::pipeline::load::load_document;
use crate::pipeline::split::{split_document, validate_ranges};
use crate::pipeline::write::{
    artifact_path, artifact_stem, split_pdf_path, write_atomic, write_result, OutputRegistry,
};
use crate::progress::BatchProgressCallback;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Extract the tables of one PDF and write its JSON artifacts.
///
/// # Errors
/// Any pipeline failure of the document, plus configuration errors when no
/// model can be resolved.
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentOutput, PdfTablesError> {
    let path = path.as_ref();
    let model = resolve_model(config)?;
    let registry = OutputRegistry::new();
    registry.reserve_stem(&config.output_dir, &artifact_stem(path))?;
    run_document(1, path, model.as_ref(), config, &registry).await
}

/// Process every input, in order, and report per document.
///
/// Directories are expanded with [`collect_inputs`]. The model is resolved
/// once up front; failing to do so is the only error returned, everything
/// else lands in the report.
pub async fn convert_batch(
    inputs: &[PathBuf],
    config: &ExtractionConfig,
) -> Result<BatchReport, PdfTablesError> {
    let batch_start = Instant::now();
    let inputs = collect_inputs(inputs).await?;
    let model = resolve_model(config)?;
    let model: &dyn TableModel = model.as_ref();
    let registry = OutputRegistry::new();

    info!(
        "Processing {} document(s) with concurrency {}",
        inputs.len(),
        config.concurrency
    );
    emit(config, |cb| cb.on_batch_start(inputs.len()));

    // Stems are reserved before anything runs so the earlier input keeps
    // its name regardless of completion order.
    let reservations: Vec<Result<(), PdfTablesError>> = inputs
        .iter()
        .map(|p| registry.reserve_stem(&config.output_dir, &artifact_stem(p)))
        .collect();

    let registry = &registry;
    let documents: Vec<DocumentReport> = stream::iter(
        inputs
            .iter()
            .zip(reservations)
            .enumerate()
            .map(move |(i, (path, reserved))| async move {
                let index = i + 1;
                let start = Instant::now();
                emit(config, |cb| cb.on_document_start(index, path));

                let outcome = match reserved {
                    Ok(()) => run_document(index, path, model, config, registry).await,
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(output) => {
                        let report = DocumentReport::from_output(&output);
                        emit(config, |cb| {
                            cb.on_document_complete(index, path, report.artifacts.len())
                        });
                        report
                    }
                    Err(e) => {
                        error!("{}: {}", path.display(), e);
                        emit(config, |cb| {
                            cb.on_document_state(index, path, DocumentState::Failed(e.kind()));
                            cb.on_document_error(index, path, &e.to_string());
                        });
                        DocumentReport::failed(
                            path.clone(),
                            &e,
                            start.elapsed().as_millis() as u64,
                        )
                    }
                }
            }),
    )
    .buffered(config.concurrency)
    .collect()
    .await;

    let report = BatchReport {
        documents,
        duration_ms: batch_start.elapsed().as_millis() as u64,
    };
    info!(
        "Batch complete: {}/{} document(s) succeeded in {}ms",
        report.succeeded(),
        report.documents.len(),
        report.duration_ms
    );
    emit(config, |cb| {
        cb.on_batch_complete(report.documents.len(), report.succeeded())
    });
    Ok(report)
}

/// Expand directories into the PDFs they contain.
///
/// Files are passed through untouched, even when missing, so they are
/// reported as InvalidFile rather than silently dropped. A directory
/// contributes its `*.pdf` entries (case-insensitive, not recursive) sorted
/// by name.
pub async fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, PdfTablesError> {
    let mut inputs = Vec::new();
    for path in paths {
        if !tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir()) {
            inputs.push(path.clone());
            continue;
        }

        let read_err = |e: std::io::Error| match e.kind() {
            std::io::ErrorKind::PermissionDenied => PdfTablesError::PermissionDenied {
                path: path.clone(),
            },
            _ => PdfTablesError::FileNotFound { path: path.clone() },
        };
        let mut entries = tokio::fs::read_dir(path).await.map_err(read_err)?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let candidate = entry.path();
            let is_pdf = candidate
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf && entry.file_type().await.is_ok_and(|t| t.is_file()) {
                found.push(candidate);
            }
        }
        found.sort();
        if found.is_empty() {
            warn!("No PDF files in directory {}", path.display());
        }
        inputs.extend(found);
    }
    Ok(inputs)
}

/// Pick the table model: injected model, else an LLM provider.
pub fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn TableModel>, PdfTablesError> {
    if let Some(ref model) = config.table_model {
        return Ok(Arc::clone(model));
    }
    let model = LlmTableModel::from_config(config)?;
    info!(
        "Using {} / {}",
        config.provider_label(),
        config.model_name()
    );
    Ok(Arc::new(model))
}

// ── Per-document pipeline ────────────────────────────────────────────────

async fn run_document(
    index: usize,
    path: &Path,
    model: &dyn TableModel,
    config: &ExtractionConfig,
    registry: &OutputRegistry,
) -> Result<DocumentOutput, PdfTablesError> {
    let start = Instant::now();
    let stem = artifact_stem(path);
    let state = |s: DocumentState| emit(config, |cb| cb.on_document_state(index, path, s));

    // ── Step 1: Load ─────────────────────────────────────────────────────
    let loaded = load_document(path).await?;
    let page_count = loaded.page_count;
    info!("{}: {} page(s)", path.display(), page_count);
    state(DocumentState::Loaded);

    // ── Step 2: Ranges and units ─────────────────────────────────────────
    let mut detection_input_tokens = 0;
    let mut detection_output_tokens = 0;
    let (ranges, payloads, splits) = if config.needs_split(page_count) {
        let whole = DocumentPayload::whole(path, page_count, Arc::clone(&loaded.bytes));
        let (ranges, reply) = detect_ranges(model, &whole, config).await?;
        detection_input_tokens = reply.input_tokens;
        detection_output_tokens = reply.output_tokens;
        validate_ranges(&ranges, page_count)?;
        state(DocumentState::RangesDetected);

        if ranges.is_empty() {
            warn!("{}: no tables detected, nothing to write", path.display());
            state(DocumentState::Written);
            return Ok(DocumentOutput {
                source: path.to_path_buf(),
                page_count,
                ranges,
                units: Vec::new(),
                detection_input_tokens,
                detection_output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let covered: usize = ranges.iter().map(PageRange::len).sum();
        if covered < page_count {
            warn!(
                "{}: {} page(s) outside the detected ranges are dropped",
                path.display(),
                page_count - covered
            );
        }

        let subs = split_document(&loaded, &ranges).await?;
        info!("{}: split into {} sub-document(s)", path.display(), subs.len());
        state(DocumentState::Split);

        let payloads: Vec<DocumentPayload> = subs
            .iter()
            .map(|s| DocumentPayload::slice(path, s.range, s.bytes.clone()))
            .collect();
        let splits = if config.keep_splits { subs } else { Vec::new() };
        (ranges, payloads, splits)
    } else {
        state(DocumentState::RangesDetected);
        let whole = DocumentPayload::whole(path, page_count, Arc::clone(&loaded.bytes));
        (vec![PageRange::whole(page_count)], vec![whole], Vec::new())
    };

    // ── Step 3: Extract every unit before writing anything ───────────────
    let mut units = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        units.push(extract_unit(model, payload, config).await?);
    }
    state(DocumentState::Extracted);

    // ── Step 4: Claim names, then write ──────────────────────────────────
    let json_paths: Vec<PathBuf> = units
        .iter()
        .map(|u| artifact_path(&config.output_dir, &stem, u.split.then_some(u.range)))
        .collect();
    let split_paths: Vec<PathBuf> = splits
        .iter()
        .map(|s| split_pdf_path(&config.output_dir, &stem, s.range))
        .collect();
    let mut claims = json_paths.clone();
    claims.extend(split_paths.iter().cloned());
    registry.claim_all(&claims)?;

    for (unit, json_path) in units.iter_mut().zip(json_paths) {
        write_result(&json_path, &unit.result).await?;
        info!(
            "{}: wrote {} ({} page(s) with tables)",
            path.display(),
            json_path.display(),
            unit.result.pages.len()
        );
        unit.artifact = Some(json_path);
    }
    for (sub, pdf_path) in splits.into_iter().zip(split_paths) {
        write_atomic(&pdf_path, sub.bytes).await?;
    }
    state(DocumentState::Written);

    Ok(DocumentOutput {
        source: path.to_path_buf(),
        page_count,
        ranges,
        units,
        detection_input_tokens,
        detection_output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn emit(config: &ExtractionConfig, event: impl FnOnce(&dyn BatchProgressCallback)) {
    if let Some(ref cb) = config.progress_callback {
        event(cb.as_ref());
    }
}
