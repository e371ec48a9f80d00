//! Range validation and page-range extraction.
//!
//! A sub-document is made by cloning the parsed source, deleting every page
//! outside the range and pruning the objects nothing references any more.
//! Page objects themselves are not rewritten, so the kept pages come out
//! byte-for-byte equivalent and in their original order.

use crate::error::PdfTablesError;
use crate::output::PageRange;
use crate::pipeline::load::LoadedDocument;
use lopdf::Document;
use std::sync::Arc;
use tracing::{debug, warn};

/// One extracted slice of the source document.
#[derive(Debug, Clone)]
pub struct SubDocument {
    pub range: PageRange,
    pub bytes: Vec<u8>,
}

/// Check that every range lies in `[1, page_count]`, is not reversed, and
/// shares no page with another range.
///
/// Nothing is clamped: a bad range is reported rather than silently turned
/// into an empty or truncated document.
pub fn validate_ranges(ranges: &[PageRange], page_count: usize) -> Result<(), PdfTablesError> {
    for range in ranges {
        let reason = if range.start == 0 {
            Some("pages are 1-indexed".to_string())
        } else if range.start > range.end {
            Some("start is after end".to_string())
        } else if range.end > page_count {
            Some(format!("end is past the last page ({page_count})"))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(PdfTablesError::InvalidRange {
                range: *range,
                page_count,
                reason,
            });
        }
    }

    for (i, first) in ranges.iter().enumerate() {
        if let Some(second) = ranges[i + 1..].iter().find(|r| first.overlaps(r)) {
            return Err(PdfTablesError::OverlappingRanges {
                first: *first,
                second: *second,
            });
        }
    }

    Ok(())
}

/// Produce one sub-document per range, in the order given.
///
/// Fails with an InvalidRange-kind error before doing any work if a range
/// is invalid.
pub async fn split_document(
    document: &LoadedDocument,
    ranges: &[PageRange],
) -> Result<Vec<SubDocument>, PdfTablesError> {
    validate_ranges(ranges, document.page_count)?;

    let source = Arc::clone(&document.document);
    let ranges = ranges.to_vec();

    tokio::task::spawn_blocking(move || {
        ranges
            .iter()
            .map(|range| {
                let bytes = extract_range(&source, *range)?;
                debug!("Split pages {} → {} bytes", range, bytes.len());
                Ok(SubDocument {
                    range: *range,
                    bytes,
                })
            })
            .collect::<Result<Vec<_>, PdfTablesError>>()
    })
    .await
    .map_err(|e| PdfTablesError::Internal(format!("Split task panicked: {e}")))?
}

/// Serialise the pages of `range` into a standalone PDF.
pub fn extract_range(source: &Document, range: PageRange) -> Result<Vec<u8>, PdfTablesError> {
    let mut doc = source.clone();
    let to_delete: Vec<u32> = doc
        .get_pages()
        .keys()
        .copied()
        .filter(|n| !range.contains(*n as usize))
        .collect();

    doc.delete_pages(&to_delete);
    let pruned = doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    let kept = doc.get_pages().len();
    if kept != range.len() {
        warn!(
            "Pages {}: expected {} pages in sub-document, got {}",
            range,
            range.len(),
            kept
        );
        return Err(PdfTablesError::Internal(format!(
            "sub-document for pages {range} has {kept} pages"
        )));
    }
    debug!("Pages {}: pruned {} unreachable objects", range, pruned.len());

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| PdfTablesError::Internal(format!("Failed to serialise pages {range}: {e}")))?;
    Ok(buf)
}
