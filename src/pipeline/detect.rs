//! Range detection: ask the model which pages hold tables.

use crate::config::ExtractionConfig;
use crate::error::{PdfTablesError, Stage};
use crate::model::{DocumentPayload, ModelReply, TableModel};
use crate::output::PageRange;
use crate::pipeline::response::json_payload;
use crate::pipeline::retry::call_with_retry;
use serde::Deserialize;
use tracing::{debug, info};

/// Accepted shapes of one detected range.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRange {
    Object { start_page: i64, end_page: i64 },
    Pair([i64; 2]),
}

/// Call the model once (plus transient retries) and parse its ranges.
///
/// Returns the ranges in the order the model listed them, together with the
/// raw reply for token accounting. Ranges are not validated against the page
/// count here; see [`crate::pipeline::split::validate_ranges`].
pub async fn detect_ranges(
    model: &dyn TableModel,
    document: &DocumentPayload,
    config: &ExtractionConfig,
) -> Result<(Vec<PageRange>, ModelReply), PdfTablesError> {
    info!("Detecting table ranges in {}", document.label());
    let reply = call_with_retry(Stage::DetectRanges, &document.label(), config, || {
        model.detect_ranges(document)
    })
    .await?;

    let ranges = parse_ranges(&reply.text, document.page_count)?;
    debug!(
        "{}: model reported {} range(s): {:?}",
        document.label(),
        ranges.len(),
        ranges
    );
    Ok((ranges, reply))
}

/// Parse a range-detection reply.
///
/// Accepts `[{"start_page": s, "end_page": e}, …]` and `[[s, e], …]`,
/// optionally fenced or surrounded by prose. An empty list means the model
/// found no tables. Negative page numbers are range errors, not format
/// errors: the reply was well-formed, its content is not.
pub fn parse_ranges(text: &str, page_count: usize) -> Result<Vec<PageRange>, PdfTablesError> {
    let payload = json_payload(text).ok_or_else(|| PdfTablesError::ResponseFormat {
        stage: Stage::DetectRanges,
        detail: "no JSON array found in reply".into(),
        raw: text.to_string(),
    })?;

    let raw: Vec<RawRange> =
        serde_json::from_str(&payload).map_err(|e| PdfTablesError::ResponseFormat {
            stage: Stage::DetectRanges,
            detail: format!("expected a list of {{start_page, end_page}} objects: {e}"),
            raw: text.to_string(),
        })?;

    raw.into_iter()
        .map(|r| {
            let (start, end) = match r {
                RawRange::Object {
                    start_page,
                    end_page,
                } => (start_page, end_page),
                RawRange::Pair([s, e]) => (s, e),
            };
            match (usize::try_from(start), usize::try_from(end)) {
                (Ok(s), Ok(e)) => Ok(PageRange::new(s, e)),
                _ => Err(PdfTablesError::InvalidRange {
                    range: PageRange::new(
                        usize::try_from(start).unwrap_or(0),
                        usize::try_from(end).unwrap_or(0),
                    ),
                    page_count,
                    reason: format!("negative page number in {start}-{end}"),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_object_ranges_in_model_order() {
        let text = r#"[{"start_page": 30, "end_page": 32}, {"start_page": 2, "end_page": 5}]"#;
        let ranges = parse_ranges(text, 40).unwrap();
        assert_eq!(ranges, vec![PageRange::new(30, 32), PageRange::new(2, 5)]);
    }

    #[test]
    fn parses_pairs_and_fenced_reply() {
        let text = "```json\n[[1, 3], [7, 7]]\n```";
        let ranges = parse_ranges(text, 40).unwrap();
        assert_eq!(ranges, vec![PageRange::new(1, 3), PageRange::new(7, 7)]);
    }

    #[test]
    fn empty_list_means_no_tables() {
        assert!(parse_ranges("[]", 40).unwrap().is_empty());
    }

    #[test]
    fn prose_without_json_is_format_error() {
        let err = parse_ranges("There are tables on pages 3 to 5.", 40).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);
        match err {
            PdfTablesError::ResponseFormat { raw, stage, .. } => {
                assert_eq!(stage, Stage::DetectRanges);
                assert!(raw.contains("pages 3 to 5"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_format_error() {
        let err = parse_ranges(r#"[{"first": 1, "last": 2}]"#, 40).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);

        let err = parse_ranges(r#"[{"start_page": "one", "end_page": 2}]"#, 40).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);
    }

    #[test]
    fn negative_page_is_range_error() {
        let err = parse_ranges(r#"[{"start_page": -1, "end_page": 2}]"#, 40).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }
}
