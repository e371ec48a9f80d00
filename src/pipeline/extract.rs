//! Table extraction: ask the model for a unit's tables and parse them
//! strictly into [`ExtractionResult`].

use crate::config::ExtractionConfig;
use crate::error::{PdfTablesError, Stage};
use crate::model::{DocumentPayload, TableModel};
use crate::output::{ExtractionResult, PageRange, UnitOutput};
use crate::pipeline::response::json_payload;
use crate::pipeline::retry::call_with_retry;
use serde_json::Value;
use tracing::{debug, info};

/// Extract the tables of one unit.
///
/// Page numbers of a split unit come back relative to the sub-document and
/// are rebased to the source document before returning.
pub async fn extract_unit(
    model: &dyn TableModel,
    payload: &DocumentPayload,
    config: &ExtractionConfig,
) -> Result<UnitOutput, PdfTablesError> {
    info!("Extracting tables from {}", payload.label());
    let reply = call_with_retry(Stage::ExtractTables, &payload.label(), config, || {
        model.extract_tables(payload)
    })
    .await?;

    let mut result = parse_extraction(&reply.text, payload.page_count)?;
    let range = match payload.range {
        Some(range) => {
            result.rebase(range);
            range
        }
        None => PageRange::whole(payload.page_count),
    };
    debug!(
        "{}: {} page(s) with tables, {} row(s)",
        payload.label(),
        result.pages.len(),
        result.total_rows()
    );

    Ok(UnitOutput {
        range,
        split: payload.range.is_some(),
        result,
        artifact: None,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
    })
}

/// Parse an extraction reply as `[{page:int, table:[{string: scalar}]}]`.
///
/// Rejected with a `ResponseFormat` error: no JSON array, unknown keys next
/// to `page`/`table`, non-integer pages, pages outside `1..=unit_pages`, and
/// cells holding arrays or objects.
pub fn parse_extraction(text: &str, unit_pages: usize) -> Result<ExtractionResult, PdfTablesError> {
    let format_error = |detail: String| PdfTablesError::ResponseFormat {
        stage: Stage::ExtractTables,
        detail,
        raw: text.to_string(),
    };

    let payload =
        json_payload(text).ok_or_else(|| format_error("no JSON array found in reply".into()))?;

    let result: ExtractionResult = serde_json::from_str(&payload)
        .map_err(|e| format_error(format!("expected [{{page, table}}] entries: {e}")))?;

    for entry in &result.pages {
        if entry.page == 0 || entry.page > unit_pages {
            return Err(format_error(format!(
                "page {} is outside the document's {} page(s)",
                entry.page, unit_pages
            )));
        }
        for (row_idx, row) in entry.table.iter().enumerate() {
            if let Some((key, _)) = row
                .iter()
                .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
            {
                return Err(format_error(format!(
                    "page {}, row {}: cell '{}' is not a scalar",
                    entry.page,
                    row_idx + 1,
                    key
                )));
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn parses_schema() {
        let text = r#"[{"page": 2, "table": [{"name": "A", "amount": 1}, {"name": "B", "amount": 2}]}]"#;
        let result = parse_extraction(text, 10).unwrap();
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.pages[0].page, 2);
        assert_eq!(result.pages[0].table[1]["name"], json!("B"));
        assert_eq!(result.total_rows(), 2);
    }

    #[test]
    fn accepts_null_bool_and_empty_header() {
        let text = r#"```json
[{"page": 1, "table": [{"": "S.No", "rate": null, "exempt": true}]}]
```"#;
        let result = parse_extraction(text, 1).unwrap();
        assert_eq!(result.pages[0].table[0]["rate"], Value::Null);
    }

    #[test]
    fn empty_array_is_no_tables() {
        let result = parse_extraction("[]", 4).unwrap();
        assert!(result.pages.is_empty());
    }

    #[test]
    fn non_json_is_format_error() {
        let err = parse_extraction("Sorry, I cannot help with that.", 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);
    }

    #[test]
    fn nested_cell_is_rejected() {
        let text = r#"[{"page": 1, "table": [{"a": {"b": 1}}]}]"#;
        let err = parse_extraction(text, 3).unwrap_err();
        assert!(err.to_string().contains("not a scalar"), "got: {err}");
    }

    #[test]
    fn unknown_keys_and_bad_pages_are_rejected() {
        let err = parse_extraction(r#"[{"page": 1, "table": [], "title": "x"}]"#, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);

        let err = parse_extraction(r#"[{"page": 1.5, "table": []}]"#, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);

        let err = parse_extraction(r#"[{"page": 0, "table": []}]"#, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseFormat);

        let err = parse_extraction(r#"[{"page": 4, "table": []}]"#, 3).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }
}
