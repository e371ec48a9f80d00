//! Prompts for the two model calls: range detection and table extraction.
//!
//! Both prompts ask for bare JSON. The schemas they describe are the ones
//! parsed by [`crate::pipeline::detect::parse_ranges`] and
//! [`crate::pipeline::extract::parse_extraction`]; change them together.
//!
//! Callers can override either prompt via
//! [`crate::config::ExtractionConfig::detection_prompt`] and
//! [`crate::config::ExtractionConfig::extraction_prompt`].

/// Asks the model which page ranges of the attached PDF contain tables.
pub const DETECT_RANGES_PROMPT: &str = r#"You analyse PDF documents. Identify the page ranges of the attached PDF that contain tables.

Rules:
1. Report every table in the document.
2. A single table may span several consecutive pages; report it as one range covering all of them.
3. Page numbers are 1-based and refer to the attached PDF.
4. Ignore index pages, tables of contents and decorative grids.

Return ONLY valid JSON with this exact structure:
[
  {"start_page": <integer>, "end_page": <integer>}
]
If the document contains no tables, return []. Do NOT wrap the JSON in ``` fences and do NOT add commentary."#;

/// Asks the model to extract the tables of the attached PDF as JSON.
pub const EXTRACT_TABLES_PROMPT: &str = r#"You extract tabular data from PDF documents. Extract every table of the attached PDF.

Return ONLY valid JSON with this exact structure:
[
  {"page": <integer>, "table": [ {"<column header>": <value>, ...}, ... ]}
]

Rules:
1. Each element of the top-level list holds the table data of one page.
2. "page" is the 1-based page number relative to the attached PDF.
3. "table" is a list of row objects. Keys are the column headers as strings; use "" when a column has no header.
4. Values are strings, numbers or null (null for empty or merged cells). Never nest objects or lists inside a row.
5. If a row continues across a page break, keep it whole under the page where it starts.
6. Extract only grid-like table content; ignore running text, index pages and page numbers.
7. If a page holds several tables with the same columns, combine them; otherwise report them in reading order.
8. Do NOT wrap the JSON in ``` fences and do NOT add commentary."#;

/// Text of the user turn that carries the PDF attachment.
pub fn document_message(file_name: &str, page_count: usize) -> String {
    format!("Attached: \"{file_name}\" ({page_count} pages).")
}
