//! Response cleanup: pull the JSON payload out of free-text model replies.
//!
//! Even when told to return bare JSON, models regularly wrap it in
//! ` ```json ` fences, prefix it with a sentence ("Here are the tables:"),
//! or add a BOM. These deterministic rules recover the payload without
//! guessing at its content; anything still unparseable afterwards is the
//! caller's `ResponseFormat` error.
//!
//! Rules (applied in order):
//! 1. Strip invisible Unicode (BOM, zero-width spaces)
//! 2. Strip an outer code fence (with or without a language tag)
//! 3. Parse a JSON value at every `[` and keep the longest array, so
//!    bracketed prose ("see [1]: [...]") does not hide the payload
//! 4. If no array parses, return the span from the first `[` to the last
//!    `]` and let the caller report the parse error

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Deserializer, Value};

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}]").unwrap());

/// Return the most likely JSON array payload of `reply`.
///
/// Returns `None` when the text contains no `[ … ]` span at all.
pub fn json_payload(reply: &str) -> Option<String> {
    let cleaned = RE_INVISIBLE.replace_all(reply, "");
    let unfenced = strip_outer_fences(cleaned.trim());
    let candidate = unfenced.trim();

    if let Some(array) = longest_array(candidate) {
        return Some(array.to_string());
    }

    let start = candidate.find('[')?;
    let end = candidate.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(candidate[start..=end].to_string())
}

/// Longest top-level span of `text` that parses as a JSON array.
fn longest_array(text: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('[') {
        let start = pos + offset;
        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Array(_))) => {
                let end = start + stream.byte_offset();
                let span = &text[start..end];
                if best.map_or(true, |b| span.len() > b.len()) {
                    best = Some(span);
                }
                pos = end;
            }
            _ => pos = start + 1,
        }
    }
    best
}

fn strip_outer_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_passthrough() {
        assert_eq!(json_payload("[1, 2]").as_deref(), Some("[1, 2]"));
        assert_eq!(json_payload("  []\n").as_deref(), Some("[]"));
    }

    #[test]
    fn strips_json_fence() {
        let input = "```json\n[{\"page\": 1}]\n```";
        assert_eq!(json_payload(input).as_deref(), Some("[{\"page\": 1}]"));
    }

    #[test]
    fn strips_plain_fence() {
        let input = "```\n[]\n```\n";
        assert_eq!(json_payload(input).as_deref(), Some("[]"));
    }

    #[test]
    fn finds_array_inside_prose() {
        let input = "Here are the ranges you asked for:\n[{\"start_page\": 2, \"end_page\": 4}]\nLet me know!";
        assert_eq!(
            json_payload(input).as_deref(),
            Some("[{\"start_page\": 2, \"end_page\": 4}]")
        );
    }

    #[test]
    fn skips_bracketed_citations_before_payload() {
        let input = "see [1]: [{\"page\":1,\"table\":[]}]";
        assert_eq!(
            json_payload(input).as_deref(),
            Some("[{\"page\":1,\"table\":[]}]")
        );

        let input = "Tables on pages [2, 3] below.\n[{\"start_page\": 2, \"end_page\": 3}]\n(see [note])";
        assert_eq!(
            json_payload(input).as_deref(),
            Some("[{\"start_page\": 2, \"end_page\": 3}]")
        );
    }

    #[test]
    fn unparseable_span_is_returned_for_error_reporting() {
        assert_eq!(
            json_payload("Result: [{\"page\": 1,}]").as_deref(),
            Some("[{\"page\": 1,}]")
        );
    }

    #[test]
    fn removes_bom_and_zero_width() {
        let input = "\u{FEFF}[\u{200B}]";
        assert_eq!(json_payload(input).as_deref(), Some("[]"));
    }

    #[test]
    fn no_array_yields_none() {
        assert_eq!(json_payload("I could not find any tables."), None);
        assert_eq!(json_payload("] backwards ["), None);
        assert_eq!(json_payload(""), None);
    }
}
