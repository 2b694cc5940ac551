//! Pure field extraction
//!
//! Each function turns raw exchange data into an [`Extraction`]: the value that
//! could be recovered plus a note on why it is missing or degraded. Nothing here
//! fails or logs; the builder decides what to do with the notes.

use super::source::ExtractError;
use bytes::Bytes;
use serde_json::Value;

/// Why a field ended up absent or degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The body could not be read from the source at all
    Unreadable,
    /// The bytes are not valid UTF-8
    InvalidUtf8,
    /// The text is not JSON; the raw text was kept
    NotJson,
}

/// Outcome of extracting one field
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<T> {
    pub value: Option<T>,
    pub note: Option<(DiagnosticKind, String)>,
}

impl<T> Extraction<T> {
    pub fn present(value: T) -> Self {
        Self {
            value: Some(value),
            note: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            value: None,
            note: None,
        }
    }

    /// Field dropped for the given reason
    pub fn dropped(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            value: None,
            note: Some((kind, detail.into())),
        }
    }

    /// Field kept in a lesser form
    pub fn degraded(value: T, kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            note: Some((kind, detail.into())),
        }
    }
}

/// Unicode whitespace plus the ASCII file, group, record and unit separators
fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Collapse every whitespace run to a single space and trim both ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split(is_word_separator)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Request body: empty means absent, otherwise whitespace-normalized UTF-8 text
pub fn request_body(read: Result<Option<Bytes>, ExtractError>) -> Extraction<String> {
    let raw = match read {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return Extraction::absent(),
        Err(e) => return Extraction::dropped(DiagnosticKind::Unreadable, e.to_string()),
    };

    match std::str::from_utf8(&raw) {
        Ok(text) => Extraction::present(normalize_whitespace(text)),
        Err(e) => Extraction::dropped(DiagnosticKind::InvalidUtf8, e.to_string()),
    }
}

/// Response body: decoded JSON when possible, else the raw text
pub fn response_body(read: Result<Option<Bytes>, ExtractError>) -> Extraction<Value> {
    let raw = match read {
        Ok(Some(raw)) => raw,
        Ok(None) => return Extraction::absent(),
        Err(e) => return Extraction::dropped(DiagnosticKind::Unreadable, e.to_string()),
    };

    let text = match String::from_utf8(raw.to_vec()) {
        Ok(text) => text,
        Err(e) => return Extraction::dropped(DiagnosticKind::InvalidUtf8, e.to_string()),
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(decoded) => Extraction::present(decoded),
        Err(e) => Extraction::degraded(Value::String(text), DiagnosticKind::NotJson, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_whitespace_collapses_runs() {
        assert_eq!(normalize_whitespace("a   b\nc"), "a b c");
        assert_eq!(normalize_whitespace("  lead and trail \t"), "lead and trail");
        assert_eq!(normalize_whitespace("\r\n\t "), "");
        assert_eq!(normalize_whitespace("single"), "single");
    }

    #[test]
    fn test_normalize_whitespace_splits_on_separator_controls() {
        assert_eq!(normalize_whitespace("rec\u{1e}unit\u{1f}end"), "rec unit end");
        assert_eq!(normalize_whitespace("\u{1c}\u{1d}"), "");
        // Other control characters are kept
        assert_eq!(normalize_whitespace("a\u{1b}b"), "a\u{1b}b");
    }

    #[test]
    fn test_request_body_normalized() {
        let extraction = request_body(Ok(Some(Bytes::from_static(b"{\n  \"a\":   1\n}"))));
        assert_eq!(extraction.value.as_deref(), Some("{ \"a\": 1 }"));
        assert!(extraction.note.is_none());
    }

    #[test]
    fn test_request_body_empty_is_absent() {
        assert_eq!(request_body(Ok(Some(Bytes::new()))), Extraction::absent());
        assert_eq!(request_body(Ok(None)), Extraction::absent());
    }

    #[test]
    fn test_request_body_whitespace_only_is_empty_string() {
        let extraction = request_body(Ok(Some(Bytes::from_static(b"   \n"))));
        assert_eq!(extraction.value.as_deref(), Some(""));
    }

    #[test]
    fn test_request_body_invalid_utf8_dropped() {
        let extraction = request_body(Ok(Some(Bytes::from_static(&[0x66, 0xff, 0xfe]))));
        assert_eq!(extraction.value, None);
        assert!(matches!(
            extraction.note,
            Some((DiagnosticKind::InvalidUtf8, _))
        ));
    }

    #[test]
    fn test_request_body_read_error_dropped() {
        let extraction = request_body(Err(ExtractError::new("stream reset")));
        assert_eq!(extraction.value, None);
        let (kind, detail) = extraction.note.unwrap();
        assert_eq!(kind, DiagnosticKind::Unreadable);
        assert!(detail.contains("stream reset"));
    }

    #[test]
    fn test_response_body_json_decoded() {
        let extraction = response_body(Ok(Some(Bytes::from_static(br#"{"ok": true}"#))));
        assert_eq!(extraction.value, Some(json!({"ok": true})));
        assert!(extraction.note.is_none());
    }

    #[test]
    fn test_response_body_json_scalar_decoded() {
        let extraction = response_body(Ok(Some(Bytes::from_static(b"42"))));
        assert_eq!(extraction.value, Some(json!(42)));
    }

    #[test]
    fn test_response_body_plain_text_kept() {
        let extraction = response_body(Ok(Some(Bytes::from_static(b"plain text"))));
        assert_eq!(extraction.value, Some(json!("plain text")));
        assert!(matches!(extraction.note, Some((DiagnosticKind::NotJson, _))));
    }

    #[test]
    fn test_response_body_text_not_whitespace_normalized() {
        let extraction = response_body(Ok(Some(Bytes::from_static(b"two  spaces"))));
        assert_eq!(extraction.value, Some(json!("two  spaces")));
    }

    #[test]
    fn test_response_body_empty_kept_as_empty_string() {
        let extraction = response_body(Ok(Some(Bytes::new())));
        assert_eq!(extraction.value, Some(json!("")));
    }

    #[test]
    fn test_response_body_missing_is_absent() {
        assert_eq!(response_body(Ok(None)), Extraction::absent());
    }

    #[test]
    fn test_response_body_invalid_utf8_dropped() {
        let extraction = response_body(Ok(Some(Bytes::from_static(&[0xc3, 0x28]))));
        assert_eq!(extraction.value, None);
        assert!(matches!(
            extraction.note,
            Some((DiagnosticKind::InvalidUtf8, _))
        ));
    }

    #[test]
    fn test_response_body_unreadable_dropped() {
        let extraction = response_body(Err(ExtractError::new("body already consumed")));
        assert_eq!(extraction.value, None);
        assert!(matches!(
            extraction.note,
            Some((DiagnosticKind::Unreadable, _))
        ));
    }
}
