//! Decoder for the load-more `<ajaxResponse>` payload:
//! `<rows>` carries base64 HTML, `<newPage>` the next cursor.

use crate::error::CollectError;
use crate::models::{AjaxEnvelope, PageCursor};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static ROWS_TAG: LazyLock<Regex> = LazyLock::new(|| tag_pattern("rows"));
static NEW_PAGE_TAG: LazyLock<Regex> = LazyLock::new(|| tag_pattern("newPage"));

/// Padding and trailing bits are not checked.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?i)<\s*{tag}[^>]*>([\s\S]*?)<\s*/\s*{tag}\s*>"))
        .expect("hardcoded envelope pattern is valid")
}

fn first_body<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Split an envelope into its rows HTML and next-page cursor.
pub fn decode_envelope(text: &str) -> Result<AjaxEnvelope, CollectError> {
    let rows = first_body(&ROWS_TAG, text);
    let new_page = first_body(&NEW_PAGE_TAG, text);

    let (rows, new_page) = match (rows, new_page) {
        (Some(rows), Some(new_page)) => (rows, new_page),
        (rows, new_page) => {
            let mut missing = Vec::new();
            if rows.is_none() {
                missing.push("rows");
            }
            if new_page.is_none() {
                missing.push("newPage");
            }
            return Err(CollectError::MissingEnvelopeField(missing));
        }
    };

    let rows_html = String::from_utf8_lossy(&decode_base64_lenient(rows)).into_owned();
    let next_page = PageCursor::new(new_page);
    debug!("Envelope: {} bytes of rows, next page {}", rows_html.len(), next_page);

    Ok(AjaxEnvelope {
        rows_html,
        next_page,
    })
}

/// Best-effort base64: characters outside the alphabet (whitespace, stray
/// markup) are skipped and a dangling final symbol is dropped. Decoding stops
/// at the first `=` that pads a block; any other `=` is skipped.
pub fn decode_base64_lenient(raw: &str) -> Vec<u8> {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => cleaned.push(c),
            '=' if cleaned.len() % 4 >= 2 => break,
            _ => {}
        }
    }
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    match LENIENT_BASE64.decode(&cleaned) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Undecodable rows payload ({} symbols): {}", cleaned.len(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_envelope() {
        let env = decode_envelope("<ajaxResponse><rows>SGVsbG8=</rows><newPage>-1</newPage></ajaxResponse>")
            .unwrap();
        assert_eq!(env.rows_html, "Hello");
        assert_eq!(env.next_page.as_str(), "-1");
        assert!(env.next_page.is_end());
    }

    #[test]
    fn test_tags_case_insensitive_with_attributes() {
        let text = "<ROWS encoding=\"b64\">\nSGVs\nbG8=\n</Rows >< NEWPAGE>  3 \n</ newpage>";
        let env = decode_envelope(text).unwrap();
        assert_eq!(env.rows_html, "Hello");
        assert_eq!(env.next_page.as_str(), "3");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let text = "<rows>QQ==</rows><rows>Qg==</rows><newPage>2</newPage><newPage>9</newPage>";
        let env = decode_envelope(text).unwrap();
        assert_eq!(env.rows_html, "A");
        assert_eq!(env.next_page.as_str(), "2");
    }

    #[test]
    fn test_missing_new_page_only() {
        match decode_envelope("<rows>SGVsbG8=</rows>") {
            Err(CollectError::MissingEnvelopeField(missing)) => assert_eq!(missing, vec!["newPage"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_both() {
        match decode_envelope("<html>nope</html>") {
            Err(CollectError::MissingEnvelopeField(missing)) => {
                assert_eq!(missing, vec!["rows", "newPage"])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_lenient_base64() {
        assert_eq!(decode_base64_lenient("SGVs*bG8"), b"Hello");
        assert_eq!(decode_base64_lenient("SGVsbG8h\nX"), b"Hello!");
        assert!(decode_base64_lenient("").is_empty());
    }

    #[test]
    fn test_lenient_base64_stops_at_padding() {
        assert_eq!(decode_base64_lenient("QQ==Qg=="), b"A");
        assert_eq!(decode_base64_lenient("SGVsbG8=trailing"), b"Hello");
        assert_eq!(decode_base64_lenient("=SGVs=bG8h"), b"Hello!");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        // 0xff 0xfe
        let env = decode_envelope("<rows>//4=</rows><newPage>-1</newPage>").unwrap();
        assert_eq!(env.rows_html, "\u{fffd}\u{fffd}");
    }
}
