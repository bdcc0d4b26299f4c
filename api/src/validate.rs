//! Request parameter checks shared across the AI routes. Identifiers are
//! already typed `Uuid` fields on the request DTOs (serde rejects malformed
//! ones before any handler runs); these helpers cover the rest: count
//! clamping, free-text bounds, and URL schemes. All pure.

use std::ops::RangeInclusive;

use url::Url;

use kapsa_core::sanitize::truncate_chars;

use crate::error::AppError;

pub const FLASHCARD_COUNT_RANGE: RangeInclusive<i64> = 1..=30;
pub const FLASHCARD_COUNT_DEFAULT: i64 = 10;
pub const QUIZ_COUNT_RANGE: RangeInclusive<i64> = 1..=20;
pub const QUIZ_COUNT_DEFAULT: i64 = 5;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TOPIC_CHARS: usize = 200;
pub const MAX_MESSAGE_CHARS: usize = 5000;
pub const MAX_HISTORY_ENTRY_CHARS: usize = 2000;
pub const MAX_ANSWER_CHARS: usize = 2000;

/// Clamp a requested item count into `range`, falling back to `default`
/// when absent. Out-of-range values are clamped, not rejected.
pub fn clamp_count(raw: Option<i64>, default: i64, range: RangeInclusive<i64>) -> i64 {
    raw.unwrap_or(default).clamp(*range.start(), *range.end())
}

/// A required free-text field: must be non-empty after trimming, and is
/// truncated to `max_chars`.
pub fn required_text(raw: &str, field: &str, max_chars: usize) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: format!("{field} must not be empty"),
            field: Some(field.to_string()),
        });
    }
    Ok(truncate_chars(trimmed, max_chars).to_string())
}

/// An optional free-text field: blank values collapse to `None`, present
/// values are truncated to `max_chars`.
pub fn optional_text(raw: Option<&str>, max_chars: usize) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, max_chars).to_string())
}

/// A URL field that must parse and use the http or https scheme.
pub fn http_url(raw: &str, field: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim()).map_err(|_| AppError::Validation {
        message: format!("{field} must be a valid URL"),
        field: Some(field.to_string()),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation {
            message: format!("{field} must use http or https, got '{other}'"),
            field: Some(field.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FLASHCARD_COUNT_DEFAULT, FLASHCARD_COUNT_RANGE, QUIZ_COUNT_DEFAULT, QUIZ_COUNT_RANGE,
        clamp_count, http_url, optional_text, required_text,
    };
    use crate::error::AppError;

    #[test]
    fn oversized_counts_clamp_to_the_range_maximum() {
        assert_eq!(
            clamp_count(Some(999), FLASHCARD_COUNT_DEFAULT, FLASHCARD_COUNT_RANGE),
            30
        );
        assert_eq!(clamp_count(Some(50), QUIZ_COUNT_DEFAULT, QUIZ_COUNT_RANGE), 20);
    }

    #[test]
    fn undersized_and_missing_counts_get_sane_values() {
        assert_eq!(
            clamp_count(Some(0), FLASHCARD_COUNT_DEFAULT, FLASHCARD_COUNT_RANGE),
            1
        );
        assert_eq!(
            clamp_count(Some(-5), QUIZ_COUNT_DEFAULT, QUIZ_COUNT_RANGE),
            1
        );
        assert_eq!(
            clamp_count(None, FLASHCARD_COUNT_DEFAULT, FLASHCARD_COUNT_RANGE),
            10
        );
    }

    #[test]
    fn required_text_rejects_blank_input() {
        let err = required_text("   ", "message", 100).expect_err("blank must fail");
        match err {
            AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("message")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn required_text_trims_and_truncates() {
        let long = format!("  {}  ", "x".repeat(300));
        assert_eq!(required_text(&long, "title", 200).unwrap().len(), 200);
    }

    #[test]
    fn optional_text_collapses_blank_to_none() {
        assert_eq!(optional_text(Some("  "), 100), None);
        assert_eq!(optional_text(None, 100), None);
        assert_eq!(optional_text(Some(" hi "), 100).as_deref(), Some("hi"));
    }

    #[test]
    fn url_schemes_other_than_http_are_rejected() {
        assert!(http_url("https://cdn.example.com/a.png", "fileUrl").is_ok());
        assert!(http_url("http://cdn.example.com/a.mp3", "fileUrl").is_ok());
        assert!(http_url("ftp://cdn.example.com/a.png", "fileUrl").is_err());
        assert!(http_url("file:///etc/passwd", "fileUrl").is_err());
        assert!(http_url("not a url", "fileUrl").is_err());
    }
}
