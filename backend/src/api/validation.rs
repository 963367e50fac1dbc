//! Shared input validation helpers.
//!
//! Text normalisation and file-name rules used by several services, so the
//! limits are defined in one place.

use crate::error::{AppError, Result};

pub const TITLE_MAX_LEN: usize = 255;
pub const COMMENT_MAX_LEN: usize = 10_000;
pub const FILE_NAME_MAX_LEN: usize = 255;

/// Trim `value` and require it to be non-empty and at most `max_len` characters.
pub fn required_text(value: &str, field: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`required_text`], for fields that may be absent.
pub fn optional_text(value: Option<&str>, field: &str, max_len: usize) -> Result<Option<String>> {
    value.map(|v| required_text(v, field, max_len)).transpose()
}

/// Reduce a client-supplied file name to a safe single path segment.
///
/// Directory components are dropped, control characters and reserved
/// characters are replaced with `_`, and leading dots are stripped so the
/// result can never be `.`/`..` or a hidden file.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();

    if cleaned.is_empty() {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }

    Ok(cleaned.chars().take(FILE_NAME_MAX_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Text fields
    // -----------------------------------------------------------------------

    #[test]
    fn test_required_text_trims() {
        assert_eq!(
            required_text("  Broken ladder ", "title", 255).unwrap(),
            "Broken ladder"
        );
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let err = required_text("   ", "title", 255).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: title must not be empty");
    }

    #[test]
    fn test_required_text_counts_chars_not_bytes() {
        assert!(required_text("нарушение", "title", 9).is_ok());
        assert!(required_text("нарушение", "title", 8).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None, "title", 10).unwrap(), None);
        assert_eq!(
            optional_text(Some(" x "), "title", 10).unwrap(),
            Some("x".to_string())
        );
        assert!(optional_text(Some(""), "title", 10).is_err());
    }

    // -----------------------------------------------------------------------
    // File names
    // -----------------------------------------------------------------------

    #[test]
    fn test_plain_name_kept() {
        assert_eq!(sanitize_file_name("photo 1.jpg").unwrap(), "photo 1.jpg");
    }

    #[test]
    fn test_directories_dropped() {
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\report.pdf").unwrap(),
            "report.pdf"
        );
    }

    #[test]
    fn test_dot_names_rejected() {
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name(".").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name("").is_err());
    }

    #[test]
    fn test_hidden_file_made_visible() {
        assert_eq!(sanitize_file_name(".env").unwrap(), "env");
    }

    #[test]
    fn test_reserved_characters_replaced() {
        assert_eq!(sanitize_file_name("a:b*c?.txt").unwrap(), "a_b_c_.txt");
        assert_eq!(sanitize_file_name("line\nbreak.txt").unwrap(), "line_break.txt");
    }

    #[test]
    fn test_long_name_truncated() {
        let long = format!("{}.txt", "a".repeat(400));
        assert_eq!(sanitize_file_name(&long).unwrap().chars().count(), 255);
    }
}
