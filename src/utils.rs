//! Small string helpers shared by the extractors, normalizer, and logging.

use once_cell::sync::Lazy;
use regex::Regex;

/// Non-breaking space as it appears after entity decoding.
pub const NBSP: char = '\u{a0}';

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped bytes appended. Cuts on a character boundary, so multi-byte
/// text is safe to pass.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Replace every non-breaking space with a regular space.
pub fn replace_nbsp(s: &str) -> String {
    s.replace(NBSP, " ")
}

/// Clean a single-line field such as a title or author name.
///
/// Non-breaking spaces become spaces, whitespace runs (including newlines
/// from the page source) collapse to one space, and the ends are trimmed.
/// Returns `None` when nothing is left.
pub fn clean_inline(s: &str) -> Option<String> {
    let spaced = replace_nbsp(s);
    let collapsed = WHITESPACE_RUN.replace_all(&spaced, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
