//! SQL utility functions

use std::sync::OnceLock;

use regex::Regex;

/// Escape SQL LIKE metacharacters (%, _, \) in user input
///
/// Use this when building LIKE patterns from user input to prevent
/// unintended pattern matching.
///
/// # Example
///
/// ```
/// use metamirror::utils::sql::escape_like_pattern;
///
/// let pattern = format!("%{}%", escape_like_pattern("100% match_test"));
/// assert_eq!(pattern, "%100\\% match\\_test%");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn plain_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid regex"))
}

/// JSON path addressing a top-level metadata key
///
/// Plain identifiers use `$.key`; anything else (spaces, dots, dashes,
/// non-ASCII) is double-quoted as `$."key"` with `"` and `\` escaped. The
/// result is not an SQL literal; quote it through the dialect before
/// embedding it.
pub fn json_path_for_key(key: &str) -> String {
    if plain_key_regex().is_match(key) {
        format!("$.{}", key)
    } else {
        format!("$.\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
