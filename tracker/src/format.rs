//! String and timestamp formatting helpers for report output.

use chrono::{DateTime, Local};

/// Timestamp format used in report output.
pub const DATE_TIME_FORMAT: &str = "%d.%m.%Y-%H:%M:%S%.3f";

/// Shorten `string` to at most `max_len` characters by replacing the middle
/// with `...`, keeping prefix and suffix symmetrically.
pub fn cut_string(string: &str, max_len: usize) -> String {
    cut_string_with(string, max_len, "...")
}

/// Like [`cut_string`] with an explicit replacement marker.
///
/// Strings of `max_len` characters or fewer are returned unchanged. Counts
/// characters, not bytes, so multi-byte input never splits a code point.
pub fn cut_string_with(string: &str, max_len: usize, replacement: &str) -> String {
    let len = string.chars().count();
    if len <= max_len {
        return string.to_string();
    }
    let keep = max_len.saturating_sub(replacement.chars().count()) / 2;
    let prefix: String = string.chars().take(keep).collect();
    let suffix: String = string.chars().skip(len - keep).collect();
    format!("{prefix}{replacement}{suffix}")
}

/// Render a timestamp the way the report expects it.
pub fn log_time(time: DateTime<Local>) -> String {
    time.format(DATE_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_string_truncates_middle_symmetrically() {
        let cut = cut_string("abcdefghij", 6);
        assert!(cut.chars().count() <= 6);
        assert_eq!(cut, "a...j");
    }

    #[test]
    fn cut_string_keeps_short_strings() {
        assert_eq!(cut_string("abc", 6), "abc");
        assert_eq!(cut_string("abcdef", 6), "abcdef");
    }

    #[test]
    fn cut_string_with_custom_replacement() {
        assert_eq!(cut_string_with("abcdefghij", 8, ".."), "abc..hij");
    }

    #[test]
    fn cut_string_counts_characters_not_bytes() {
        let cut = cut_string("äöüäöüäöüä", 6);
        assert!(cut.chars().count() <= 6);
        assert_eq!(cut, "ä...ä");
    }
}
