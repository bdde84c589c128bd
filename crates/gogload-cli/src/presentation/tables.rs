//! Table formatting utilities for CLI output.

use chrono::{DateTime, Utc};
use indicatif::HumanBytes;

/// Truncates a string to a maximum length in characters, adding "..." if needed.
///
/// # Examples
///
/// ```rust
/// use gogload_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// assert_eq!(truncate_string("Hello World", 8), "Hello...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Human-readable byte count; unknown sizes render as `?`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        "?".to_string()
    } else {
        HumanBytes(bytes).to_string()
    }
}

/// Epoch milliseconds as `YYYY-MM-DD HH:MM` (UTC), or `--`.
pub fn format_timestamp(ms: Option<i64>) -> String {
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| "--".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}
