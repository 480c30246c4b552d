//! Common utility functions used across relay components

use chrono::Local;

/// Timestamp used to name the files of one session, e.g. `20241005_142301`
pub fn session_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Timestamp recorded on every history entry
pub fn entry_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Truncate text for logging, appending `...` when it was cut
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
