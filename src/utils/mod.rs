pub mod config;

pub use config::Config;

/// Cut `text` down to at most `max_chars` characters without splitting a
/// UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
