//! Token estimation.
//!
//! Character heuristic: one token per four bytes of UTF-8, rounded up.
//! Used for the retrieved-context budget and for chunk sizing at ingestion.

use crate::message::Message;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a slice of messages, with a per-message overhead of
/// four tokens for the role and wire delimiters.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| 4 + estimate_tokens(&m.content)).sum()
}

/// Largest char boundary of `s` that is `<= index`.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
