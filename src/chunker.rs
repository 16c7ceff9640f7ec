//! Split text into messages that fit the chat platform's size limit.

use std::num::NonZeroUsize;

/// Split `text` into consecutive slices of at most `max_len` characters.
///
/// Slices end on character boundaries, never inside a multi-byte character.
/// Lines are not respected, matching the platform's own raw limit.
/// Concatenating the result gives back `text` exactly; empty text yields no
/// chunks.
pub fn chunk(text: &str, max_len: NonZeroUsize) -> Vec<String> {
    let max_len = max_len.get();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = text[start..]
            .char_indices()
            .nth(max_len)
            .map_or(text.len(), |(offset, _)| start + offset);
        chunks.push(text[start..end].to_string());
        start = end;
    }

    chunks
}
