//! Splitting long replies into platform-sized messages.

use async_trait::async_trait;

/// Discord's per-message character limit.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Destination for reply segments.
#[async_trait]
pub trait Reply: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), String>;
}

/// Split `text` into segments of at most `max_chars` characters.
///
/// Cuts only on char boundaries; empty input yields no segments.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::with_capacity(text.len() / max_chars + 1);
    let mut rest = text;

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        segments.push(head);
        rest = tail;
    }

    segments
}

/// Send `text` as consecutive messages, stopping at the first failed send.
pub async fn send_chunked<R: Reply + ?Sized>(reply: &R, text: &str) -> Result<usize, String> {
    let segments = split_message(text, MAX_MESSAGE_LENGTH);
    for segment in &segments {
        reply.send(segment).await?;
    }
    Ok(segments.len())
}
