//! Server-Sent Events (SSE) frame decoder
//!
//! This module provides a buffered SSE parser that handles:
//! - Multi-line data fields
//! - Per-frame event ids and the last-event-id cursor
//! - Comment lines used as keep-alives
//! - Incomplete frames and UTF-8 sequences split across network chunks

/// A decoded SSE frame
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Value of the `event:` field; `None` means the default `message` type
    pub event_type: Option<String>,
    /// All `data:` lines joined with `\n`
    pub data: String,
    /// Value of the `id:` field, when this frame carried one
    pub id: Option<String>,
    /// Reconnection time requested by the server, in milliseconds
    pub retry_ms: Option<u64>,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
            id: None,
            retry_ms: None,
        }
    }

    pub fn with_type(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::new(data)
        }
    }

    /// Event type with the SSE default applied
    pub fn kind(&self) -> &str {
        self.event_type.as_deref().unwrap_or("message")
    }
}

/// Buffered SSE decoder that handles partial chunks
///
/// Frames are separated by a blank line. `\r\n` line endings are folded to
/// `\n` before framing, so mixed endings within one stream are fine.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Decoded text not yet terminated by a blank line
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence cut by the chunk boundary
    incomplete_utf8: Vec<u8>,
    /// Last event id buffer; an empty `id:` resets it
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every frame completed by them
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let bytes = if self.incomplete_utf8.is_empty() {
            chunk.to_vec()
        } else {
            let mut combined = std::mem::take(&mut self.incomplete_utf8);
            combined.extend_from_slice(chunk);
            combined
        };

        let (text, remainder) = decode_utf8_with_remainder(&bytes);
        self.incomplete_utf8 = remainder;
        self.buffer.push_str(&text);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = self.parse_frame(&frame) {
                events.push(event);
            }
        }
        events
    }

    /// Dispatch a final frame left unterminated when the stream closed
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.incomplete_utf8.is_empty() {
            tracing::warn!(
                bytes = self.incomplete_utf8.len(),
                "dropping incomplete UTF-8 sequence at end of stream"
            );
            self.incomplete_utf8.clear();
        }
        let frame = std::mem::take(&mut self.buffer);
        if frame.trim().is_empty() {
            return None;
        }
        self.parse_frame(&frame)
    }

    fn parse_frame(&mut self, frame: &str) -> Option<SseEvent> {
        let mut event_type: Option<String> = None;
        let mut data_lines: Vec<&str> = Vec::new();
        let mut retry_ms = None;
        let mut id = None;

        for line in frame.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => event_type = Some(value.trim().to_string()),
                "data" => data_lines.push(value),
                "id" => {
                    // An id containing NUL is ignored by the format
                    if !value.contains('\0') {
                        let value = value.trim();
                        self.last_id = (!value.is_empty()).then(|| value.to_string());
                        id = self.last_id.clone();
                    }
                }
                "retry" => retry_ms = value.trim().parse().ok(),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type: event_type.filter(|t| !t.is_empty()),
            data: data_lines.join("\n"),
            id,
            retry_ms,
        })
    }

    /// Id of the last frame that carried one
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.incomplete_utf8.clear();
    }

    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty() || !self.incomplete_utf8.is_empty()
    }

    pub fn incomplete_utf8_len(&self) -> usize {
        self.incomplete_utf8.len()
    }
}

/// Split bytes into decoded text and an incomplete trailing sequence
///
/// Invalid bytes in the middle are replaced with U+FFFD; only a sequence cut
/// off by the end of the chunk is held back.
fn decode_utf8_with_remainder(bytes: &[u8]) -> (String, Vec<u8>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), Vec::new()),
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let mut text = String::from_utf8_lossy(&bytes[..valid_up_to]).into_owned();
            match e.error_len() {
                None => (text, bytes[valid_up_to..].to_vec()),
                Some(len) => {
                    tracing::warn!(position = valid_up_to, "invalid UTF-8 in event stream");
                    text.push(char::REPLACEMENT_CHARACTER);
                    let (rest, remainder) = decode_utf8_with_remainder(&bytes[valid_up_to + len..]);
                    text.push_str(&rest);
                    (text, remainder)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"content\": \"hello\"}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"content\": \"hello\"}");
        assert_eq!(events[0].kind(), "message");
    }

    #[test]
    fn test_event_with_type_and_id() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 41\nevent: thinking\ndata: {}\n\n");

        assert_eq!(events[0].event_type.as_deref(), Some("thinking"));
        assert_eq!(events[0].id.as_deref(), Some("41"));
        assert_eq!(decoder.last_event_id(), Some("41"));
    }

    #[test]
    fn test_id_is_per_frame_and_cursor_persists() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\ndata: a\n\ndata: b\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].id, None);
        assert_eq!(decoder.last_event_id(), Some("7"));

        let events = decoder.feed(b"id:\ndata: c\n\n");
        assert_eq!(events[0].id, None);
        assert_eq!(decoder.last_event_id(), None);
    }

    #[test]
    fn test_partial_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: content\ndata: {\"con").is_empty());

        let events = decoder.feed(b"tent\": \"x\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("content"));
        assert_eq!(events[0].data, "{\"content\": \"x\"}");
    }

    #[test]
    fn test_multi_line_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: line1\ndata: line2\ndata:line3\n\n");
        assert_eq!(events[0].data, "line1\nline2\nline3");
    }

    #[test]
    fn test_comments_and_dataless_frames_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\n\nevent: heartbeat\n\nretry: 3000\ndata: x\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].retry_ms, Some(3000));
    }

    #[test]
    fn test_mixed_line_endings_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: complete\r\ndata: {}\r").is_empty());
        let events = decoder.feed(b"\n\r\ndata: next\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type.as_deref(), Some("complete"));
        assert_eq!(events[1].data, "next");
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: complete\ndata: {}").is_empty());
        let event = decoder.finish().unwrap();
        assert_eq!(event.event_type.as_deref(), Some("complete"));
        assert!(!decoder.has_remaining());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        // "é" is C3 A9
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: caf\xC3").is_empty());
        assert_eq!(decoder.incomplete_utf8_len(), 1);

        let events = decoder.feed(b"\xA9\n\n");
        assert_eq!(events[0].data, "café");
        assert_eq!(decoder.incomplete_utf8_len(), 0);
    }

    #[test]
    fn test_utf8_4byte_split_over_many_chunks() {
        // U+1F389 is F0 9F 8E 89
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: \xF0");
        decoder.feed(b"\x9F");
        decoder.feed(b"\x8E");
        assert_eq!(decoder.incomplete_utf8_len(), 3);

        let events = decoder.feed(b"\x89\n\n");
        assert_eq!(events[0].data, "\u{1F389}");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\xFFb\n\n");
        assert_eq!(events[0].data, "a\u{FFFD}b");
    }

    #[test]
    fn test_clear_resets_buffers() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: \xE4\xB8");
        assert!(decoder.has_remaining());
        decoder.clear();
        assert!(!decoder.has_remaining());
    }
}
