// ABOUTME: Line-buffering SSE parser for the upstream chat-completion stream
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # SSE Stream Framing
//!
//! The upstream streaming response is a sequence of `data: <json>` frames
//! terminated by a `data: [DONE]` sentinel. TCP does not guarantee alignment
//! between network chunks and frame boundaries, so raw bytes are fed through
//! a line buffer that:
//!
//! 1. emits every complete frame in a chunk (network buffers often batch
//!    several frames into one read), and
//! 2. holds partial trailing lines until the rest arrives.
//!
//! Frame payload interpretation (usage totals, content deltas) lives with
//! the caller; this type only does framing.

use std::mem;

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the JSON string (prefix stripped)
    Data(String),
    /// The `[DONE]` termination sentinel
    Done,
}

/// Line-buffering SSE parser that handles partial lines across chunk boundaries
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Accumulated bytes not yet terminated by a newline
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a network chunk, returning any complete SSE events
    ///
    /// Complete lines (terminated by `\n`) are extracted and parsed; a
    /// trailing partial line stays buffered for the next `feed()` call.
    /// Non-`data:` SSE fields (`event:`, `id:`, `retry:`, comments) are
    /// ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let text = String::from_utf8_lossy(bytes);
        self.buffer.push_str(&text);

        let mut events = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[newline_pos + 1..].to_owned();

            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush any remaining buffered content as a final event
    ///
    /// Called when the byte stream ends with a partial line still buffered
    /// (no trailing newline).
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        Self::parse_line(&remaining).into_iter().collect()
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return None;
        }

        if trimmed == "data: [DONE]" {
            return Some(SseEvent::Done);
        }

        if let Some(data) = trimmed.strip_prefix("data: ") {
            if !data.trim().is_empty() {
                return Some(SseEvent::Data(data.to_owned()));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_frame() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"x\":1}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: {\"delta\":\"he").is_empty());
        let events = parser.feed(b"llo\"}\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"delta\":\"hello\"}".to_owned())]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"x\":1}\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_non_data_fields_ignored() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"event: ping\nid: 7\n: comment\ndata: {\"x\":1}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_flush_emits_unterminated_tail() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: [DONE]").is_empty());
        assert_eq!(parser.flush(), vec![SseEvent::Done]);
    }

    #[test]
    fn test_flush_on_empty_buffer() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.flush().is_empty());
    }
}
