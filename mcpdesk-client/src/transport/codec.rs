//! Incremental `text/event-stream` decoder

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// `message` when the stream did not name one
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Feeds on raw chunks, yields complete events
///
/// Chunks may split lines and even UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if let Some(event) = self.feed_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }

        events
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_endpoint_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: endpoint\ndata: /messages/?session_id=abc\n\n");

        assert_eq!(
            events,
            vec![SseEvent {
                event: "endpoint".to_string(),
                data: "/messages/?session_id=abc".to_string(),
                id: None,
            }]
        );
    }

    #[test]
    fn test_handles_split_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"id: 7\r\nda").is_empty());
        assert!(decoder.push(b"ta: {\"a\":").is_empty());
        let events = decoder.push(b" 1}\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"a\": 1}");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_joins_multiline_data_and_skips_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\ndata: one\ndata: two\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: héllo\n\n".as_bytes();
        let (head, tail) = bytes.split_at(8);

        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail)[0].data, "héllo");
    }
}
