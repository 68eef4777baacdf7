//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only `data:` fields matter to the model endpoint. The data lines of one
//! event are joined with `\n` and handed back when the blank line closing the
//! event arrives. Comments, event names and ids are ignored.

use memchr::memchr;
use tracing::warn;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes; returns the payload of every completed event.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(payload) = self.process_line(&line[..newline_pos]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush an event the body ended in without a closing blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            if let Some(payload) = self.process_line(&rest) {
                return Some(payload);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim_end_matches('\r'),
            Err(err) => {
                warn!(error = %err, "invalid UTF-8 in event stream");
                return None;
            }
        };
        if line.trim().is_empty() {
            return self.dispatch();
        }
        if let Some(data) = extract_data_payload(line) {
            self.data_lines.push(data.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let payload = std::mem::take(&mut self.data_lines).join("\n");
        let payload = payload.trim();
        (!payload.is_empty()).then(|| payload.to_string())
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_spacing_variants_and_crlf() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\r\n\r\ndata:{\"b\":2}\n\n");
        assert_eq!(payloads, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn reassembles_lines_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"te").is_empty());
        assert!(decoder.push(b"xt\":\"hi\"}").is_empty());
        assert!(decoder.push(b"\n").is_empty());
        assert_eq!(decoder.push(b"\n"), vec![r#"{"text":"hi"}"#]);
    }

    #[test]
    fn joins_multi_line_data_within_one_event() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"text\":\ndata:  \"wrapped\"}\n\ndata: {}\n\n");
        assert_eq!(payloads, vec!["{\"text\":\n\"wrapped\"}", "{}"]);

        let joined: serde_json::Value =
            serde_json::from_str(&payloads[0]).expect("joined payload is valid JSON");
        assert_eq!(joined["text"], "wrapped");
    }

    #[test]
    fn keeps_multibyte_characters_split_across_chunks() {
        let event = "data: {\"text\":\"héllo\"}\n\n".as_bytes();
        let split = event.iter().position(|b| *b == 0xC3).expect("multibyte start") + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&event[..split]).is_empty());
        assert_eq!(decoder.push(&event[split..]), vec![r#"{"text":"héllo"}"#]);
    }

    #[test]
    fn ignores_non_data_fields() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata:\n\n");
        assert!(payloads.is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: head\ndata: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("head\ntail"));
        assert_eq!(decoder.finish(), None);
    }
}
