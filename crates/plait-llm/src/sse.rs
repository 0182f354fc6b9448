//! Incremental decoder for Server-Sent Events `data:` payloads.
//!
//! Chat-completions streams only carry `data` fields, so the decoder
//! collapses each event to its joined data payload and drops comments and
//! other fields.

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the response body; returns the data payload of each
    /// event completed by this chunk.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();

        while let Some(position) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=position).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    payloads.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data_lines
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments and non-data fields are ignored.
        }

        payloads
    }

    /// Data payload of an event left unterminated when the body ends.
    pub fn finish(mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let trailing = std::mem::take(&mut self.buffer);
            self.feed(&format!("{trailing}\n"));
        }
        if self.data_lines.is_empty() {
            None
        } else {
            Some(self.data_lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed("data: hello\ndata: world\n\n");
        assert_eq!(payloads, vec!["hello\nworld".to_string()]);
    }

    #[test]
    fn skips_comments_and_foreign_fields() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(": keepalive\nevent: message\ndata: hi\n\n");
        assert_eq!(payloads, vec!["hi".to_string()]);
    }

    #[test]
    fn buffers_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed("data: par").is_empty());
        let payloads = decoder.feed("tial\n\ndata: next\n\n");
        assert_eq!(payloads, vec!["partial".to_string(), "next".to_string()]);
    }

    #[test]
    fn finish_flushes_an_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed("data: tail").is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
    }
}
