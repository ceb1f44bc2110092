//! Server-Sent-Events line framing.
//!
//! Byte chunks arrive with arbitrary boundaries; this buffer reassembles
//! `\n`-terminated lines (optional trailing `\r` stripped), and dispatches
//! the payload of every line carrying the `data: ` prefix. All other lines
//! (event names, comments, keep-alive blanks) are ignored.

/// What the consumer wants after seeing one data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseAction {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; invoke `on_data` for each complete
    /// `data: ` line. Returns [`SseAction::Stop`] as soon as the consumer
    /// stops; remaining buffered input is discarded in that case.
    pub fn push<F>(&mut self, chunk: &[u8], mut on_data: F) -> SseAction
    where
        F: FnMut(&str) -> SseAction,
    {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        while let Some(line_end) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=line_end).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');

            if let Some(data) = line.strip_prefix("data: ") {
                if on_data(data) == SseAction::Stop {
                    self.buf.clear();
                    return SseAction::Stop;
                }
            }
        }

        SseAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: &[&str]) -> Vec<String> {
        let mut buf = SseLineBuffer::new();
        let mut out = Vec::new();
        for chunk in chunks {
            buf.push(chunk.as_bytes(), |data| {
                out.push(data.to_string());
                SseAction::Continue
            });
        }
        out
    }

    #[test]
    fn single_complete_line() {
        assert_eq!(collect(&["data: hello\n"]), vec!["hello"]);
    }

    #[test]
    fn line_split_across_chunks() {
        assert_eq!(collect(&["data: he", "llo\ndata: wo", "rld\n"]), vec!["hello", "world"]);
    }

    #[test]
    fn crlf_stripped() {
        assert_eq!(collect(&["data: x\r\n"]), vec!["x"]);
    }

    #[test]
    fn non_data_lines_ignored() {
        assert_eq!(
            collect(&["event: message_start\n", ": keep-alive\n", "\n", "data: y\n"]),
            vec!["y"]
        );
    }

    #[test]
    fn empty_data_payload_dispatched() {
        assert_eq!(collect(&["data: \n"]), vec![""]);
    }

    #[test]
    fn incomplete_line_held_back() {
        assert!(collect(&["data: partial"]).is_empty());
    }

    #[test]
    fn stop_discards_remaining_input() {
        let mut buf = SseLineBuffer::new();
        let mut seen = Vec::new();
        let action = buf.push(b"data: one\ndata: two\n", |data| {
            seen.push(data.to_string());
            SseAction::Stop
        });
        assert_eq!(action, SseAction::Stop);
        assert_eq!(seen, vec!["one"]);
    }

    #[test]
    fn done_sentinel_passes_through_as_payload() {
        assert_eq!(collect(&["data: [DONE]\n"]), vec!["[DONE]"]);
    }
}
