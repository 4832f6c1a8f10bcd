//! Server-sent event stream parser
//!
//! Incrementally parses a `text/event-stream` body from any `BufRead`.
//! Events are dispatched on blank lines; an event still being assembled when
//! the stream ends is discarded.

use std::io::{self, BufRead};
use std::time::Duration;

/// Default event type when no `event:` field is given
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`message` unless the server named one)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event ID seen at dispatch time
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether this event would reach a plain `onmessage` handler
    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}

/// Iterator of events over an SSE body
pub struct EventStream<R> {
    reader: R,
    raw_line: Vec<u8>,
    /// Last line ended with CR; a following LF belongs to it
    after_cr: bool,
    data: String,
    event_type: String,
    last_event_id: Option<String>,
    retry: Option<Duration>,
    at_start: bool,
}

impl<R: BufRead> EventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            raw_line: Vec::with_capacity(1024),
            after_cr: false,
            data: String::new(),
            event_type: String::new(),
            last_event_id: None,
            retry: None,
            at_start: true,
        }
    }

    /// Reconnection delay most recently advertised by the server
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Last event ID buffer
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Read the next logical line, or `None` at end of stream.
    ///
    /// Lines end at LF, CRLF or a bare CR. A CRLF split across two buffer
    /// fills still ends a single line.
    fn next_line(&mut self) -> io::Result<Option<String>> {
        self.raw_line.clear();
        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            // A final line without a terminator never completes an event
            if buf.is_empty() {
                return Ok(None);
            }

            if self.after_cr {
                self.after_cr = false;
                if buf[0] == b'\n' {
                    self.reader.consume(1);
                    continue;
                }
            }

            match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(end) => {
                    self.after_cr = buf[end] == b'\r';
                    self.raw_line.extend_from_slice(&buf[..end]);
                    self.reader.consume(end + 1);
                    break;
                }
                None => {
                    let len = buf.len();
                    self.raw_line.extend_from_slice(buf);
                    self.reader.consume(len);
                }
            }
        }

        let mut bytes = &self.raw_line[..];
        if self.at_start {
            self.at_start = false;
            if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
                bytes = rest;
            }
        }
        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Apply one line to the event being assembled
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
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
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            other => {
                tracing::debug!("Ignoring unknown SSE field: {}", other);
            }
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        let event = if event_type.is_empty() {
            DEFAULT_EVENT_TYPE.to_string()
        } else {
            event_type
        };

        Some(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
        })
    }
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = io::Result<SseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            if let Some(event) = self.process_line(&line) {
                return Some(Ok(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn parse(body: &str) -> Vec<SseEvent> {
        EventStream::new(Cursor::new(body.as_bytes().to_vec()))
            .map(|e| e.unwrap())
            .collect()
    }

    #[test]
    fn test_single_data_events() {
        let events = parse("data: aGVsbG8\n\ndata: d29ybGQ\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "aGVsbG8");
        assert_eq!(events[0].event, "message");
        assert!(events[0].is_message());
        assert_eq!(events[1].data, "d29ybGQ");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let events = parse(": keep-alive\ndata: first\ndata:second\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn test_crlf_and_bare_cr_line_endings() {
        let events = parse("data: a\r\n\r\ndata: b\r\rdata: c\n\n");
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b", "c"]);

        let events = parse("data: b\r\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "b");
    }

    #[test]
    fn test_cr_only_stream() {
        let events = parse("data: a\r\rdata: b\r\r");
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[test]
    fn test_crlf_split_across_reads() {
        // Capacity 8 ends the first fill right after "data: a\r"
        let body = b"data: a\r\n\r\ndata: b\r\n\r\n".to_vec();
        let reader = BufReader::with_capacity(8, Cursor::new(body));
        let data: Vec<String> = EventStream::new(reader).map(|e| e.unwrap().data).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[test]
    fn test_bom_is_skipped() {
        let events = parse("\u{FEFF}data: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_named_events_and_ids() {
        let events = parse("event: status\nid: 7\ndata: up\n\ndata: next\n\n");
        assert_eq!(events[0].event, "status");
        assert!(!events[0].is_message());
        assert_eq!(events[0].id.as_deref(), Some("7"));
        // Event type resets, id persists
        assert_eq!(events[1].event, "message");
        assert_eq!(events[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_empty_data_not_dispatched() {
        let events = parse("event: ping\n\ndata\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_unterminated_event_discarded() {
        let events = parse("data: done\n\ndata: partial\n");
        assert_eq!(events.len(), 1);
        let events = parse("data: done\n\ndata: partial");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_retry_field() {
        let mut stream = EventStream::new(Cursor::new(b"retry: 1500\nretry: x\ndata: a\n\n".to_vec()));
        assert!(stream.next().is_some());
        assert_eq!(stream.retry(), Some(Duration::from_millis(1500)));
        assert_eq!(stream.last_event_id(), None);
    }
}
