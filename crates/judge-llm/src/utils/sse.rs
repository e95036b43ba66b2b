//! Incremental Server-Sent Events decoder.
//!
//! HTTP bodies arrive in arbitrary byte chunks, so a chunk may end in the middle
//! of a line or of a multi-byte UTF-8 sequence. The decoder buffers both until
//! they are complete.

/// A dispatched SSE event.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty() && self.id.is_none()
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    undecoded: Vec<u8>,
    lines: String,
    current: SseEvent,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes and return every event completed by them.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.undecoded.extend_from_slice(chunk);
        let text = match std::str::from_utf8(&self.undecoded) {
            Ok(text) => {
                let text = text.to_string();
                self.undecoded.clear();
                text
            }
            // Incomplete trailing sequence: keep it for the next chunk.
            Err(error) if error.error_len().is_none() => {
                let valid = error.valid_up_to();
                let text = String::from_utf8_lossy(&self.undecoded[..valid]).into_owned();
                self.undecoded.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.undecoded).into_owned();
                self.undecoded.clear();
                text
            }
        };
        self.push_str(&text)
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.lines.push_str(chunk);
        let mut events = Vec::new();

        while let Some(end) = self.lines.find('\n') {
            let line: String = self.lines.drain(..=end).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(event) = self.apply_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush whatever is buffered once the body has ended.
    pub fn finish(mut self) -> Option<SseEvent> {
        if !self.undecoded.is_empty() {
            let tail = String::from_utf8_lossy(&self.undecoded).into_owned();
            self.lines.push_str(&tail);
        }
        let remainder = std::mem::take(&mut self.lines);
        for line in remainder.lines() {
            if let Some(event) = self.apply_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        if self.current.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    fn apply_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.current.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.current));
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.current.event = Some(value.to_string()),
            "data" => {
                if !self.current.data.is_empty() {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
            }
            "id" => self.current.id = Some(value.to_string()),
            _ => {}
        }
        None
    }
}
