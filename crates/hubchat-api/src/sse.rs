//! Server-Sent Events (SSE) framer.
//!
//! Splits decoded response text into event blocks on the blank-line
//! terminator (`\n\n`) and parses each block's `event:` and `data:` lines.
//! Data is kept verbatim: the server encodes meaningful leading spaces, so
//! only the literal `data:` prefix is removed.

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event_name: Option<String>,
    pub data_lines: Vec<String>,
}

impl SseEvent {
    /// Data lines joined by `\n`.
    pub fn data(&self) -> String {
        self.data_lines.join("\n")
    }
}

/// Incremental SSE parser that turns text into events.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of text and return any complete events, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find("\n\n") {
            events.push(Self::parse_block(&self.buffer[..pos]));
            self.buffer.drain(..pos + 2);
        }

        events
    }

    /// Take whatever is left once the body has ended. Leftovers made only of
    /// whitespace are discarded.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return None;
        }
        Some(Self::parse_block(&rest))
    }

    /// Bytes of text received but not yet framed.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Parse a single SSE block (lines between double newlines) into an event.
    fn parse_block(block: &str) -> SseEvent {
        let mut event = SseEvent::default();

        for line in block.split('\n') {
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix("event:") {
                event.event_name = Some(name.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                event.data_lines.push(value.to_string());
            }
        }

        event
    }
}
