//! Incremental SSE wire decoding
//!
//! The decoder is fed raw body chunks and yields complete frames. Frame
//! boundaries are blank lines; multi-line `data` fields are joined with
//! newlines per the wire format. Comment lines (leading `:`) and fields we
//! do not use (`id`, `retry`) are skipped.

/// One complete frame off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event` field, if the frame carried one
    pub event: Option<String>,
    pub data: String,
}

/// Stateful decoder over a stream of body chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let raw: String = self.buffer.drain(..=pos).collect();
            let line = raw.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        frames
    }

    /// Complete the pending frame. Frames with no data lines are dropped,
    /// but a pending event name is always consumed.
    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();

        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}
