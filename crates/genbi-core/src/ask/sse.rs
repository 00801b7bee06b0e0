//! SSE frame decoding
//!
//! Turns a raw byte stream into discrete frames regardless of how the
//! transport split it. Bytes are buffered until a full line terminator has
//! been seen, so a chunk boundary anywhere - including inside a multi-byte
//! character - never corrupts a payload.

use bytes::BytesMut;

/// One decoded block of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Value of the block's `event:` line, if it had one
    pub event: Option<String>,
    /// Concatenated payload of the block's `data:` lines
    pub data: String,
}

/// Incremental decoder for the blank-line-delimited event-stream format
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes received but not yet terminated by a newline
    buffer: BytesMut,
    /// Event name of the currently-open frame
    event: Option<String>,
    /// Payload of the currently-open frame
    data: String,
    /// Whether the open frame has seen at least one `data:` line
    has_data: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every frame it completes
    ///
    /// Frames are returned strictly in arrival order and never twice. A
    /// frame still open when the stream ends is simply never emitted; the
    /// caller drops the decoder.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line_bytes[..pos]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.flush();
        }
        // Comment lines (keep-alives) per the SSE format
        if line.starts_with(':') {
            return None;
        }
        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.strip_prefix(' ').unwrap_or(value).to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
            self.has_data = true;
        }
        None
    }

    /// Close the open frame, emitting it only if it carried any payload
    fn flush(&mut self) -> Option<Frame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if !std::mem::take(&mut self.has_data) {
            return None;
        }
        Some(Frame { event, data })
    }
}
