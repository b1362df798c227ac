use std::collections::VecDeque;
use std::str::Utf8Error;

/// Byte ring buffer that yields complete `\n`-terminated lines.
///
/// Bytes are only decoded once a full line is present, so a UTF-8 sequence
/// split across network chunks is reassembled before decoding.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Next complete line with surrounding whitespace (including `\r`) trimmed.
    /// `None` until a newline has been buffered.
    pub fn next_line(&mut self) -> Option<Result<String, Utf8Error>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

        Some(std::str::from_utf8(&line_bytes).map(|line| line.trim().to_string()))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
