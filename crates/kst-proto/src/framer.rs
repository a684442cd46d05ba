//! Line framing for the chat byte stream.
//!
//! [`LineCodec`] is a `tokio_util` codec: the decoder splits on `\n` (which
//! also covers `\r\n`) and the encoder appends `\r\n`. [`LineFramer`] wraps
//! the decoder with its own receive buffer so the session can be fed
//! arbitrary chunks without owning any I/O.
//!
//! The server writes prompts without a line terminator. The unterminated
//! tail is therefore observable through [`LineFramer::pending`] and can be
//! consumed with [`LineFramer::take_pending`] once the caller has decided
//! that it is a prompt rather than the start of a longer line.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Wire terminator appended to every outbound line.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Newline-delimited text codec.
///
/// Decoded lines are lossily converted from UTF-8, trimmed of surrounding
/// whitespace and control characters, and empty lines are skipped.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
}

impl LineCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self { next_index: 0 }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                // No complete line yet - remember where we stopped
                self.next_index = src.len();
                return Ok(None);
            };

            let raw = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let line = clean_line(&raw);
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + LINE_TERMINATOR.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(LINE_TERMINATOR);
        Ok(())
    }
}

/// Decode one raw line and strip framing noise around it.
fn clean_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_owned()
}

/// Restartable byte-to-line splitter.
///
/// Feeding the same bytes in any fragmentation yields the same line
/// sequence, and a line spanning several feeds is emitted exactly once.
#[derive(Debug, Default)]
pub struct LineFramer {
    codec: LineCodec,
    buffer: BytesMut,
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self { codec: LineCodec::new(), buffer: BytesMut::new() }
    }

    /// Append `chunk` and return every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Ok(Some(line)) = self.codec.decode(&mut self.buffer) {
            lines.push(line);
        }
        lines
    }

    /// The unterminated tail, cleaned like a complete line. `None` if empty.
    pub fn pending(&self) -> Option<String> {
        let tail = clean_line(&self.buffer);
        (!tail.is_empty()).then_some(tail)
    }

    /// Consume the unterminated tail.
    pub fn take_pending(&mut self) -> Option<String> {
        let tail = self.pending();
        self.clear();
        tail
    }

    /// Number of buffered bytes not yet emitted as a line.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.codec.next_index = 0;
    }
}
