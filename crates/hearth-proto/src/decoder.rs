//! Incremental line decoder.
//!
//! Bytes arrive in whatever chunks the transport produced. A line is emitted
//! only once its terminator has been seen; everything after the last
//! terminator is held for the next call.

use bytes::BytesMut;

use crate::{
    LINE_TERMINATOR,
    errors::{ProtocolError, Result},
};

/// Reassembles newline-terminated lines from a byte stream.
///
/// One decoder per connection. The pending buffer is unbounded: a peer that
/// never sends a terminator keeps growing it.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to contain no terminator
    scanned: usize,
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line they complete, in order.
    ///
    /// Lines come back without their `\n`. A carriage return before it is
    /// kept; command parsing trims it. A chunk that completes nothing returns
    /// an empty vector.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidUtf8` if a completed line is not UTF-8. Lines
    ///   completed earlier in the same chunk are discarded with it; the caller
    ///   is expected to drop the connection.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(offset) =
            self.buffer[self.scanned..].iter().position(|&b| b == LINE_TERMINATOR)
        {
            let end = self.scanned + offset;
            let line = self.buffer.split_to(end + 1);
            self.scanned = 0;

            let text = std::str::from_utf8(&line[..end])
                .map_err(|e| ProtocolError::InvalidUtf8 { valid_up_to: e.valid_up_to() })?;
            lines.push(text.to_owned());
        }
        self.scanned = self.buffer.len();

        Ok(lines)
    }

    /// Number of bytes held for an unterminated line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
