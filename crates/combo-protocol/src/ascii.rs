//! Shared framing for the `;`-terminated ASCII links
//!
//! Both Elecraft devices (KAT500 tuner, KPA500 amplifier) speak ASCII
//! messages terminated by a semicolon. Replies echo the command prefix:
//! `FLT;` is answered with `FLT0;`, `^WS;` with `^WS100 123;`.

/// Maximum buffered bytes before old data is discarded
const MAX_BUFFER_LEN: usize = 256;

/// Streaming splitter for `;`-terminated ASCII messages
///
/// Yields messages with the terminator stripped. Bytes that are not valid
/// UTF-8 are replaced rather than dropped; the parsers reject them later.
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(32),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() > MAX_BUFFER_LEN {
            let start = self.buffer.len() - MAX_BUFFER_LEN;
            tracing::warn!("message buffer overrun, discarding {start} bytes");
            self.buffer.drain(..start);
        }
    }

    /// Try to extract the next complete message, terminator stripped
    pub fn next_message(&mut self) -> Option<String> {
        let term_pos = self.buffer.iter().position(|&b| b == b';')?;
        let msg: Vec<u8> = self.buffer.drain(..=term_pos).collect();
        Some(String::from_utf8_lossy(&msg[..msg.len() - 1]).into_owned())
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminator() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"FLT0;^WS1");
        assert_eq!(codec.next_message().as_deref(), Some("FLT0"));
        assert_eq!(codec.next_message(), None);

        codec.push_bytes(b"00 123;");
        assert_eq!(codec.next_message().as_deref(), Some("^WS100 123"));
    }

    #[test]
    fn empty_message() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b";");
        assert_eq!(codec.next_message().as_deref(), Some(""));
    }
}
