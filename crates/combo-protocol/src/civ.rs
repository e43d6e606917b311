//! Icom CI-V Protocol Implementation
//!
//! The CI-V (Communication Interface V) protocol is used by Icom
//! transceivers. It uses framed variable-length binary messages with
//! address-based routing.
//!
//! # Frame Format
//! ```text
//! FE FE [to] [from] [cmd] [data...] FD
//! ```
//!
//! - `FE FE`: Preamble (two bytes)
//! - `to`: Destination address (radio address or 0xE0 for controller)
//! - `from`: Source address
//! - `cmd`: Command code
//! - `data`: Variable length data (BCD encoded for frequencies)
//! - `FD`: Terminator
//!
//! # Frequency Encoding
//! Frequencies are encoded in BCD (Binary Coded Decimal), little-endian.
//! Example: 14.250.000 Hz = 00 00 25 14 00
//!
//! The radio pushes an 11-byte frequency broadcast on every dial change; the
//! same bus carries unrelated broadcast traffic, so frames are validated by
//! length and destination byte before any decoding is attempted.

use crate::error::ParseError;

/// CI-V frame preamble byte
pub const PREAMBLE: u8 = 0xFE;
/// CI-V frame terminator byte
pub const TERMINATOR: u8 = 0xFD;
/// The controller's own CI-V address
pub const CONTROLLER_ADDR: u8 = 0xE0;
/// Broadcast destination address
pub const BROADCAST_ADDR: u8 = 0x00;
/// Status byte in a directed reply meaning the command was accepted
pub const STATUS_OK: u8 = 0xFB;
/// Status byte in a directed reply meaning the command was rejected
pub const STATUS_NG: u8 = 0xFA;

/// Length of a frequency broadcast frame
const FREQ_FRAME_LEN: usize = 11;
/// Length of a directed acknowledgment frame
const ACK_FRAME_LEN: usize = 6;

/// Maximum buffered bytes before old data is discarded
const MAX_BUFFER_LEN: usize = 256;

/// Streaming CI-V frame splitter
///
/// Accumulates bytes and yields one raw frame per `0xFD` terminator. Shape
/// validation is left to the per-frame parsers so that unrelated bus traffic
/// simply fails to match rather than desynchronizing the stream.
pub struct CivCodec {
    buffer: Vec<u8>,
}

impl CivCodec {
    /// Create a new CI-V codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent buffer overflow from a babbling device
        if self.buffer.len() > MAX_BUFFER_LEN {
            let start = self.buffer.len() - MAX_BUFFER_LEN;
            tracing::warn!("CI-V buffer overrun, discarding {start} bytes");
            self.buffer.drain(..start);
        }
    }

    /// Try to extract the next complete frame, terminator included
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let term_pos = self.buffer.iter().position(|&b| b == TERMINATOR)?;
        Some(self.buffer.drain(..=term_pos).collect())
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for CivCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode the one-shot "read operating frequency" command
pub fn query_frequency(radio_addr: u8) -> Vec<u8> {
    vec![
        PREAMBLE,
        PREAMBLE,
        radio_addr,
        CONTROLLER_ADDR,
        0x03,
        TERMINATOR,
    ]
}

/// Encode the "set RF power level" command (cmd 0x14, subcmd 0x0A)
///
/// The level is the radio's native 0-255 scale, carried as four decimal
/// digits packed BCD: 77 becomes `00 77`, 255 becomes `02 55`.
pub fn set_rf_power(radio_addr: u8, level: u16) -> Vec<u8> {
    let [hi, lo] = level_to_bcd(level);
    vec![
        PREAMBLE,
        PREAMBLE,
        radio_addr,
        CONTROLLER_ADDR,
        0x14,
        0x0A,
        hi,
        lo,
        TERMINATOR,
    ]
}

/// Map a power percentage (0-100) to the radio's native 0-255 level
///
/// Rounds up so any nonzero request produces a nonzero level.
pub fn percent_to_level(percent: u8) -> u16 {
    (u16::from(percent) * 255).div_ceil(100)
}

/// Parse a frame as an operating-frequency broadcast
///
/// Returns `None` unless the frame is exactly 11 bytes addressed to the
/// controller or to broadcast with a well-formed BCD payload; anything else
/// is unrelated bus traffic, not an error.
pub fn parse_frequency_broadcast(frame: &[u8]) -> Option<u64> {
    if frame.len() != FREQ_FRAME_LEN {
        return None;
    }
    if frame[2] != CONTROLLER_ADDR && frame[2] != BROADCAST_ADDR {
        return None;
    }

    bcd_to_frequency(&frame[5..10]).ok()
}

/// Parse a frame as a directed acknowledgment for the controller
///
/// Returns `Some(true)` for an accept (`FB`), `Some(false)` for any other
/// status byte, `None` if the frame is not a directed reply at all.
pub fn parse_directed_ack(frame: &[u8]) -> Option<bool> {
    if frame.len() != ACK_FRAME_LEN || frame[2] != CONTROLLER_ADDR {
        return None;
    }
    Some(frame[4] == STATUS_OK)
}

/// Parse a frame as a "set RF power level" command, returning the native
/// level (used by the simulated radio and by tests)
pub fn parse_set_rf_power(frame: &[u8]) -> Option<u16> {
    if frame.len() != 9 || frame[4] != 0x14 || frame[5] != 0x0A {
        return None;
    }
    let digits = [
        frame[6] >> 4,
        frame[6] & 0x0F,
        frame[7] >> 4,
        frame[7] & 0x0F,
    ];
    if digits.iter().any(|&d| d > 9) {
        return None;
    }
    Some(digits.iter().fold(0u16, |acc, &d| acc * 10 + u16::from(d)))
}

/// Build a frequency broadcast frame as the radio would send it
/// (used by the simulated radio and by tests)
pub fn frequency_broadcast(radio_addr: u8, hz: u64) -> Vec<u8> {
    let mut frame = vec![PREAMBLE, PREAMBLE, BROADCAST_ADDR, radio_addr, 0x00];
    frame.extend(frequency_to_bcd(hz));
    frame.push(TERMINATOR);
    frame
}

/// Build a directed acknowledgment frame as the radio would send it
pub fn directed_ack(radio_addr: u8, accepted: bool) -> Vec<u8> {
    vec![
        PREAMBLE,
        PREAMBLE,
        CONTROLLER_ADDR,
        radio_addr,
        if accepted { STATUS_OK } else { STATUS_NG },
        TERMINATOR,
    ]
}

/// Convert BCD-encoded bytes to frequency in Hz
///
/// CI-V uses little-endian BCD (least significant digit first).
fn bcd_to_frequency(data: &[u8]) -> Result<u64, ParseError> {
    let mut freq: u64 = 0;
    let mut multiplier: u64 = 1;

    for &byte in data {
        let low = u64::from(byte & 0x0F);
        let high = u64::from((byte >> 4) & 0x0F);

        if low > 9 || high > 9 {
            return Err(ParseError::InvalidBcd(byte));
        }

        freq += low * multiplier;
        multiplier *= 10;
        freq += high * multiplier;
        multiplier *= 10;
    }

    Ok(freq)
}

/// Convert frequency in Hz to 5 bytes (10 BCD digits), little-endian
pub fn frequency_to_bcd(hz: u64) -> [u8; 5] {
    let mut result = [0u8; 5];
    let mut remaining = hz;

    for byte in &mut result {
        let low = (remaining % 10) as u8;
        remaining /= 10;
        let high = (remaining % 10) as u8;
        remaining /= 10;
        *byte = (high << 4) | low;
    }

    result
}

/// Render the native level as four decimal digits packed BCD, two bytes
fn level_to_bcd(level: u16) -> [u8; 2] {
    let hi = ((level / 1000 % 10) as u8) << 4 | (level / 100 % 10) as u8;
    let lo = ((level / 10 % 10) as u8) << 4 | (level % 10) as u8;
    [hi, lo]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn query_frequency_bytes() {
        assert_eq!(
            query_frequency(0x94),
            vec![0xFE, 0xFE, 0x94, 0xE0, 0x03, 0xFD]
        );
    }

    #[test]
    fn set_rf_power_bytes() {
        // 30% maps to native 77, packed as decimal digits 0077
        assert_eq!(
            set_rf_power(0x94, 77),
            vec![0xFE, 0xFE, 0x94, 0xE0, 0x14, 0x0A, 0x00, 0x77, 0xFD]
        );
        assert_eq!(
            set_rf_power(0x94, 255),
            vec![0xFE, 0xFE, 0x94, 0xE0, 0x14, 0x0A, 0x02, 0x55, 0xFD]
        );
    }

    #[test]
    fn percent_mapping_endpoints() {
        assert_eq!(percent_to_level(0), 0);
        assert_eq!(percent_to_level(30), 77);
        assert_eq!(percent_to_level(100), 255);
    }

    #[test]
    fn parse_frequency_broadcast_frame() {
        // 14.250.000 Hz from radio 0x94, broadcast destination
        let frame = [
            0xFE, 0xFE, 0x00, 0x94, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD,
        ];
        assert_eq!(parse_frequency_broadcast(&frame), Some(14_250_000));

        // Directed to the controller also counts
        let frame = [
            0xFE, 0xFE, 0xE0, 0x94, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD,
        ];
        assert_eq!(parse_frequency_broadcast(&frame), Some(14_250_000));
    }

    #[test]
    fn rejects_wrong_destination() {
        let frame = [
            0xFE, 0xFE, 0x42, 0x94, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD,
        ];
        assert_eq!(parse_frequency_broadcast(&frame), None);
    }

    #[test]
    fn rejects_wrong_length() {
        let frame = [0xFE, 0xFE, 0x00, 0x94, 0x00, 0x25, 0x14, 0x00, 0xFD];
        assert_eq!(parse_frequency_broadcast(&frame), None);
    }

    #[test]
    fn rejects_non_bcd_payload() {
        let frame = [
            0xFE, 0xFE, 0x00, 0x94, 0x00, 0x00, 0x00, 0xAB, 0x14, 0x00, 0xFD,
        ];
        assert_eq!(parse_frequency_broadcast(&frame), None);
    }

    #[test]
    fn parse_ack_frames() {
        let frame = [0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD];
        assert_eq!(parse_directed_ack(&frame), Some(true));

        let frame = [0xFE, 0xFE, 0xE0, 0x94, 0xFA, 0xFD];
        assert_eq!(parse_directed_ack(&frame), Some(false));

        // A broadcast is not an ack for us
        let frame = [0xFE, 0xFE, 0x00, 0x94, 0xFB, 0xFD];
        assert_eq!(parse_directed_ack(&frame), None);
    }

    #[test]
    fn streaming_split_on_terminator() {
        let mut codec = CivCodec::new();

        // Push a partial frame
        codec.push_bytes(&[0xFE, 0xFE, 0xE0, 0x94]);
        assert!(codec.next_frame().is_none());

        // Push the rest plus the start of another frame
        codec.push_bytes(&[0xFB, 0xFD, 0xFE, 0xFE]);
        assert_eq!(
            codec.next_frame(),
            Some(vec![0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD])
        );
        assert!(codec.next_frame().is_none());
    }

    #[test]
    fn power_command_roundtrip() {
        let frame = set_rf_power(0x94, 77);
        assert_eq!(parse_set_rf_power(&frame), Some(77));
    }

    #[test]
    fn broadcast_roundtrip() {
        let frame = frequency_broadcast(0x94, 7_074_000);
        assert_eq!(parse_frequency_broadcast(&frame), Some(7_074_000));
    }

    proptest! {
        #[test]
        fn bcd_roundtrip(hz in 0u64..10_000_000_000) {
            let bcd = frequency_to_bcd(hz);
            prop_assert_eq!(bcd_to_frequency(&bcd).unwrap(), hz);
        }

        #[test]
        fn percent_mapping_in_range(percent in 0u8..=100) {
            let level = percent_to_level(percent);
            prop_assert!(level <= 255);
            // Nonzero percent never rounds down to zero drive
            if percent > 0 {
                prop_assert!(level > 0);
            }
        }

        #[test]
        fn power_frame_roundtrip(level in 0u16..=255) {
            let frame = set_rf_power(0x94, level);
            prop_assert_eq!(parse_set_rf_power(&frame), Some(level));
        }
    }
}
