//! Error types for protocol parsing

use thiserror::Error;

/// Errors that can occur while parsing protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid BCD encoding in a CI-V frequency field
    #[error("invalid BCD digit: 0x{0:02X}")]
    InvalidBcd(u8),

    /// A reply field that should be numeric is not
    #[error("invalid number in reply: {0:?}")]
    InvalidNumber(String),

    /// A reply is missing an expected field
    #[error("missing field in reply: {0:?}")]
    MissingField(String),

    /// Not one of the eleven amplifier bands
    #[error("unknown band: {0} m")]
    UnknownBand(u16),
}
