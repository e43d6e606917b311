//! Elecraft KAT500 Antenna Tuner Protocol
//!
//! ASCII commands terminated by `;`. Queries are answered with the command
//! prefix echoed back:
//!
//! ```text
//! FLT;   -> FLT0;        fault identifier (0 = none)
//! VSWR;  -> VSWR 1.32;   last measured VSWR
//! FT;    -> FT;          full-tune acknowledgment (sent when tuning ends)
//! F 14250;               set frequency in kHz (no reply)
//! ```
//!
//! Reply parsers take the payload after the echoed prefix. An *empty*
//! payload is how the tuner presents "no answer" (powered off or
//! disconnected); the link layer maps that to the per-query sentinel rather
//! than treating it as an error.

use crate::error::ParseError;

/// Query the active fault identifier
pub const FAULT_QUERY: &str = "FLT;";
/// Reply prefix for the fault query
pub const FAULT_PREFIX: &str = "FLT";

/// Query the last measured VSWR
pub const VSWR_QUERY: &str = "VSWR;";
/// Reply prefix for the VSWR query
pub const VSWR_PREFIX: &str = "VSWR";

/// Start a full tune cycle
pub const FULL_TUNE: &str = "FT;";
/// Reply prefix for the full-tune acknowledgment
pub const FULL_TUNE_PREFIX: &str = "FT";

/// Encode the set-frequency command; the tuner wants kHz, truncated from Hz
pub fn set_frequency(hz: u64) -> String {
    format!("F {};", hz / 1000)
}

/// Parse the payload of a fault reply into the fault identifier
pub fn parse_fault(payload: &str) -> Result<u8, ParseError> {
    payload
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))
}

/// Parse the payload of a VSWR reply
pub fn parse_vswr(payload: &str) -> Result<f64, ParseError> {
    payload
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_frequency_truncates_to_khz() {
        assert_eq!(set_frequency(14_250_000), "F 14250;");
        assert_eq!(set_frequency(14_250_999), "F 14250;");
    }

    #[test]
    fn parse_fault_code() {
        assert_eq!(parse_fault("0"), Ok(0));
        assert_eq!(parse_fault("5"), Ok(5));
    }

    #[test]
    fn parse_fault_garbage() {
        assert!(matches!(parse_fault("x"), Err(ParseError::InvalidNumber(_))));
    }

    #[test]
    fn parse_vswr_with_leading_space() {
        // The tuner replies "VSWR 1.32;", so the payload keeps the space
        assert_eq!(parse_vswr(" 1.32"), Ok(1.32));
    }
}
