//! Elecraft KPA500 Power Amplifier Protocol
//!
//! ASCII commands terminated by `;`, each prefixed with `^`:
//!
//! ```text
//! ^OS1;                set mode (0 = standby, 1 = operate; no reply)
//! ^BN05;               set band by two-digit code (no reply)
//! ^WS;  -> ^WS100 123; output power in watts, then a peak-reading field
//! ^FL;  -> ^FL00;      fault identifier (0 = none)
//! ^VI;  -> ^VI543 087; PA supply volts and amps, both in tenths
//! ```

use crate::error::ParseError;
use crate::models::{AmpMode, Band};

/// Query the current output power
pub const POWER_QUERY: &str = "^WS;";
/// Reply prefix for the power query
pub const POWER_PREFIX: &str = "^WS";

/// Query the active fault identifier
pub const FAULT_QUERY: &str = "^FL;";
/// Reply prefix for the fault query
pub const FAULT_PREFIX: &str = "^FL";

/// Query the PA supply voltage and current
pub const PA_SUPPLY_QUERY: &str = "^VI;";
/// Reply prefix for the PA supply query
pub const PA_SUPPLY_PREFIX: &str = "^VI";

/// The amplifier's two-digit code for each band, from the KPA500
/// documentation
pub fn band_code(band: Band) -> &'static str {
    match band {
        Band::M160 => "00",
        Band::M80 => "01",
        Band::M60 => "02",
        Band::M40 => "03",
        Band::M30 => "04",
        Band::M20 => "05",
        Band::M17 => "06",
        Band::M15 => "07",
        Band::M12 => "08",
        Band::M10 => "09",
        Band::M6 => "10",
    }
}

/// Encode the set-mode command
pub fn set_mode(mode: AmpMode) -> String {
    format!("^OS{};", mode.wire_code())
}

/// Encode the set-band command
pub fn set_band(band: Band) -> String {
    format!("^BN{};", band_code(band))
}

/// Parse the payload of a power reply into watts
///
/// The reply embeds a leading integer watt value before a space-delimited
/// suffix: `^WS100 123;` means 100 W.
pub fn parse_power(payload: &str) -> Result<u32, ParseError> {
    let watts = payload
        .split(' ')
        .next()
        .ok_or_else(|| ParseError::MissingField(payload.to_string()))?;
    watts
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))
}

/// Parse the payload of a fault reply into the fault identifier
pub fn parse_fault(payload: &str) -> Result<u8, ParseError> {
    payload
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))
}

/// Parse the payload of a PA supply reply into (volts, amps)
pub fn parse_pa_supply(payload: &str) -> Result<(f64, f64), ParseError> {
    let mut fields = payload.split_whitespace();
    let volts: u32 = fields
        .next()
        .ok_or_else(|| ParseError::MissingField(payload.to_string()))?
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))?;
    let amps: u32 = fields
        .next()
        .ok_or_else(|| ParseError::MissingField(payload.to_string()))?
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))?;

    Ok((f64::from(volts) / 10.0, f64::from(amps) / 10.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_commands() {
        assert_eq!(set_mode(AmpMode::Standby), "^OS0;");
        assert_eq!(set_mode(AmpMode::Operate), "^OS1;");
    }

    #[test]
    fn band_commands() {
        assert_eq!(set_band(Band::M160), "^BN00;");
        assert_eq!(set_band(Band::M20), "^BN05;");
        assert_eq!(set_band(Band::M6), "^BN10;");
    }

    #[test]
    fn every_band_has_a_code() {
        for band in Band::ALL {
            assert_eq!(band_code(band).len(), 2);
        }
    }

    #[test]
    fn parse_power_leading_watts() {
        assert_eq!(parse_power("100 123"), Ok(100));
        assert_eq!(parse_power("0 000"), Ok(0));
    }

    #[test]
    fn parse_power_garbage() {
        assert!(matches!(
            parse_power("watts"),
            Err(ParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn parse_fault_code() {
        assert_eq!(parse_fault("00"), Ok(0));
        assert_eq!(parse_fault("12"), Ok(12));
    }

    #[test]
    fn parse_pa_supply_tenths() {
        assert_eq!(parse_pa_supply("543 087"), Ok((54.3, 8.7)));
    }

    #[test]
    fn parse_pa_supply_missing_field() {
        assert!(matches!(
            parse_pa_supply("543"),
            Err(ParseError::MissingField(_))
        ));
    }
}
