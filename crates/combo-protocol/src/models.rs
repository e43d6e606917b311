//! Domain types shared across the protocol and control layers

use std::fmt;

use crate::error::ParseError;

/// The eleven amateur bands the amplifier can switch between, longest
/// wavelength first.
///
/// Bands convert to and from their meters number, which is also how they
/// appear in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub enum Band {
    M160,
    M80,
    M60,
    M40,
    M30,
    M20,
    M17,
    M15,
    M12,
    M10,
    M6,
}

impl Band {
    /// All bands, longest wavelength first
    pub const ALL: [Band; 11] = [
        Band::M160,
        Band::M80,
        Band::M60,
        Band::M40,
        Band::M30,
        Band::M20,
        Band::M17,
        Band::M15,
        Band::M12,
        Band::M10,
        Band::M6,
    ];

    /// The band's wavelength in meters
    pub fn meters(&self) -> u16 {
        match self {
            Band::M160 => 160,
            Band::M80 => 80,
            Band::M60 => 60,
            Band::M40 => 40,
            Band::M30 => 30,
            Band::M20 => 20,
            Band::M17 => 17,
            Band::M15 => 15,
            Band::M12 => 12,
            Band::M10 => 10,
            Band::M6 => 6,
        }
    }

    /// Look up a band by its meters number
    pub fn from_meters(meters: u16) -> Result<Self, ParseError> {
        Band::ALL
            .into_iter()
            .find(|b| b.meters() == meters)
            .ok_or(ParseError::UnknownBand(meters))
    }
}

impl TryFrom<u16> for Band {
    type Error = ParseError;

    fn try_from(meters: u16) -> Result<Self, Self::Error> {
        Band::from_meters(meters)
    }
}

impl From<Band> for u16 {
    fn from(band: Band) -> u16 {
        band.meters()
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

/// Amplifier operating mode
///
/// Standby bypasses amplification, operate actively amplifies. The wire
/// codes (0/1) match the amplifier's `^OS` command argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AmpMode {
    #[default]
    Standby,
    Operate,
}

impl AmpMode {
    /// The mode's code on the amplifier wire protocol
    pub fn wire_code(&self) -> u8 {
        match self {
            AmpMode::Standby => 0,
            AmpMode::Operate => 1,
        }
    }
}

impl fmt::Display for AmpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmpMode::Standby => write!(f, "standby"),
            AmpMode::Operate => write!(f, "operate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_meters_roundtrip() {
        for band in Band::ALL {
            assert_eq!(Band::from_meters(band.meters()).unwrap(), band);
        }
    }

    #[test]
    fn unknown_band_rejected() {
        assert_eq!(Band::from_meters(2), Err(ParseError::UnknownBand(2)));
    }

    #[test]
    fn bands_ordered_by_wavelength() {
        assert!(Band::M160 < Band::M80);
        assert!(Band::M10 < Band::M6);
    }

    #[test]
    fn mode_wire_codes() {
        assert_eq!(AmpMode::Standby.wire_code(), 0);
        assert_eq!(AmpMode::Operate.wire_code(), 1);
    }
}
