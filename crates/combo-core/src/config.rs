//! Station configuration
//!
//! Configuration is owned by an external collaborator and read-only to the
//! core: serial port parameters for the four links and the ordered table of
//! band profiles that drives band lookup and RF power selection.

use combo_protocol::{AmpMode, Band};
use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

fn default_baud() -> u32 {
    38400
}

/// Serial parameters for a single-port device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialPortConfig {
    /// Port name, e.g. `/dev/ttyUSB1` or `COM4`
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,
}

/// Serial parameters for the radio, which is connected twice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioPorts {
    /// Port carrying the frequency-broadcast stream
    pub monitor_port: String,
    /// Port used for directed commands
    pub command_port: String,
    /// Baud rate, shared by both ports
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// The radio's CI-V address
    pub address: u8,
}

/// Radio drive levels for one band, as percentages of full power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerProfile {
    /// Drive while the amplifier is in standby
    pub standby: u8,
    /// Drive while the amplifier is in operate
    pub operate: u8,
}

/// Frequency bounds and power settings for one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandProfile {
    pub band: Band,
    /// Lower bound in Hz, inclusive
    pub low_hz: u64,
    /// Upper bound in Hz, inclusive
    pub high_hz: u64,
    pub rf_power: PowerProfile,
}

/// The ordered table of band profiles
///
/// Profiles must partition frequency space: validation rejects overlapping
/// bounds, and lookup returns the unique profile covering a frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandPlan {
    profiles: Vec<BandProfile>,
}

impl BandPlan {
    /// Build a validated plan
    pub fn new(profiles: Vec<BandProfile>) -> Result<Self, ControllerError> {
        let plan = Self { profiles };
        plan.validate()?;
        Ok(plan)
    }

    /// The profiles, in configuration order
    pub fn profiles(&self) -> &[BandProfile] {
        &self.profiles
    }

    /// Check bounds and the no-overlap invariant
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.profiles.is_empty() {
            return Err(ControllerError::InvalidBandPlan("no profiles".into()));
        }

        for p in &self.profiles {
            if p.low_hz >= p.high_hz {
                return Err(ControllerError::InvalidBandPlan(format!(
                    "{}: bounds inverted",
                    p.band
                )));
            }
        }

        let mut sorted: Vec<&BandProfile> = self.profiles.iter().collect();
        sorted.sort_by_key(|p| p.low_hz);
        for pair in sorted.windows(2) {
            if pair[1].low_hz <= pair[0].high_hz {
                return Err(ControllerError::InvalidBandPlan(format!(
                    "{} and {} overlap",
                    pair[0].band, pair[1].band
                )));
            }
        }

        for (i, p) in self.profiles.iter().enumerate() {
            if self.profiles[..i].iter().any(|q| q.band == p.band) {
                return Err(ControllerError::InvalidBandPlan(format!(
                    "{} appears twice",
                    p.band
                )));
            }
        }

        Ok(())
    }

    /// The unique band covering `hz`
    pub fn band_for(&self, hz: u64) -> Result<Band, ControllerError> {
        self.profiles
            .iter()
            .find(|p| hz >= p.low_hz && hz <= p.high_hz)
            .map(|p| p.band)
            .ok_or(ControllerError::OutOfBand { hz })
    }

    /// The profile for a band, if the plan has one
    pub fn profile(&self, band: Band) -> Option<&BandProfile> {
        self.profiles.iter().find(|p| p.band == band)
    }

    /// The radio drive percentage for a band in the given amplifier mode
    pub fn rf_power_percent(&self, band: Band, mode: AmpMode) -> Option<u8> {
        self.profile(band).map(|p| match mode {
            AmpMode::Operate => p.rf_power.operate,
            AmpMode::Standby => p.rf_power.standby,
        })
    }
}

impl Default for BandPlan {
    /// The stock band plan: full drive in standby, reduced drive in operate
    /// where the amplifier needs less to reach rated output
    fn default() -> Self {
        fn profile(band: Band, low_hz: u64, high_hz: u64, operate: u8) -> BandProfile {
            BandProfile {
                band,
                low_hz,
                high_hz,
                rf_power: PowerProfile {
                    standby: 100,
                    operate,
                },
            }
        }

        Self {
            profiles: vec![
                profile(Band::M160, 1_800_000, 2_000_000, 30),
                profile(Band::M80, 3_500_000, 4_000_000, 30),
                profile(Band::M60, 5_240_000, 5_500_000, 5),
                profile(Band::M40, 7_000_000, 7_300_000, 30),
                profile(Band::M30, 10_100_000, 10_150_000, 10),
                profile(Band::M20, 14_000_000, 14_350_000, 30),
                profile(Band::M17, 18_068_000, 18_168_000, 30),
                profile(Band::M15, 21_000_000, 21_450_000, 30),
                profile(Band::M12, 24_890_000, 24_990_000, 30),
                profile(Band::M10, 28_000_000, 29_700_000, 30),
                profile(Band::M6, 50_000_000, 54_000_000, 30),
            ],
        }
    }
}

/// Everything the controller needs to come up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub radio: RadioPorts,
    pub tuner: SerialPortConfig,
    pub amplifier: SerialPortConfig,
    #[serde(default)]
    pub bands: BandPlan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_validates() {
        BandPlan::default().validate().unwrap();
    }

    #[test]
    fn band_lookup_is_unique_per_frequency() {
        let plan = BandPlan::default();
        assert_eq!(plan.band_for(14_250_000).unwrap(), Band::M20);
        assert_eq!(plan.band_for(7_000_000).unwrap(), Band::M40);
        // Bounds are inclusive on both ends
        assert_eq!(plan.band_for(29_700_000).unwrap(), Band::M10);
        assert_eq!(plan.band_for(50_000_000).unwrap(), Band::M6);
    }

    #[test]
    fn out_of_band_frequency_is_an_error() {
        let plan = BandPlan::default();
        assert!(matches!(
            plan.band_for(2_500_000),
            Err(ControllerError::OutOfBand { hz: 2_500_000 })
        ));
    }

    #[test]
    fn overlapping_profiles_rejected() {
        let plan = BandPlan {
            profiles: vec![
                BandProfile {
                    band: Band::M40,
                    low_hz: 7_000_000,
                    high_hz: 7_300_000,
                    rf_power: PowerProfile {
                        standby: 100,
                        operate: 30,
                    },
                },
                BandProfile {
                    band: Band::M30,
                    low_hz: 7_300_000,
                    high_hz: 10_150_000,
                    rf_power: PowerProfile {
                        standby: 100,
                        operate: 10,
                    },
                },
            ],
        };
        assert!(matches!(
            plan.validate(),
            Err(ControllerError::InvalidBandPlan(_))
        ));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let plan = BandPlan {
            profiles: vec![BandProfile {
                band: Band::M20,
                low_hz: 14_350_000,
                high_hz: 14_000_000,
                rf_power: PowerProfile {
                    standby: 100,
                    operate: 30,
                },
            }],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn power_selection_by_mode() {
        let plan = BandPlan::default();
        assert_eq!(plan.rf_power_percent(Band::M20, AmpMode::Standby), Some(100));
        assert_eq!(plan.rf_power_percent(Band::M20, AmpMode::Operate), Some(30));
        assert_eq!(plan.rf_power_percent(Band::M60, AmpMode::Operate), Some(5));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = StationConfig {
            radio: RadioPorts {
                monitor_port: "/dev/ttyUSB0".into(),
                command_port: "/dev/ttyUSB1".into(),
                baud: 19200,
                address: 0x94,
            },
            tuner: SerialPortConfig {
                port: "/dev/ttyUSB2".into(),
                baud: 38400,
            },
            amplifier: SerialPortConfig {
                port: "/dev/ttyUSB3".into(),
                baud: 38400,
            },
            bands: BandPlan::default(),
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: StationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn bands_default_when_missing() {
        let json = r#"{
            "radio": {"monitor_port": "COM3", "command_port": "COM4", "address": 148},
            "tuner": {"port": "COM5"},
            "amplifier": {"port": "COM6"}
        }"#;
        let config: StationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.radio.baud, 38400);
        assert_eq!(config.bands, BandPlan::default());
    }
}
