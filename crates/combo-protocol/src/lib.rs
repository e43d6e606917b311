//! Station Combo Protocol Library
//!
//! This crate provides encoding and parsing for the three serial protocols
//! spoken by the station combo hardware:
//!
//! - **Icom CI-V**: framed variable-length binary messages used by the
//!   transceiver (frequency broadcasts, RF power control)
//! - **Elecraft KAT500**: ASCII semicolon-terminated commands for the
//!   antenna tuner (frequency, fault, VSWR, full tune)
//! - **Elecraft KPA500**: ASCII semicolon-terminated commands for the
//!   power amplifier (mode, band, power, fault, PA supply)
//!
//! # Architecture
//!
//! Each protocol module provides a streaming codec that handles partial
//! data, command builders producing exact wire bytes, and reply parsers.
//! No I/O happens here; the link adapters in `combo-link` own the serial
//! ports and drive these codecs.
//!
//! # Example
//!
//! ```rust
//! use combo_protocol::civ;
//!
//! // A frequency broadcast from a radio at CI-V address 0x94
//! let mut codec = civ::CivCodec::new();
//! codec.push_bytes(&[0xFE, 0xFE, 0x00, 0x94, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]);
//!
//! let frame = codec.next_frame().unwrap();
//! assert_eq!(civ::parse_frequency_broadcast(&frame), Some(14_250_000));
//! ```

pub mod ascii;
pub mod civ;
pub mod error;
pub mod kat500;
pub mod kpa500;
pub mod models;

pub use ascii::LineCodec;
pub use civ::CivCodec;
pub use error::ParseError;
pub use models::{AmpMode, Band};
