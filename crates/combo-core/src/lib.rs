//! Station Combo Coordination Engine
//!
//! Keeps three independently serial-attached pieces of station hardware
//! (an Icom transceiver, a KAT500 antenna tuner, and a KPA500 power
//! amplifier) consistent with one authoritative operating frequency and
//! one authoritative power mode.
//!
//! # Architecture
//!
//! - [`Coordinator`]: high-level device operations over the command-side
//!   links, enforcing the cross-device ordering rules
//! - monitor loops following the radio's frequency broadcasts and polling
//!   device health/telemetry
//! - [`StateStore`]: last-known readings with change-notification fan-out
//! - [`StatusRegistry`]: per-device health, decoupled from telemetry
//! - [`Controller`]: the facade composing all of the above behind one
//!   start/stop lifecycle
//!
//! The graphical front end, persisted configuration, and CLI parsing are
//! external collaborators; they consume this crate through the
//! [`Controller`] surface and the [`StationConfig`] types.
//!
//! # Example
//!
//! ```rust,no_run
//! use combo_core::{AmpMode, Controller, StationConfig};
//!
//! # async fn run(config: StationConfig) -> Result<(), combo_core::ControllerError> {
//! let controller = Controller::start(config).await?;
//! controller.set_amplifier_mode(AmpMode::Operate).await?;
//! let (_token, _state_rx) = controller.subscribe_state();
//! # controller.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod status;

mod monitor;

pub use command::Coordinator;
pub use config::{BandPlan, BandProfile, PowerProfile, RadioPorts, SerialPortConfig, StationConfig};
pub use controller::{Controller, StationLinks, DEFAULT_POLL_INTERVAL};
pub use data::{
    AmplifierReading, AmplifierUpdate, RadioReading, RadioUpdate, StateStore, StationSnapshot,
    Subscription, TunerReading, TunerUpdate,
};
pub use error::ControllerError;
pub use status::{Device, Health, StatusRegistry, StatusReport};

// The shared domain types and the exchange outcome, re-exported so most
// consumers need only this crate
pub use combo_link::{Exchange, FrequencyPoll};
pub use combo_protocol::{AmpMode, Band};
