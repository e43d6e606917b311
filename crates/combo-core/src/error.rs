//! Error types for the coordination engine

use combo_link::LinkError;
use combo_protocol::Band;
use thiserror::Error;

use crate::status::Device;

/// Errors surfaced by the coordinator and controller
///
/// Monitor loops absorb these into status transitions; command-path errors
/// return synchronously to the caller, which owns user-facing messaging.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The observed frequency is covered by no configured band profile
    #[error("no band profile covers {hz} Hz")]
    OutOfBand { hz: u64 },

    /// The band plan itself is unusable
    #[error("invalid band plan: {0}")]
    InvalidBandPlan(String),

    /// A command needs the operating band before the radio reported one
    #[error("no operating band established yet")]
    NoActiveBand,

    /// The plan has no profile for an already-established band
    #[error("band plan has no profile for {band}")]
    NoProfile { band: Band },

    /// A serial port could not be opened; fatal to controller construction
    #[error("{device} port: {source}")]
    PortOpen {
        device: Device,
        #[source]
        source: LinkError,
    },

    /// A device link failed mid-command
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A link was closed while startup initialization was still running
    #[error("link closed while initializing devices")]
    StartupInterrupted,
}
