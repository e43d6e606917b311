//! Error types for the link adapters

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur on a device link
///
/// A closed port is deliberately absent: closing mid-exchange resolves to
/// [`crate::Exchange::Closed`], never an error.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial port could not be opened; fatal to controller construction
    #[error("failed to open {port}: {source}")]
    Open {
        /// Port name from configuration
        port: String,
        /// Underlying serial error
        #[source]
        source: tokio_serial::Error,
    },

    /// I/O error mid-exchange
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device did not acknowledge a directed command in time
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The device answered, but the payload does not parse
    #[error("malformed response: {0}")]
    Malformed(#[from] combo_protocol::ParseError),

    /// The radio answered a directed command with a reject status
    #[error("command rejected by device")]
    Rejected,
}
