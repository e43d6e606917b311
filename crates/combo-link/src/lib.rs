//! Serial Link Adapters
//!
//! One adapter per device: [`RadioLink`] (Icom CI-V, binary),
//! [`TunerLink`] (KAT500) and [`AmpLink`] (KPA500), both ASCII.
//!
//! # Adapter contract
//!
//! - Each adapter owns one serial connection; a `tokio::sync::Mutex` around
//!   the connection serializes the write-then-read pair so only one exchange
//!   is in flight per adapter. Different adapters run fully concurrently.
//! - `close` is safe to call while an exchange is blocked: reads tick on a
//!   short timeout and re-check the closed flag, so any pending exchange
//!   unblocks and resolves to the distinguished [`Exchange::Closed`] outcome
//!   (never an error). Monitor loops use this to exit cleanly at shutdown.
//! - Query replies that never arrive (device powered off or disconnected)
//!   resolve to per-query sentinels (255 for fault queries, 0 for numeric
//!   telemetry) so polling continues; only malformed payloads and I/O
//!   faults are errors.
//!
//! Adapters are constructed either from a serial port (`open`) or from any
//! `AsyncRead + AsyncWrite` stream (`with_io`), which is how the tests drive
//! them against simulated devices over `tokio::io::duplex`.

pub mod amp;
pub mod error;
pub mod radio;
pub mod tuner;

mod ascii;

pub use amp::AmpLink;
pub use error::LinkError;
pub use radio::{FrequencyPoll, RadioLink};
pub use tuner::TunerLink;

use tokio::io::{AsyncRead, AsyncWrite};

/// Fault identifier reported when a device gives no answer at all (powered
/// off or disconnected); treated as faulted by the monitor
pub const FAULT_NO_RESPONSE: u8 = 255;

/// I/O a link can drive: real serial ports and in-memory duplex streams
/// both qualify.
pub trait LinkIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LinkIo for T {}

/// Outcome of one request/response exchange
///
/// The port may be closed while an exchange is blocked; that is a normal
/// part of shutdown, not an error, and callers that outlive the link (the
/// monitor loops) need to tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange<T> {
    /// The device answered
    Reply(T),
    /// The link was closed while the exchange was in flight
    Closed,
}

impl<T> Exchange<T> {
    /// The reply value, if the link was still open
    pub fn reply(self) -> Option<T> {
        match self {
            Exchange::Reply(v) => Some(v),
            Exchange::Closed => None,
        }
    }

    /// True if the link was closed mid-exchange
    pub fn is_closed(&self) -> bool {
        matches!(self, Exchange::Closed)
    }
}
