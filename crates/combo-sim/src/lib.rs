//! Simulated Station Devices
//!
//! Virtual counterparts of the three station devices, each speaking its
//! real wire protocol over one side of a `tokio::io::duplex` pair. The
//! other side is handed to a link adapter, so tests exercise the full
//! stack (codec, adapter, coordinator, monitor) without hardware.
//!
//! Every state-changing command a virtual device receives is recorded in a
//! shared [`CommandJournal`], which is how tests assert cross-device call
//! ordering.

pub mod amp;
pub mod radio;
pub mod tuner;

use std::sync::{Arc, Mutex};

pub use amp::{spawn_amp, AmpScript, VirtualAmpHandle};
pub use radio::{spawn_radio, VirtualRadioConfig, VirtualRadioHandle};
pub use tuner::{spawn_tuner, TunerScript, VirtualTunerHandle};

/// Shared, ordered record of the commands the virtual devices received
#[derive(Debug, Clone, Default)]
pub struct CommandJournal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CommandJournal {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// Snapshot of all entries, in arrival order
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Position of the first entry equal to `entry`
    pub fn index_of(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }

    /// True if `entry` was recorded
    pub fn contains(&self, entry: &str) -> bool {
        self.index_of(entry).is_some()
    }
}
