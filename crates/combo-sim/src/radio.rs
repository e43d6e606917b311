//! Virtual CI-V radio
//!
//! Answers the one-shot frequency query, pushes a broadcast frame on every
//! commanded frequency change, and acknowledges RF-power commands. Used on
//! both the monitor and command sides of the radio.

use combo_protocol::civ::{self, CivCodec};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::debug;

use crate::CommandJournal;

/// Configuration for a virtual radio
#[derive(Debug, Clone)]
pub struct VirtualRadioConfig {
    /// Journal label, e.g. "radio" or "radio-cmd"
    pub label: String,
    /// CI-V address
    pub address: u8,
    /// Initial operating frequency in Hz
    pub frequency_hz: u64,
    /// Answer power commands with a reject status
    pub reject_power_commands: bool,
}

impl Default for VirtualRadioConfig {
    fn default() -> Self {
        Self {
            label: "radio".to_string(),
            address: 0x94,
            frequency_hz: 14_250_000,
            reject_power_commands: false,
        }
    }
}

enum RadioCtl {
    SetFrequency(u64),
}

/// Control handle for a running virtual radio
pub struct VirtualRadioHandle {
    ctl: mpsc::UnboundedSender<RadioCtl>,
}

impl VirtualRadioHandle {
    /// Turn the dial: updates the frequency and pushes a broadcast frame
    pub fn set_frequency(&self, hz: u64) {
        let _ = self.ctl.send(RadioCtl::SetFrequency(hz));
    }
}

/// Spawn a virtual radio task; the returned stream is the controller side
pub fn spawn_radio(
    config: VirtualRadioConfig,
    journal: CommandJournal,
) -> (VirtualRadioHandle, DuplexStream) {
    let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
    let (device_io, link_io) = tokio::io::duplex(1024);

    tokio::spawn(run_radio(device_io, config, journal, ctl_rx));

    (VirtualRadioHandle { ctl: ctl_tx }, link_io)
}

async fn run_radio(
    mut io: DuplexStream,
    mut config: VirtualRadioConfig,
    journal: CommandJournal,
    mut ctl_rx: mpsc::UnboundedReceiver<RadioCtl>,
) {
    let mut codec = CivCodec::new();
    let mut buf = [0u8; 256];

    loop {
        tokio::select! {
            ctl = ctl_rx.recv() => match ctl {
                None => break,
                Some(RadioCtl::SetFrequency(hz)) => {
                    config.frequency_hz = hz;
                    let frame = civ::frequency_broadcast(config.address, hz);
                    if io.write_all(&frame).await.is_err() {
                        break;
                    }
                }
            },

            read = io.read(&mut buf) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    codec.push_bytes(&buf[..n]);
                    while let Some(frame) = codec.next_frame() {
                        if handle_frame(&mut io, &config, &journal, &frame).await.is_err() {
                            return;
                        }
                    }
                }
            },
        }
    }

    debug!(label = config.label, "virtual radio stopped");
}

async fn handle_frame(
    io: &mut DuplexStream,
    config: &VirtualRadioConfig,
    journal: &CommandJournal,
    frame: &[u8],
) -> std::io::Result<()> {
    // Only frames addressed to this radio
    if frame.len() < 6 || frame[2] != config.address {
        return Ok(());
    }

    if frame[4] == 0x03 && frame.len() == 6 {
        journal.record(format!("{}:query-frequency", config.label));
        let reply = civ::frequency_broadcast(config.address, config.frequency_hz);
        return io.write_all(&reply).await;
    }

    if let Some(level) = civ::parse_set_rf_power(frame) {
        journal.record(format!("{}:set-rf-power {}", config.label, level));
        let reply = civ::directed_ack(config.address, !config.reject_power_commands);
        return io.write_all(&reply).await;
    }

    Ok(())
}
