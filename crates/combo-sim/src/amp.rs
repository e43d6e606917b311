//! Virtual KPA500 power amplifier

use std::sync::{Arc, Mutex};

use combo_protocol::LineCodec;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing::debug;

use crate::CommandJournal;

/// Scripted behavior for a virtual amplifier; mutable at runtime through
/// the handle
#[derive(Debug, Clone)]
pub struct AmpScript {
    /// Fault identifier reported by `^FL;` (0 = none)
    pub fault: u8,
    /// Output power reported by `^WS;`
    pub watts: u32,
    /// PA supply voltage in tenths of a volt, reported by `^VI;`
    pub pa_volts_tenths: u32,
    /// PA supply current in tenths of an amp, reported by `^VI;`
    pub pa_amps_tenths: u32,
    /// Answer nothing at all, as if powered off
    pub silent: bool,
}

impl Default for AmpScript {
    fn default() -> Self {
        Self {
            fault: 0,
            watts: 0,
            pa_volts_tenths: 543,
            pa_amps_tenths: 0,
            silent: false,
        }
    }
}

/// Control handle for a running virtual amplifier
pub struct VirtualAmpHandle {
    script: Arc<Mutex<AmpScript>>,
}

impl VirtualAmpHandle {
    /// Mutate the script; takes effect on the next query
    pub fn update<F: FnOnce(&mut AmpScript)>(&self, f: F) {
        f(&mut self.script.lock().unwrap());
    }
}

/// Spawn a virtual amplifier task; the returned stream is the controller
/// side
pub fn spawn_amp(script: AmpScript, journal: CommandJournal) -> (VirtualAmpHandle, DuplexStream) {
    let script = Arc::new(Mutex::new(script));
    let (device_io, link_io) = tokio::io::duplex(1024);

    tokio::spawn(run_amp(device_io, script.clone(), journal));

    (VirtualAmpHandle { script }, link_io)
}

async fn run_amp(mut io: DuplexStream, script: Arc<Mutex<AmpScript>>, journal: CommandJournal) {
    let mut codec = LineCodec::new();
    let mut buf = [0u8; 256];

    loop {
        match io.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                codec.push_bytes(&buf[..n]);
                while let Some(msg) = codec.next_message() {
                    let script = script.lock().unwrap().clone();
                    let reply = match msg.as_str() {
                        "^FL" => Some(format!("^FL{:02};", script.fault)),
                        "^WS" => Some(format!("^WS{:03} 000;", script.watts)),
                        "^VI" => Some(format!(
                            "^VI{:03} {:03};",
                            script.pa_volts_tenths, script.pa_amps_tenths
                        )),
                        _ => {
                            // Mode and band selection get no reply
                            if msg.starts_with("^OS") || msg.starts_with("^BN") {
                                journal.record(format!("amp:{msg}"));
                            }
                            None
                        }
                    };

                    if script.silent {
                        continue;
                    }
                    if let Some(reply) = reply {
                        if io.write_all(reply.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    debug!("virtual amplifier stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn journals_mode_and_band() {
        let journal = CommandJournal::new();
        let (_handle, mut io) = spawn_amp(AmpScript::default(), journal.clone());

        io.write_all(b"^OS1;^BN05;").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(journal.entries(), vec!["amp:^OS1", "amp:^BN05"]);
    }

    #[tokio::test]
    async fn answers_queries_from_script() {
        let journal = CommandJournal::new();
        let (handle, mut io) = spawn_amp(AmpScript::default(), journal);
        handle.update(|s| {
            s.watts = 100;
            s.fault = 0;
        });

        io.write_all(b"^WS;").await.unwrap();
        let mut buf = [0u8; 32];
        let n = io.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"^WS100 000;");
    }
}
