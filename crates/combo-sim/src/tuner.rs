//! Virtual KAT500 antenna tuner

use std::sync::{Arc, Mutex};

use combo_protocol::LineCodec;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing::debug;

use crate::CommandJournal;

/// Scripted behavior for a virtual tuner; mutable at runtime through the
/// handle
#[derive(Debug, Clone)]
pub struct TunerScript {
    /// Fault identifier reported by `FLT;` (0 = none)
    pub fault: u8,
    /// VSWR reported by `VSWR;`
    pub vswr: f64,
    /// Reply to fault queries with an empty payload (`FLT;`)
    pub empty_fault_reply: bool,
    /// Answer nothing at all, as if powered off
    pub silent: bool,
}

impl Default for TunerScript {
    fn default() -> Self {
        Self {
            fault: 0,
            vswr: 1.08,
            empty_fault_reply: false,
            silent: false,
        }
    }
}

/// Control handle for a running virtual tuner
pub struct VirtualTunerHandle {
    script: Arc<Mutex<TunerScript>>,
}

impl VirtualTunerHandle {
    /// Mutate the script; takes effect on the next query
    pub fn update<F: FnOnce(&mut TunerScript)>(&self, f: F) {
        f(&mut self.script.lock().unwrap());
    }
}

/// Spawn a virtual tuner task; the returned stream is the controller side
pub fn spawn_tuner(
    script: TunerScript,
    journal: CommandJournal,
) -> (VirtualTunerHandle, DuplexStream) {
    let script = Arc::new(Mutex::new(script));
    let (device_io, link_io) = tokio::io::duplex(1024);

    tokio::spawn(run_tuner(device_io, script.clone(), journal));

    (VirtualTunerHandle { script }, link_io)
}

async fn run_tuner(mut io: DuplexStream, script: Arc<Mutex<TunerScript>>, journal: CommandJournal) {
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
                        "FLT" => {
                            if script.empty_fault_reply {
                                Some("FLT;".to_string())
                            } else {
                                Some(format!("FLT{};", script.fault))
                            }
                        }
                        "VSWR" => Some(format!("VSWR {:.2};", script.vswr)),
                        "FT" => {
                            journal.record("tuner:FT");
                            Some("FT;".to_string())
                        }
                        _ => {
                            if msg.starts_with("F ") {
                                journal.record(format!("tuner:{msg}"));
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

    debug!("virtual tuner stopped");
}
