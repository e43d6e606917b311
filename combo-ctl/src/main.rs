//! Headless station combo controller
//!
//! Loads a JSON configuration, starts the controller, and logs state and
//! status changes until interrupted. The configuration file path is the
//! single optional argument (default `station.json`).

use combo_core::{Controller, StationConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "combo_ctl=info,combo_core=info,combo_link=info,combo_protocol=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "station.json".to_string());
    let config: StationConfig = serde_json::from_str(&std::fs::read_to_string(&path)?)?;

    info!("starting station controller from {path}");
    let controller = Controller::start(config).await?;

    let (_state_token, mut state_rx) = controller.subscribe_state();
    let (_status_token, mut status_rx) = controller.subscribe_status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            Some(snapshot) = state_rx.recv() => {
                info!(
                    frequency = snapshot.radio.frequency,
                    band = %snapshot.radio.band.map(|b| b.to_string()).unwrap_or_else(|| "-".into()),
                    mode = %snapshot.amplifier.mode,
                    watts = snapshot.amplifier.power_watts,
                    vswr = snapshot.tuner.vswr,
                    "state",
                );
            }

            Some(report) = status_rx.recv() => {
                info!(
                    radio = ?report.radio,
                    tuner = ?report.tuner,
                    amplifier = ?report.amplifier,
                    "status",
                );
            }
        }
    }

    info!("shutting down");
    controller.stop().await;

    Ok(())
}
