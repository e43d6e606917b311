//! Background monitoring of the station devices
//!
//! Three concurrent loops that share state only through the store and the
//! status registry:
//!
//! - a dedicated radio tracking task that follows the frequency-broadcast
//!   stream and drives coordinated updates on every change
//! - fixed-interval tuner and amplifier pollers, each gated on the
//!   device's fault query
//!
//! Before the loops start, a blocking initialization pass adopts the
//! radio's frequency and pushes frequency/mode/band/RF-power out once, so
//! the hardware matches the controller's state.
//!
//! Shutdown is cooperative: every loop checks a shared cancellation signal
//! at its boundaries and treats a closed link as a clean exit, never a
//! failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use combo_link::{Exchange, FrequencyPoll, RadioLink};
use combo_protocol::Band;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::Coordinator;
use crate::config::BandPlan;
use crate::data::{AmplifierUpdate, RadioUpdate, StateStore, TunerUpdate};
use crate::error::ControllerError;
use crate::status::{Device, Health, StatusRegistry};

/// Everything the monitor loops share, passed explicitly rather than held
/// in globals
pub(crate) struct MonitorContext {
    pub radio: Arc<RadioLink>,
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<StateStore>,
    pub statuses: Arc<StatusRegistry>,
    pub bands: BandPlan,
    pub track_tuner: Arc<AtomicBool>,
}

/// Make the hardware state match the adopted controller state
///
/// Blocks until the radio reports a real frequency, then pushes
/// frequency/mode/band/RF-power to all three devices once. Any failure
/// marks every device Failed and aborts controller startup.
pub(crate) async fn initialize_devices(
    ctx: &MonitorContext,
) -> Result<(u64, Band), ControllerError> {
    let result = init_inner(ctx).await;

    match &result {
        Ok((frequency, band)) => {
            debug!(frequency, %band, "devices initialized");
            ctx.statuses.set(Device::Radio, Health::Ok);
            ctx.statuses.set(Device::Tuner, Health::Ok);
            ctx.statuses.set(Device::Amplifier, Health::Ok);
        }
        Err(e) => {
            warn!("device initialization failed: {e}");
            ctx.statuses.set(Device::Radio, Health::Failed);
            ctx.statuses.set(Device::Tuner, Health::Failed);
            ctx.statuses.set(Device::Amplifier, Health::Failed);
        }
    }

    result
}

async fn init_inner(ctx: &MonitorContext) -> Result<(u64, Band), ControllerError> {
    // Block until the radio reports a real frequency
    let frequency = loop {
        match ctx.radio.poll_frequency().await? {
            FrequencyPoll::Frequency(hz) => break hz,
            FrequencyPoll::NoUpdate => continue,
            FrequencyPoll::Closed => return Err(ControllerError::StartupInterrupted),
        }
    };
    let band = ctx.bands.band_for(frequency)?;

    ctx.store.update_radio(RadioUpdate {
        frequency: Some(frequency),
        band: Some(band),
    });

    // Get the other devices to match the adopted state
    ctx.coordinator.update_tuner_frequency().await?;
    ctx.coordinator.update_amp_mode().await?;
    ctx.coordinator.update_amp_band().await?;
    ctx.coordinator.update_rf_power().await?;

    Ok((frequency, band))
}

/// Spawn the three monitor loops
pub(crate) fn spawn_loops(
    ctx: Arc<MonitorContext>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    initial: (u64, Band),
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(track_radio(
            ctx.clone(),
            shutdown.clone(),
            poll_interval,
            initial,
        )),
        tokio::spawn(poll_tuner(ctx.clone(), shutdown.clone(), poll_interval)),
        tokio::spawn(poll_amp(ctx, shutdown, poll_interval)),
    ]
}

/// Keep the tuner and amplifier in sync with the radio's frequency
async fn track_radio(
    ctx: Arc<MonitorContext>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    initial: (u64, Band),
) {
    let (mut frequency, mut band) = initial;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let hz = match ctx.radio.poll_frequency().await {
            Err(e) => {
                warn!("radio: {e}");
                ctx.statuses.set(Device::Radio, Health::Failed);
                // Keep polling; the port may come back
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Ok(FrequencyPoll::Closed) => break,
            Ok(FrequencyPoll::NoUpdate) => {
                ctx.statuses.set(Device::Radio, Health::Ok);
                continue;
            }
            Ok(FrequencyPoll::Frequency(hz)) => {
                ctx.statuses.set(Device::Radio, Health::Ok);
                hz
            }
        };

        if hz == frequency {
            continue;
        }
        frequency = hz;

        let new_band = match ctx.bands.band_for(hz) {
            Ok(b) => b,
            // Transient out-of-band readings happen while spinning the dial
            Err(e) => {
                debug!("{e}");
                continue;
            }
        };

        ctx.store.update_radio(RadioUpdate {
            frequency: Some(hz),
            band: Some(new_band),
        });

        //
        // coordinated frequency change across all devices
        //

        if ctx.track_tuner.load(Ordering::SeqCst) {
            if let Err(e) = ctx.coordinator.update_tuner_frequency().await {
                warn!("tuner: {e}");
                ctx.statuses.set(Device::Tuner, Health::Failed);
                continue;
            }
        }

        if new_band != band {
            band = new_band;

            if let Err(e) = ctx.coordinator.update_amp_band().await {
                warn!("amplifier: {e}");
                ctx.statuses.set(Device::Amplifier, Health::Failed);
                continue;
            }

            if let Err(e) = ctx.coordinator.update_rf_power().await {
                warn!("radio: {e}");
                ctx.statuses.set(Device::Radio, Health::Failed);
                continue;
            }
        }
    }

    debug!("radio tracking loop stopped");
}

/// Poll the tuner's fault state and VSWR
async fn poll_tuner(
    ctx: Arc<MonitorContext>,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        let faulted = match ctx.coordinator.tuner_faulted().await {
            Err(e) => {
                warn!("tuner: {e}");
                ctx.statuses.set(Device::Tuner, Health::Failed);
                continue;
            }
            Ok(Exchange::Closed) => break,
            Ok(Exchange::Reply(faulted)) => faulted,
        };

        if faulted {
            ctx.statuses.set(Device::Tuner, Health::Failed);
            // Skip the VSWR query while faulted
            continue;
        }

        match ctx.coordinator.tuner_vswr().await {
            Err(e) => {
                warn!("tuner: {e}");
                ctx.statuses.set(Device::Tuner, Health::Failed);
            }
            Ok(Exchange::Closed) => break,
            Ok(Exchange::Reply(vswr)) => {
                ctx.store.update_tuner(TunerUpdate { vswr: Some(vswr) });
                ctx.statuses.set(Device::Tuner, Health::Ok);
            }
        }
    }

    debug!("tuner poll stopped");
}

/// Poll the amplifier's fault state, output power, and PA supply
async fn poll_amp(
    ctx: Arc<MonitorContext>,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        let faulted = match ctx.coordinator.amp_faulted().await {
            Err(e) => {
                warn!("amplifier: {e}");
                ctx.statuses.set(Device::Amplifier, Health::Failed);
                continue;
            }
            Ok(Exchange::Closed) => break,
            Ok(Exchange::Reply(faulted)) => faulted,
        };

        if faulted {
            ctx.statuses.set(Device::Amplifier, Health::Failed);
            // Skip the telemetry queries while faulted
            continue;
        }

        let watts = match ctx.coordinator.amp_power().await {
            Err(e) => {
                warn!("amplifier: {e}");
                ctx.statuses.set(Device::Amplifier, Health::Failed);
                continue;
            }
            Ok(Exchange::Closed) => break,
            Ok(Exchange::Reply(watts)) => watts,
        };

        let (volts, amps) = match ctx.coordinator.amp_pa_supply().await {
            Err(e) => {
                warn!("amplifier: {e}");
                ctx.statuses.set(Device::Amplifier, Health::Failed);
                continue;
            }
            Ok(Exchange::Closed) => break,
            Ok(Exchange::Reply(supply)) => supply,
        };

        ctx.store.update_amplifier(AmplifierUpdate {
            mode: None,
            power_watts: Some(watts),
            pa_volts: Some(volts),
            pa_amps: Some(amps),
        });
        ctx.statuses.set(Device::Amplifier, Health::Ok);
    }

    debug!("amplifier poll stopped");
}
