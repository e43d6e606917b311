//! Controller facade
//!
//! Composes the coordinator and the monitor behind one lifecycle: `start`
//! opens the four links, runs the blocking device initialization, and
//! spawns the monitor loops; `stop` cancels the loops, closes every link,
//! joins the tasks, and resets all state.
//!
//! The controller is an owned value the caller passes around explicitly;
//! there is no process-wide instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use combo_link::{AmpLink, RadioLink, TunerLink};
use combo_protocol::AmpMode;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::command::Coordinator;
use crate::config::{BandPlan, StationConfig};
use crate::data::{StateStore, StationSnapshot, Subscription};
use crate::error::ControllerError;
use crate::monitor::{self, MonitorContext};
use crate::status::{Device, Health, StatusRegistry, StatusReport};

/// How often the tuner and amplifier are polled
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The four device links, already open
///
/// Built from configuration with [`StationLinks::open`], or assembled
/// directly over in-memory streams by tests.
pub struct StationLinks {
    pub radio_monitor: RadioLink,
    pub radio_command: RadioLink,
    pub tuner: TunerLink,
    pub amplifier: AmpLink,
}

impl StationLinks {
    /// Open all four serial ports from configuration
    ///
    /// Any open failure is fatal to controller construction.
    pub fn open(config: &StationConfig) -> Result<Self, ControllerError> {
        let radio = &config.radio;

        let radio_monitor = RadioLink::open(&radio.monitor_port, radio.baud, radio.address)
            .map_err(|source| ControllerError::PortOpen {
                device: Device::Radio,
                source,
            })?;
        let radio_command = RadioLink::open(&radio.command_port, radio.baud, radio.address)
            .map_err(|source| ControllerError::PortOpen {
                device: Device::Radio,
                source,
            })?;
        let tuner = TunerLink::open(&config.tuner.port, config.tuner.baud).map_err(|source| {
            ControllerError::PortOpen {
                device: Device::Tuner,
                source,
            }
        })?;
        let amplifier =
            AmpLink::open(&config.amplifier.port, config.amplifier.baud).map_err(|source| {
                ControllerError::PortOpen {
                    device: Device::Amplifier,
                    source,
                }
            })?;

        Ok(Self {
            radio_monitor,
            radio_command,
            tuner,
            amplifier,
        })
    }
}

/// The running station controller
pub struct Controller {
    ctx: Arc<MonitorContext>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Open the configured ports and start the controller
    pub async fn start(config: StationConfig) -> Result<Self, ControllerError> {
        config.bands.validate()?;
        let links = StationLinks::open(&config)?;
        Self::start_with(links, config.bands, DEFAULT_POLL_INTERVAL).await
    }

    /// Start against already-built links
    ///
    /// This is the seam the integration tests use to run the full
    /// controller over in-memory streams.
    pub async fn start_with(
        links: StationLinks,
        bands: BandPlan,
        poll_interval: Duration,
    ) -> Result<Self, ControllerError> {
        bands.validate()?;

        let store = Arc::new(StateStore::new());
        let statuses = Arc::new(StatusRegistry::new());
        let coordinator = Arc::new(Coordinator::new(
            links.radio_command,
            links.tuner,
            links.amplifier,
            store.clone(),
            bands.clone(),
        ));

        let ctx = Arc::new(MonitorContext {
            radio: Arc::new(links.radio_monitor),
            coordinator,
            store,
            statuses,
            bands,
            track_tuner: Arc::new(AtomicBool::new(true)),
        });

        let initial = match monitor::initialize_devices(&ctx).await {
            Ok(initial) => initial,
            Err(e) => {
                // Statuses are already Failed; release the links
                ctx.coordinator.close();
                ctx.radio.close();
                return Err(e);
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let tasks = monitor::spawn_loops(ctx.clone(), shutdown_rx, poll_interval, initial);

        info!("station controller started");
        Ok(Self {
            ctx,
            shutdown,
            tasks,
        })
    }

    /// Stop monitoring, close every link, and reset state and statuses
    ///
    /// Pending adapter exchanges resolve to the closed outcome, so every
    /// loop exits within one poll interval without reporting failure.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        self.ctx.coordinator.close();
        self.ctx.radio.close();

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.ctx.store.reset();
        self.ctx.statuses.set_all(Health::Unknown);
        info!("station controller stopped");
    }

    /// Put the amplifier in standby or operate
    pub async fn set_amplifier_mode(&self, mode: AmpMode) -> Result<(), ControllerError> {
        self.ctx.coordinator.set_amplifier_mode(mode).await
    }

    /// Start a full tune cycle on the tuner
    pub async fn full_tune(&self) -> Result<(), ControllerError> {
        self.ctx.coordinator.full_tune().await
    }

    /// Enable or disable pushing frequency changes to the tuner
    pub fn set_tuner_tracking(&self, enabled: bool) {
        self.ctx.track_tuner.store(enabled, Ordering::SeqCst);
    }

    /// Whether frequency changes are pushed to the tuner
    pub fn tuner_tracking(&self) -> bool {
        self.ctx.track_tuner.load(Ordering::SeqCst)
    }

    /// A consistent copy of the current station state
    pub fn snapshot(&self) -> StationSnapshot {
        self.ctx.store.snapshot()
    }

    /// A snapshot of every device's health
    pub fn statuses(&self) -> StatusReport {
        self.ctx.statuses.report()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> (Subscription, mpsc::UnboundedReceiver<StationSnapshot>) {
        self.ctx.store.subscribe()
    }

    /// Drop a state subscription
    pub fn unsubscribe_state(&self, token: Subscription) {
        self.ctx.store.unsubscribe(token);
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> (Subscription, mpsc::UnboundedReceiver<StatusReport>) {
        self.ctx.statuses.subscribe()
    }

    /// Drop a status subscription
    pub fn unsubscribe_status(&self, token: Subscription) {
        self.ctx.statuses.unsubscribe(token);
    }

    /// Direct access to the coordinator for pass-through queries
    pub fn coordinator(&self) -> &Coordinator {
        &self.ctx.coordinator
    }
}
