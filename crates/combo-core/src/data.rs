//! Shared station state with change-notification fan-out
//!
//! Three independently-updatable sub-records (radio, amplifier, tuner)
//! behind one lock. Updates are partial: `None` fields leave the stored
//! value unchanged. After every mutation a consistent snapshot goes to each
//! registered observer over its own unbounded channel, so a slow observer
//! can neither block the mutating call nor other observers, and delivery
//! order to any single observer matches publish order.

use std::collections::HashMap;
use std::sync::Mutex;

use combo_protocol::{AmpMode, Band};
use tokio::sync::mpsc;

/// Last known radio readings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadioReading {
    /// Operating frequency in Hz
    pub frequency: u64,
    /// Band covering the frequency; `None` until the first report
    pub band: Option<Band>,
}

/// Last known amplifier readings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AmplifierReading {
    pub mode: AmpMode,
    /// Output power in watts
    pub power_watts: u32,
    /// PA supply voltage
    pub pa_volts: f64,
    /// PA supply current
    pub pa_amps: f64,
}

/// Last known tuner readings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TunerReading {
    pub vswr: f64,
}

/// A consistent view of all three sub-records
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StationSnapshot {
    pub radio: RadioReading,
    pub amplifier: AmplifierReading,
    pub tuner: TunerReading,
}

/// Partial radio update; `None` leaves a field unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioUpdate {
    pub frequency: Option<u64>,
    pub band: Option<Band>,
}

/// Partial amplifier update; `None` leaves a field unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct AmplifierUpdate {
    pub mode: Option<AmpMode>,
    pub power_watts: Option<u32>,
    pub pa_volts: Option<f64>,
    pub pa_amps: Option<f64>,
}

/// Partial tuner update; `None` leaves a field unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct TunerUpdate {
    pub vswr: Option<f64>,
}

/// Opaque observer registration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(pub(crate) u64);

/// The shared state store
pub struct StateStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    snapshot: StationSnapshot,
    observers: HashMap<u64, mpsc::UnboundedSender<StationSnapshot>>,
    next_token: u64,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// A consistent copy of the full state
    pub fn snapshot(&self) -> StationSnapshot {
        self.inner.lock().unwrap().snapshot
    }

    /// A consistent copy of the radio sub-record
    pub fn radio(&self) -> RadioReading {
        self.inner.lock().unwrap().snapshot.radio
    }

    /// A consistent copy of the amplifier sub-record
    pub fn amplifier(&self) -> AmplifierReading {
        self.inner.lock().unwrap().snapshot.amplifier
    }

    /// A consistent copy of the tuner sub-record
    pub fn tuner(&self) -> TunerReading {
        self.inner.lock().unwrap().snapshot.tuner
    }

    /// Apply a partial radio update and notify observers
    pub fn update_radio(&self, update: RadioUpdate) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(frequency) = update.frequency {
            inner.snapshot.radio.frequency = frequency;
        }
        if let Some(band) = update.band {
            inner.snapshot.radio.band = Some(band);
        }
        Self::publish(&mut inner);
    }

    /// Apply a partial amplifier update and notify observers
    pub fn update_amplifier(&self, update: AmplifierUpdate) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mode) = update.mode {
            inner.snapshot.amplifier.mode = mode;
        }
        if let Some(watts) = update.power_watts {
            inner.snapshot.amplifier.power_watts = watts;
        }
        if let Some(volts) = update.pa_volts {
            inner.snapshot.amplifier.pa_volts = volts;
        }
        if let Some(amps) = update.pa_amps {
            inner.snapshot.amplifier.pa_amps = amps;
        }
        Self::publish(&mut inner);
    }

    /// Apply a partial tuner update and notify observers
    pub fn update_tuner(&self, update: TunerUpdate) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(vswr) = update.vswr {
            inner.snapshot.tuner.vswr = vswr;
        }
        Self::publish(&mut inner);
    }

    /// Clear all readings back to their defaults and notify observers
    pub(crate) fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot = StationSnapshot::default();
        Self::publish(&mut inner);
    }

    /// Register an observer; every future snapshot is delivered on the
    /// returned channel
    pub fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<StationSnapshot>) {
        let mut inner = self.inner.lock().unwrap();
        let token = inner.next_token;
        inner.next_token += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.observers.insert(token, tx);
        (Subscription(token), rx)
    }

    /// Remove an observer; safe to call while a notification is in flight
    pub fn unsubscribe(&self, token: Subscription) {
        self.inner.lock().unwrap().observers.remove(&token.0);
    }

    fn publish(inner: &mut StoreInner) {
        let snapshot = inner.snapshot;
        // Dead receivers drop out on their first failed send
        inner.observers.retain(|_, tx| tx.send(snapshot).is_ok());
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_left_unchanged() {
        let store = StateStore::new();
        store.update_radio(RadioUpdate {
            frequency: Some(14_200_000),
            band: None,
        });
        store.update_radio(RadioUpdate {
            frequency: None,
            band: Some(Band::M20),
        });

        let radio = store.radio();
        assert_eq!(radio.frequency, 14_200_000);
        assert_eq!(radio.band, Some(Band::M20));
    }

    #[test]
    fn amplifier_partial_update() {
        let store = StateStore::new();
        store.update_amplifier(AmplifierUpdate {
            mode: Some(AmpMode::Operate),
            ..Default::default()
        });
        store.update_amplifier(AmplifierUpdate {
            power_watts: Some(450),
            pa_volts: Some(54.3),
            pa_amps: Some(18.2),
            ..Default::default()
        });

        let amp = store.amplifier();
        assert_eq!(amp.mode, AmpMode::Operate);
        assert_eq!(amp.power_watts, 450);
        assert_eq!(amp.pa_volts, 54.3);
    }

    #[tokio::test]
    async fn observers_see_snapshots_in_publish_order() {
        let store = StateStore::new();
        let (_token, mut rx) = store.subscribe();

        store.update_radio(RadioUpdate {
            frequency: Some(7_000_000),
            band: Some(Band::M40),
        });
        store.update_tuner(TunerUpdate { vswr: Some(1.5) });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.radio.frequency, 7_000_000);
        assert_eq!(first.tuner.vswr, 0.0);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.radio.frequency, 7_000_000);
        assert_eq!(second.tuner.vswr, 1.5);
    }

    #[tokio::test]
    async fn unsubscribed_observer_gets_nothing_more() {
        let store = StateStore::new();
        let (token, mut rx) = store.subscribe();

        store.update_tuner(TunerUpdate { vswr: Some(1.1) });
        store.unsubscribe(token);
        store.update_tuner(TunerUpdate { vswr: Some(2.2) });

        assert_eq!(rx.recv().await.unwrap().tuner.vswr, 1.1);
        // Channel closes once the sender is removed
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_observer_does_not_block_others() {
        let store = StateStore::new();
        let (_t1, rx1) = store.subscribe();
        let (_t2, mut rx2) = store.subscribe();
        drop(rx1);

        store.update_tuner(TunerUpdate { vswr: Some(1.3) });
        assert_eq!(rx2.recv().await.unwrap().tuner.vswr, 1.3);
    }
}
