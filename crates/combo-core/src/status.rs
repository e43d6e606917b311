//! Per-device health registry
//!
//! Health is deliberately decoupled from telemetry: the state store carries
//! readings, this registry carries only Unknown/Ok/Failed per device.
//! A single-device update that changes nothing produces no notification;
//! a bulk reset always notifies, which is how shutdown forces every
//! observer back to Unknown.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::data::Subscription;

/// The fixed set of monitored devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Radio,
    Tuner,
    Amplifier,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Radio => write!(f, "radio"),
            Device::Tuner => write!(f, "tuner"),
            Device::Amplifier => write!(f, "amplifier"),
        }
    }
}

/// Health of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    #[default]
    Unknown,
    Ok,
    Failed,
}

/// Snapshot of every device's health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub radio: Health,
    pub tuner: Health,
    pub amplifier: Health,
}

impl StatusReport {
    /// Health of one device
    pub fn get(&self, device: Device) -> Health {
        match device {
            Device::Radio => self.radio,
            Device::Tuner => self.tuner,
            Device::Amplifier => self.amplifier,
        }
    }

    /// True if every device has the given health
    pub fn all(&self, health: Health) -> bool {
        self.radio == health && self.tuner == health && self.amplifier == health
    }

    fn set(&mut self, device: Device, health: Health) {
        match device {
            Device::Radio => self.radio = health,
            Device::Tuner => self.tuner = health,
            Device::Amplifier => self.amplifier = health,
        }
    }
}

/// The device health registry
pub struct StatusRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    report: StatusReport,
    observers: HashMap<u64, mpsc::UnboundedSender<StatusReport>>,
    next_token: u64,
}

impl StatusRegistry {
    /// Create a registry with every device Unknown
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Snapshot of every device's health
    pub fn report(&self) -> StatusReport {
        self.inner.lock().unwrap().report
    }

    /// Health of one device
    pub fn get(&self, device: Device) -> Health {
        self.report().get(device)
    }

    /// Set one device's health; a no-op (no notification) when unchanged
    pub fn set(&self, device: Device, health: Health) {
        let mut inner = self.inner.lock().unwrap();
        if inner.report.get(device) == health {
            return;
        }
        inner.report.set(device, health);
        Self::publish(&mut inner);
    }

    /// Set every device to the same health and always notify, even when
    /// nothing changed
    pub fn set_all(&self, health: Health) {
        let mut inner = self.inner.lock().unwrap();
        inner.report = StatusReport {
            radio: health,
            tuner: health,
            amplifier: health,
        };
        Self::publish(&mut inner);
    }

    /// Register an observer; every future report is delivered on the
    /// returned channel
    pub fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<StatusReport>) {
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

    fn publish(inner: &mut RegistryInner) {
        let report = inner.report;
        inner.observers.retain(|_, tx| tx.send(report).is_ok());
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<StatusReport>) -> Vec<StatusReport> {
        let mut out = Vec::new();
        while let Ok(report) = rx.try_recv() {
            out.push(report);
        }
        out
    }

    #[tokio::test]
    async fn repeated_identical_set_notifies_once() {
        let registry = StatusRegistry::new();
        let (_token, mut rx) = registry.subscribe();

        registry.set(Device::Radio, Health::Ok);
        registry.set(Device::Radio, Health::Ok);
        registry.set(Device::Radio, Health::Ok);

        let reports = drain(&mut rx);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].radio, Health::Ok);
    }

    #[tokio::test]
    async fn bulk_reset_always_notifies() {
        let registry = StatusRegistry::new();
        let (_token, mut rx) = registry.subscribe();

        // Everything is already Unknown, but the reset must still notify
        registry.set_all(Health::Unknown);

        let reports = drain(&mut rx);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].all(Health::Unknown));
    }

    #[tokio::test]
    async fn distinct_values_each_notify() {
        let registry = StatusRegistry::new();
        let (_token, mut rx) = registry.subscribe();

        registry.set(Device::Tuner, Health::Ok);
        registry.set(Device::Tuner, Health::Failed);

        let reports = drain(&mut rx);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].tuner, Health::Ok);
        assert_eq!(reports[1].tuner, Health::Failed);
    }
}
