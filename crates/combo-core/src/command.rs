//! High-level device commands
//!
//! The coordinator owns the command-side links and turns station-level
//! operations into per-device exchanges, enforcing the cross-device
//! ordering rules. Query operations wrap a single adapter call and return
//! the result as-is; there is no client-side retry.

use std::sync::Arc;

use combo_link::{AmpLink, Exchange, RadioLink, TunerLink};
use combo_protocol::AmpMode;
use tracing::debug;

use crate::config::BandPlan;
use crate::data::{AmplifierUpdate, StateStore};
use crate::error::ControllerError;

/// High-level commands over the command-side links
pub struct Coordinator {
    radio: RadioLink,
    tuner: TunerLink,
    amp: AmpLink,
    store: Arc<StateStore>,
    bands: BandPlan,
}

impl Coordinator {
    /// Build a coordinator over already-open links
    pub fn new(
        radio: RadioLink,
        tuner: TunerLink,
        amp: AmpLink,
        store: Arc<StateStore>,
        bands: BandPlan,
    ) -> Self {
        Self {
            radio,
            tuner,
            amp,
            store,
            bands,
        }
    }

    pub(crate) fn close(&self) {
        self.radio.close();
        self.tuner.close();
        self.amp.close();
    }

    /// Change the amplifier mode, keeping the radio's drive level and the
    /// amplifier's state in the documented relative order
    ///
    /// Moving operate -> standby updates the amplifier's mode before the
    /// radio's RF power; moving standby -> operate updates the radio's RF
    /// power before the amplifier's mode. The drive level in either
    /// direction comes from the current band's profile, selected by the
    /// *target* mode.
    pub async fn set_amplifier_mode(&self, mode: AmpMode) -> Result<(), ControllerError> {
        // Current mode decides the update order
        let current = self.store.amplifier().mode;
        debug!(%current, target = %mode, "amplifier mode change");

        self.store.update_amplifier(AmplifierUpdate {
            mode: Some(mode),
            ..Default::default()
        });

        if current == AmpMode::Operate && mode == AmpMode::Standby {
            // operate -> standby
            self.update_amp_mode().await?;
            self.update_rf_power().await?;
        } else {
            // standby -> operate
            self.update_rf_power().await?;
            self.update_amp_mode().await?;
        }

        Ok(())
    }

    /// Push the stored amplifier mode to the amplifier
    pub async fn update_amp_mode(&self) -> Result<(), ControllerError> {
        let mode = self.store.amplifier().mode;
        self.amp.set_mode(mode).await?;
        Ok(())
    }

    /// Push the drive level for the stored band and mode to the radio
    pub async fn update_rf_power(&self) -> Result<(), ControllerError> {
        let band = self
            .store
            .radio()
            .band
            .ok_or(ControllerError::NoActiveBand)?;
        let mode = self.store.amplifier().mode;
        let percent = self
            .bands
            .rf_power_percent(band, mode)
            .ok_or(ControllerError::NoProfile { band })?;

        self.radio.set_rf_power(percent).await?;
        Ok(())
    }

    /// Push the stored band to the amplifier
    pub async fn update_amp_band(&self) -> Result<(), ControllerError> {
        let band = self
            .store
            .radio()
            .band
            .ok_or(ControllerError::NoActiveBand)?;
        self.amp.set_band(band).await?;
        Ok(())
    }

    /// Push the stored frequency to the tuner
    pub async fn update_tuner_frequency(&self) -> Result<(), ControllerError> {
        let frequency = self.store.radio().frequency;
        self.tuner.set_frequency(frequency).await?;
        Ok(())
    }

    /// Start a full tune cycle on the tuner
    pub async fn full_tune(&self) -> Result<(), ControllerError> {
        self.tuner.full_tune().await?;
        Ok(())
    }

    /// Whether the tuner reports an active fault
    pub async fn tuner_faulted(&self) -> Result<Exchange<bool>, ControllerError> {
        Ok(match self.tuner.fault().await? {
            Exchange::Reply(code) => Exchange::Reply(code != 0),
            Exchange::Closed => Exchange::Closed,
        })
    }

    /// The tuner's last measured VSWR
    pub async fn tuner_vswr(&self) -> Result<Exchange<f64>, ControllerError> {
        Ok(self.tuner.vswr().await?)
    }

    /// Whether the amplifier reports an active fault
    pub async fn amp_faulted(&self) -> Result<Exchange<bool>, ControllerError> {
        Ok(match self.amp.fault().await? {
            Exchange::Reply(code) => Exchange::Reply(code != 0),
            Exchange::Closed => Exchange::Closed,
        })
    }

    /// The amplifier's current output power in watts
    pub async fn amp_power(&self) -> Result<Exchange<u32>, ControllerError> {
        Ok(self.amp.power().await?)
    }

    /// The amplifier's PA supply as (volts, amps)
    pub async fn amp_pa_supply(&self) -> Result<Exchange<(f64, f64)>, ControllerError> {
        Ok(self.amp.pa_supply().await?)
    }
}
