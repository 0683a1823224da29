//! Konfiguration der Verzoegerungssteuerung
//!
//! Wird einmal pro Medien-Session an den [`DelayManager`](crate::DelayManager)
//! uebergeben und dort als private Kopie gehalten. Alle Felder haben die
//! Standardwerte der NetEQ-Steuerung.

use playout_core::{PlayoutError, Result};
use serde::{Deserialize, Serialize};

use crate::delay_manager::MAX_BASE_MINIMUM_DELAY_MS;
use crate::histogram::{Q15_EINS, Q30_EINS};

/// Konfiguration fuer den Delay Manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayManagerConfig {
    /// Quantil der Underrun-Schaetzung (0.0–1.0]
    pub quantile: f64,
    /// Ziel-Forget-Factor des Underrun-Histogramms [0.0–1.0)
    pub forget_factor: f64,
    /// Startgewicht: >= 0 Anlauf ueber Zaehler, < 0 exponentielle Annaeherung
    pub start_forget_weight: f64,
    /// Resampling-Intervall in ms (0 = jedes Sample direkt verwenden)
    pub resample_interval_ms: u32,
    /// Reorder-Optimierer aktivieren
    pub use_reorder_optimizer: bool,
    /// Ziel-Forget-Factor des Reorder-Histogramms [0.0–1.0)
    pub reorder_forget_factor: f64,
    /// Zusaetzliche Verzoegerung in ms, die ein Prozent Verlust aufwiegt
    pub ms_per_loss_percent: i32,
    /// Kapazitaet des Paket-Buffers in Paketen
    pub max_packets_in_buffer: i32,
    /// Start-Wert der Basis-Mindestverzoegerung in ms
    pub base_minimum_delay_ms: i32,
}

impl Default for DelayManagerConfig {
    fn default() -> Self {
        Self {
            quantile: 0.95,
            forget_factor: 0.983,
            start_forget_weight: 2.0,
            resample_interval_ms: 500,
            use_reorder_optimizer: true,
            reorder_forget_factor: 0.9993,
            ms_per_loss_percent: 20,
            max_packets_in_buffer: 20,
            base_minimum_delay_ms: 0,
        }
    }
}

impl DelayManagerConfig {
    /// Prueft alle Werte auf ihren gueltigen Bereich
    pub fn validieren(&self) -> Result<()> {
        if !(self.quantile > 0.0 && self.quantile <= 1.0) {
            return Err(PlayoutError::konfiguration(format!(
                "quantile muss in (0, 1] liegen, ist {}",
                self.quantile
            )));
        }
        for (name, wert) in [
            ("forget_factor", self.forget_factor),
            ("reorder_forget_factor", self.reorder_forget_factor),
        ] {
            if !(0.0..1.0).contains(&wert) {
                return Err(PlayoutError::konfiguration(format!(
                    "{name} muss in [0, 1) liegen, ist {wert}"
                )));
            }
        }
        if !self.start_forget_weight.is_finite() {
            return Err(PlayoutError::konfiguration(
                "start_forget_weight muss endlich sein",
            ));
        }
        if self.ms_per_loss_percent < 0 {
            return Err(PlayoutError::konfiguration(format!(
                "ms_per_loss_percent darf nicht negativ sein, ist {}",
                self.ms_per_loss_percent
            )));
        }
        if self.max_packets_in_buffer <= 0 {
            return Err(PlayoutError::konfiguration(format!(
                "max_packets_in_buffer muss positiv sein, ist {}",
                self.max_packets_in_buffer
            )));
        }
        if !(0..=MAX_BASE_MINIMUM_DELAY_MS).contains(&self.base_minimum_delay_ms) {
            return Err(PlayoutError::konfiguration(format!(
                "base_minimum_delay_ms muss in [0, {MAX_BASE_MINIMUM_DELAY_MS}] liegen, ist {}",
                self.base_minimum_delay_ms
            )));
        }
        Ok(())
    }

    /// Quantil als Q30-Festkommawert
    pub fn quantile_q30(&self) -> i32 {
        (Q30_EINS as f64 * self.quantile.clamp(0.0, 1.0)) as i32
    }

    /// Underrun-Forget-Factor als Q15-Festkommawert
    pub fn forget_factor_q15(&self) -> i32 {
        nach_q15(self.forget_factor)
    }

    /// Reorder-Forget-Factor als Q15-Festkommawert
    pub fn reorder_forget_factor_q15(&self) -> i32 {
        nach_q15(self.reorder_forget_factor)
    }

    /// Resampling-Intervall, `None` wenn deaktiviert
    pub fn resample_interval(&self) -> Option<u32> {
        (self.resample_interval_ms > 0).then_some(self.resample_interval_ms)
    }
}

fn nach_q15(faktor: f64) -> i32 {
    (Q15_EINS as f64 * faktor.clamp(0.0, 1.0)) as i32
}
