//! Reorder-Optimierer
//!
//! Fuehrt ein zweites Histogramm darueber, wie weit umsortierte Pakete
//! verspaetet sind, und waehlt die Verzoegerung mit den geringsten Kosten.
//! Kosten eines Buckets i:
//!
//! ```text
//! max(0, i * 20 - basis_delay_ms) * 2^30  +  100 * ms_per_loss_percent * verlust(i)
//! ```
//!
//! wobei `verlust(i)` der Anteil (Q30) der Pakete ist, die mehr als Bucket i
//! an Verzoegerung braeuchten und damit vom Jitter Buffer verworfen wuerden.

use crate::histogram::{
    bucket_index, bucket_obergrenze_ms, Histogram, BUCKET_SIZE_MS, DELAY_BUCKETS, Q30_EINS,
};

/// Kostenminimierender Schaetzer fuer umsortierte Pakete
#[derive(Debug, Clone)]
pub struct ReorderOptimizer {
    histogram: Histogram,
    ms_per_loss_percent: i32,
    optimal_delay_ms: Option<i32>,
}

impl ReorderOptimizer {
    /// Erstellt den Optimierer, `forget_factor` in Q15
    pub fn neu(forget_factor: i32, ms_per_loss_percent: i32, start_forget_weight: f64) -> Self {
        Self {
            histogram: Histogram::neu(DELAY_BUCKETS, forget_factor, start_forget_weight),
            ms_per_loss_percent,
            optimal_delay_ms: None,
        }
    }

    /// Verarbeitet ein Paket
    ///
    /// Puenktliche Pakete landen in Bucket 0, sie brauchen keine zusaetzliche
    /// Verzoegerung gegen Umsortierung.
    pub fn update(&mut self, relative_delay_ms: i32, reordered: bool, base_delay_ms: i32) {
        let index = if reordered {
            bucket_index(relative_delay_ms)
        } else {
            0
        };
        self.histogram.add(index);

        let bucket = self.minimize_cost_function(base_delay_ms);
        self.optimal_delay_ms = Some(bucket_obergrenze_ms(bucket));

        tracing::trace!(
            relative_delay_ms,
            reordered,
            base_delay_ms,
            bucket,
            "Reorder-Histogramm aktualisiert"
        );
    }

    /// Aktuelle Schaetzung, `None` vor dem ersten Update
    pub fn optimal_delay_ms(&self) -> Option<i32> {
        self.optimal_delay_ms
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
        self.optimal_delay_ms = None;
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    fn minimize_cost_function(&self, base_delay_ms: i32) -> usize {
        let mut verlust: i64 = Q30_EINS as i64;
        let mut min_kosten = i64::MAX;
        let mut min_bucket = 0;

        for (i, &masse) in self.histogram.buckets().iter().enumerate() {
            // Alles oberhalb von Bucket i ginge verloren
            verlust -= masse as i64;
            let zusatz_delay_ms = (i as i64 * BUCKET_SIZE_MS as i64 - base_delay_ms as i64).max(0);
            let kosten = (zusatz_delay_ms << 30) + 100 * self.ms_per_loss_percent as i64 * verlust;
            if kosten < min_kosten {
                min_kosten = kosten;
                min_bucket = i;
            }
            if verlust == 0 {
                break;
            }
        }
        min_bucket
    }
}
