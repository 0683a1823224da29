//! Underrun-Optimierer
//!
//! Schaetzt die Verzoegerung, bei der nur noch ein kleiner Anteil der Pakete
//! "zu spaet" zum Abspielen ankommt: das konfigurierte Quantil des
//! Histogramms der relativen Ankunftsverzoegerung.
//!
//! Mit Resampling wird pro Intervall zusaetzlich das Maximum der gesehenen
//! Verzoegerungen eingespeist. Kurze Ausreisser werden so nicht ueberbewertet,
//! der schlechteste Jitter pro Intervall aber sicher erfasst.

use playout_core::{GeteilteTickQuelle, StopWatch};

use crate::histogram::{bucket_index, bucket_obergrenze_ms, Histogram, DELAY_BUCKETS};

/// Quantil-Schaetzer fuer die Underrun-Verzoegerung
pub struct UnderrunOptimizer {
    tick_quelle: GeteilteTickQuelle,
    /// Quantil in Q30
    histogram_quantile: i32,
    resample_interval_ms: Option<u32>,
    histogram: Histogram,
    resample_stopwatch: Option<StopWatch>,
    max_delay_in_interval_ms: i32,
    optimal_delay_ms: Option<i32>,
}

impl UnderrunOptimizer {
    /// Erstellt den Optimierer
    ///
    /// `histogram_quantile` in Q30, `forget_factor` in Q15.
    pub fn neu(
        tick_quelle: GeteilteTickQuelle,
        histogram_quantile: i32,
        forget_factor: i32,
        start_forget_weight: f64,
        resample_interval_ms: Option<u32>,
    ) -> Self {
        Self {
            tick_quelle,
            histogram_quantile,
            resample_interval_ms,
            histogram: Histogram::neu(DELAY_BUCKETS, forget_factor, start_forget_weight),
            resample_stopwatch: None,
            max_delay_in_interval_ms: 0,
            optimal_delay_ms: None,
        }
    }

    /// Verarbeitet eine relative Ankunftsverzoegerung
    pub fn update(&mut self, relative_delay_ms: i32) {
        let mut histogram_update = relative_delay_ms;

        if let Some(intervall_ms) = self.resample_interval_ms {
            let stopwatch = self
                .resample_stopwatch
                .get_or_insert_with(|| StopWatch::starten(self.tick_quelle.clone()));

            if stopwatch.elapsed_ms() > intervall_ms as u64 {
                histogram_update = self.max_delay_in_interval_ms;
                self.resample_stopwatch = Some(StopWatch::starten(self.tick_quelle.clone()));
                self.max_delay_in_interval_ms = 0;
            }
            self.max_delay_in_interval_ms = self.max_delay_in_interval_ms.max(relative_delay_ms);
        }

        if histogram_update <= 0 {
            return;
        }

        self.histogram.add(bucket_index(histogram_update));
        let bucket = self.histogram.quantile(self.histogram_quantile);
        self.optimal_delay_ms = Some(bucket_obergrenze_ms(bucket));

        tracing::trace!(
            relative_delay_ms,
            histogram_update,
            bucket,
            "Underrun-Histogramm aktualisiert"
        );
    }

    /// Aktuelle Schaetzung, `None` solange keine Beobachtung eingeflossen ist
    pub fn optimal_delay_ms(&self) -> Option<i32> {
        self.optimal_delay_ms
    }

    /// Setzt Histogramm, Resampling und Schaetzung zurueck
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.resample_stopwatch = None;
        self.max_delay_in_interval_ms = 0;
        self.optimal_delay_ms = None;
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl std::fmt::Debug for UnderrunOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnderrunOptimizer")
            .field("histogram_quantile", &self.histogram_quantile)
            .field("resample_interval_ms", &self.resample_interval_ms)
            .field("max_delay_in_interval_ms", &self.max_delay_in_interval_ms)
            .field("optimal_delay_ms", &self.optimal_delay_ms)
            .finish()
    }
}
