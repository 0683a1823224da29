//! Ankunfts-Tracker: verbindet Ankunftsverlauf und Delay Manager
//!
//! Das ist die Stelle, an der der Paket-Buffer jedes empfangene Paket meldet.
//! Aus Ankunftszeit und RTP-Timestamp werden relative Verzoegerung und
//! Umsortierung bestimmt und an den [`DelayManager`] weitergegeben.

use playout_core::GeteilteTickQuelle;

use crate::arrival_history::ArrivalHistory;
use crate::config::DelayManagerConfig;
use crate::delay_manager::DelayManager;

/// Verfolgt Paketankuenfte und haelt die Ziel-Verzoegerung aktuell
#[derive(Debug)]
pub struct ArrivalTracker {
    verlauf: ArrivalHistory,
    manager: DelayManager,
    /// Zuletzt gemeldete Paketlaenge in Samples
    paket_laenge_samples: u32,
}

impl ArrivalTracker {
    pub fn neu(
        config: &DelayManagerConfig,
        fenster_ms: i64,
        sample_rate_hz: u32,
        tick_quelle: GeteilteTickQuelle,
    ) -> Self {
        let mut verlauf = ArrivalHistory::neu(fenster_ms);
        verlauf.set_sample_rate(sample_rate_hz);
        Self {
            verlauf,
            manager: DelayManager::neu(config, tick_quelle),
            paket_laenge_samples: 0,
        }
    }

    /// Meldet ein empfangenes Paket
    ///
    /// Gibt die relative Ankunftsverzoegerung zurueck, sobald mindestens zwei
    /// Pakete im Fenster liegen; vorher `None`.
    pub fn paket_angekommen(
        &mut self,
        rtp_timestamp: u32,
        arrival_time_ms: i64,
        paket_laenge_samples: u32,
    ) -> Option<i32> {
        let sample_rate_hz = self.verlauf.sample_rate_hz();
        if sample_rate_hz == 0 {
            tracing::warn!(rtp_timestamp, "Paket ohne Abtastrate verworfen");
            return None;
        }

        if paket_laenge_samples > 0 && paket_laenge_samples != self.paket_laenge_samples {
            let laenge_ms = paket_laenge_samples as u64 * 1000 / sample_rate_hz as u64;
            match i32::try_from(laenge_ms) {
                Ok(laenge_ms) => match self.manager.set_packet_audio_length(laenge_ms) {
                    Ok(()) => self.paket_laenge_samples = paket_laenge_samples,
                    Err(e) => tracing::warn!(fehler = %e, "Paketlaenge nicht uebernommen"),
                },
                Err(_) => tracing::warn!(
                    paket_laenge_samples,
                    laenge_ms,
                    "Paketlaenge ausserhalb des Wertebereichs ignoriert"
                ),
            }
        }

        self.verlauf.insert(rtp_timestamp, arrival_time_ms);
        if self.verlauf.len() < 2 {
            return None;
        }

        let arrival_delay_ms = self.verlauf.delay_ms(rtp_timestamp, arrival_time_ms);
        let reordered = !self.verlauf.is_newest_rtp_timestamp(rtp_timestamp);
        self.manager.update(arrival_delay_ms, reordered);

        Some(arrival_delay_ms)
    }

    /// Wechselt die Abtastrate; bei einer Aenderung beginnt der Verlauf neu
    pub fn set_sample_rate(&mut self, sample_rate_hz: u32) {
        if sample_rate_hz == self.verlauf.sample_rate_hz() {
            return;
        }
        tracing::debug!(
            alt = self.verlauf.sample_rate_hz(),
            neu = sample_rate_hz,
            "Abtastrate geaendert, Verlauf zurueckgesetzt"
        );
        self.verlauf.reset();
        self.verlauf.set_sample_rate(sample_rate_hz);
        self.paket_laenge_samples = 0;
    }

    /// Setzt Verlauf, Unwrapper und Delay Manager zurueck
    pub fn reset(&mut self) {
        self.verlauf.reset();
        self.manager.reset();
        self.paket_laenge_samples = 0;
    }

    pub fn target_delay_ms(&self) -> i32 {
        self.manager.target_delay_ms()
    }

    pub fn verlauf(&self) -> &ArrivalHistory {
        &self.verlauf
    }

    pub fn manager(&self) -> &DelayManager {
        &self.manager
    }

    /// Zugriff fuer Mindest-/Maximalverzoegerung von aussen
    pub fn manager_mut(&mut self) -> &mut DelayManager {
        &mut self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay_manager::START_DELAY_MS;
    use playout_core::TickTimer;
    use std::sync::Arc;

    const ABTASTRATE: u32 = 16_000;
    const SAMPLES_20MS: u32 = 320;

    fn tracker() -> ArrivalTracker {
        ArrivalTracker::neu(
            &DelayManagerConfig::default(),
            2_000,
            ABTASTRATE,
            Arc::new(TickTimer::standard()),
        )
    }

    #[test]
    fn erstes_paket_liefert_keine_verzoegerung() {
        let mut t = tracker();
        assert_eq!(t.paket_angekommen(0, 1_000, SAMPLES_20MS), None);
        assert_eq!(t.paket_angekommen(SAMPLES_20MS, 1_020, SAMPLES_20MS), Some(0));
        assert_eq!(t.manager().packet_len_ms(), 20);
    }

    #[test]
    fn gleichmaessige_ankunft_behaelt_startwert() {
        let mut t = tracker();
        for i in 0..200u32 {
            t.paket_angekommen(i * SAMPLES_20MS, 500 + i as i64 * 20, SAMPLES_20MS);
        }
        // Null-Verzoegerungen fliessen nicht ins Underrun-Histogramm
        assert_eq!(t.target_delay_ms(), START_DELAY_MS);
        assert_eq!(t.manager().statistik().underrun_delay_ms, None);
    }

    #[test]
    fn regelmaessige_verspaetung_hebt_ziel() {
        let mut t = tracker();
        for i in 0..200u32 {
            let spaet = if i % 5 == 4 { 100 } else { 0 };
            t.paket_angekommen(i * SAMPLES_20MS, i as i64 * 20 + spaet, SAMPLES_20MS);
        }
        assert_eq!(t.target_delay_ms(), 120);
        assert_eq!(t.manager().statistik().umsortiert, 0);
    }

    #[test]
    fn vertauschte_pakete_gelten_als_umsortiert() {
        let mut t = tracker();
        t.paket_angekommen(0, 0, SAMPLES_20MS);
        t.paket_angekommen(2 * SAMPLES_20MS, 40, SAMPLES_20MS);
        let delay = t.paket_angekommen(SAMPLES_20MS, 45, SAMPLES_20MS);
        assert_eq!(delay, Some(25));
        assert_eq!(t.manager().statistik().umsortiert, 1);
    }

    #[test]
    fn abtastratenwechsel_setzt_verlauf_zurueck() {
        let mut t = tracker();
        t.paket_angekommen(0, 0, SAMPLES_20MS);
        t.paket_angekommen(SAMPLES_20MS, 20, SAMPLES_20MS);
        assert_eq!(t.verlauf().len(), 2);

        t.set_sample_rate(48_000);
        assert!(t.verlauf().is_empty());
        assert_eq!(t.verlauf().sample_rate_hz(), 48_000);

        // Gleiche Rate erneut: kein Reset
        t.paket_angekommen(0, 100, 960);
        t.set_sample_rate(48_000);
        assert_eq!(t.verlauf().len(), 1);
    }

    #[test]
    fn ohne_abtastrate_wird_nichts_geschaetzt() {
        let mut t = ArrivalTracker::neu(
            &DelayManagerConfig::default(),
            2_000,
            0,
            Arc::new(TickTimer::standard()),
        );
        assert_eq!(t.paket_angekommen(0, 0, 160), None);
        assert_eq!(t.paket_angekommen(160, 20, 160), None);
        assert_eq!(t.manager().packet_len_ms(), 0);
    }

    #[test]
    fn reset_beginnt_von_vorn() {
        let mut t = tracker();
        for i in 0..50u32 {
            t.paket_angekommen(i * SAMPLES_20MS, i as i64 * 20 + (i % 2) as i64 * 200, SAMPLES_20MS);
        }
        assert!(t.target_delay_ms() > START_DELAY_MS);

        t.reset();
        assert!(t.verlauf().is_empty());
        assert_eq!(t.target_delay_ms(), START_DELAY_MS);
        assert_eq!(t.manager().packet_len_ms(), 0);
        assert_eq!(t.paket_angekommen(7, 0, SAMPLES_20MS), None);
    }

    #[test]
    fn riesige_paketlaenge_wird_ignoriert() {
        let mut t = ArrivalTracker::neu(
            &DelayManagerConfig::default(),
            2_000,
            1,
            Arc::new(TickTimer::standard()),
        );
        // 4e9 Samples bei 1 Hz: 4e12 ms passen nicht in i32
        assert_eq!(t.paket_angekommen(0, 0, 4_000_000_000), None);
        assert_eq!(t.manager().packet_len_ms(), 0);

        // Grosse, aber darstellbare Laenge wird uebernommen
        assert_eq!(t.paket_angekommen(1, 1_000, 2_000_000), Some(0));
        assert_eq!(t.manager().packet_len_ms(), 2_000_000_000);
    }
}
