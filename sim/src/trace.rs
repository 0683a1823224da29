//! Abspielen eines Paket-Traces
//!
//! Format: eine Zeile pro Paket, `<rtp_timestamp> <ankunft_ms>`, durch
//! Leerraum getrennt. Leere Zeilen und Kommentare ab `#` werden ignoriert.

use std::sync::Arc;

use anyhow::{bail, Context};
use playout_core::{CountDown, TickTimer};
use playout_neteq::ArrivalTracker;
use serde::Serialize;

use crate::config::SimConfig;

/// Ein Paket aus dem Trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEintrag {
    pub rtp_timestamp: u32,
    pub ankunft_ms: i64,
}

/// Abstand der Fortschrittsmeldungen in simulierter Zeit
const FORTSCHRITT_INTERVALL_MS: u64 = 10_000;

/// Zustand nach einem Paket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErgebnisZeile {
    pub paket: usize,
    pub rtp_timestamp: u32,
    pub ankunft_ms: i64,
    /// Relative Ankunftsverzoegerung, leer fuer das erste Paket
    pub arrival_delay_ms: Option<i32>,
    pub target_delay_ms: i32,
    pub unlimited_target_delay_ms: i32,
    pub effective_minimum_delay_ms: i32,
    pub umsortiert: u64,
}

/// Liest einen Trace aus Text
pub fn trace_parsen(inhalt: &str) -> anyhow::Result<Vec<TraceEintrag>> {
    let mut eintraege = Vec::new();
    for (nr, zeile) in inhalt.lines().enumerate() {
        let zeile = zeile.split('#').next().unwrap_or_default().trim();
        if zeile.is_empty() {
            continue;
        }
        let mut felder = zeile.split_whitespace();
        let (Some(ts), Some(ankunft), None) = (felder.next(), felder.next(), felder.next()) else {
            bail!("Zeile {}: erwartet '<rtp_timestamp> <ankunft_ms>'", nr + 1);
        };
        eintraege.push(TraceEintrag {
            rtp_timestamp: ts
                .parse()
                .with_context(|| format!("Zeile {}: ungueltiger RTP-Timestamp '{ts}'", nr + 1))?,
            ankunft_ms: ankunft
                .parse()
                .with_context(|| format!("Zeile {}: ungueltige Ankunftszeit '{ankunft}'", nr + 1))?,
        });
    }
    Ok(eintraege)
}

/// Spielt den Trace durch einen frischen Ankunfts-Tracker
///
/// Die simulierte Uhr wird vor jedem Paket auf dessen Ankunftszeit
/// vorgespult, damit das Resampling des Underrun-Optimierers greift.
pub fn abspielen(config: &SimConfig, eintraege: &[TraceEintrag]) -> Vec<ErgebnisZeile> {
    let timer = Arc::new(TickTimer::neu(config.simulation.ms_pro_tick));
    let mut tracker = ArrivalTracker::neu(
        &config.delay_manager,
        config.verlauf.fenster_ms,
        config.verlauf.abtastrate_hz,
        timer.clone(),
    );

    let start_ms = eintraege.iter().map(|e| e.ankunft_ms).min().unwrap_or(0);
    let mut zeilen = Vec::with_capacity(eintraege.len());
    let fortschritt_ticks = FORTSCHRITT_INTERVALL_MS / config.simulation.ms_pro_tick.max(1);
    let mut fortschritt = CountDown::starten(timer.clone(), fortschritt_ticks);

    for (paket, eintrag) in eintraege.iter().enumerate() {
        // Die Uhr laeuft nie rueckwaerts, umsortierte Ankuenfte halten sie nur an
        timer.vorspulen_bis_ms((eintrag.ankunft_ms - start_ms) as u64);

        let arrival_delay_ms = tracker.paket_angekommen(
            eintrag.rtp_timestamp,
            eintrag.ankunft_ms,
            config.verlauf.paket_laenge_samples,
        );
        let statistik = tracker.manager().statistik();

        tracing::debug!(
            paket,
            rtp_timestamp = eintrag.rtp_timestamp,
            arrival_delay_ms,
            target_ms = statistik.target_delay_ms,
            "Paket verarbeitet"
        );
        if fortschritt.abgelaufen() {
            tracing::info!(
                paket,
                simuliert_ms = eintrag.ankunft_ms - start_ms,
                target_ms = statistik.target_delay_ms,
                "Fortschritt"
            );
            fortschritt = CountDown::starten(timer.clone(), fortschritt_ticks);
        }

        zeilen.push(ErgebnisZeile {
            paket,
            rtp_timestamp: eintrag.rtp_timestamp,
            ankunft_ms: eintrag.ankunft_ms,
            arrival_delay_ms,
            target_delay_ms: statistik.target_delay_ms,
            unlimited_target_delay_ms: statistik.unlimited_target_delay_ms,
            effective_minimum_delay_ms: statistik.effective_minimum_delay_ms,
            umsortiert: statistik.umsortiert,
        });
    }

    tracing::info!(
        pakete = zeilen.len(),
        target_ms = tracker.target_delay_ms(),
        "Trace abgespielt"
    );
    zeilen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_mit_kommentaren() {
        let text = "# rtp ankunft\n0 1000\n\n960 1020 # puenktlich\n  1920   1100\n";
        let eintraege = trace_parsen(text).unwrap();
        assert_eq!(
            eintraege,
            vec![
                TraceEintrag { rtp_timestamp: 0, ankunft_ms: 1_000 },
                TraceEintrag { rtp_timestamp: 960, ankunft_ms: 1_020 },
                TraceEintrag { rtp_timestamp: 1_920, ankunft_ms: 1_100 },
            ]
        );
    }

    #[test]
    fn fehlerhafte_zeilen_nennen_zeilennummer() {
        let fehler = trace_parsen("0 10\nabc 20\n").unwrap_err();
        assert!(format!("{fehler:#}").contains("Zeile 2"));
        assert!(trace_parsen("0 10 30\n").is_err());
        assert!(trace_parsen("0\n").is_err());
    }

    #[test]
    fn abspielen_liefert_eine_zeile_pro_paket() {
        let mut config = SimConfig::default();
        config.delay_manager.use_reorder_optimizer = false;
        // 48 kHz, 20 ms Pakete; jedes Paket 50 ms spaeter als das erste
        let mut eintraege = vec![TraceEintrag { rtp_timestamp: 0, ankunft_ms: 0 }];
        for i in 1..60u32 {
            eintraege.push(TraceEintrag {
                rtp_timestamp: i * 960,
                ankunft_ms: i as i64 * 20 + 50,
            });
        }

        let zeilen = abspielen(&config, &eintraege);
        assert_eq!(zeilen.len(), 60);
        assert_eq!(zeilen[0].arrival_delay_ms, None);
        assert_eq!(zeilen[0].target_delay_ms, 80);
        assert_eq!(zeilen[1].arrival_delay_ms, Some(50));
        assert_eq!(zeilen[59].target_delay_ms, 60);
    }

    #[test]
    fn umsortierte_ankunft_wird_gezaehlt() {
        // Startzeit ist das Minimum aller Ankuenfte, auch bei Umsortierung
        let eintraege = [
            TraceEintrag { rtp_timestamp: 960, ankunft_ms: 40 },
            TraceEintrag { rtp_timestamp: 0, ankunft_ms: 10 },
        ];
        let zeilen = abspielen(&SimConfig::default(), &eintraege);
        assert_eq!(zeilen.len(), 2);
        assert_eq!(zeilen[1].umsortiert, 1);
    }
}
