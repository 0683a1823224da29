//! playout-sim – Bibliotheks-Root
//!
//! Deklariert die Simulator-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Tests bereit.

pub mod config;
pub mod histogramm_sim;
pub mod trace;

use std::io::{Read, Write};

use anyhow::{Context, Result};
use config::{AusgabeFormat, SimConfig, SimModus};
use serde::Serialize;

/// Haelt die Simulator-Konfiguration zusammen
pub struct Simulation {
    pub config: SimConfig,
}

impl Simulation {
    /// Erstellt eine Simulation aus der gegebenen Konfiguration
    pub fn neu(config: SimConfig) -> Self {
        Self { config }
    }

    /// Fuehrt den konfigurierten Modus aus und schreibt die Ergebnisse nach `ausgabe`
    pub fn ausfuehren(&self, ausgabe: &mut impl Write) -> Result<()> {
        tracing::info!(
            modus = ?self.config.simulation.modus,
            ausgabe = ?self.config.simulation.ausgabe,
            "Simulation startet"
        );

        match self.config.simulation.modus {
            SimModus::Trace => {
                let inhalt = self.trace_lesen()?;
                let eintraege = trace::trace_parsen(&inhalt)?;
                let zeilen = trace::abspielen(&self.config, &eintraege);
                self.schreiben(ausgabe, &zeilen, |z| {
                    format!(
                        "{:>6} ts={:<10} ankunft={:<8} delay={:>5} ziel={:>5} unbegrenzt={:>5} min={:>5}",
                        z.paket,
                        z.rtp_timestamp,
                        z.ankunft_ms,
                        z.arrival_delay_ms
                            .map_or_else(|| "-".to_string(), |d| d.to_string()),
                        z.target_delay_ms,
                        z.unlimited_target_delay_ms,
                        z.effective_minimum_delay_ms,
                    )
                })
            }
            SimModus::Histogramm => {
                let schritte = histogramm_sim::simulieren(&self.config.histogramm);
                self.schreiben(ausgabe, &schritte, |s| {
                    format!(
                        "gewicht={:>5} schritt={:>4} index={:>3} quantil={:>3} forget_factor={:.5}",
                        s.start_gewicht, s.schritt, s.index, s.quantil_bucket, s.forget_factor
                    )
                })
            }
        }
    }

    fn trace_lesen(&self) -> Result<String> {
        match &self.config.simulation.trace_datei {
            Some(pfad) => std::fs::read_to_string(pfad)
                .with_context(|| format!("Trace-Datei '{pfad}' nicht lesbar")),
            None => {
                let mut inhalt = String::new();
                std::io::stdin()
                    .read_to_string(&mut inhalt)
                    .context("Trace von stdin nicht lesbar")?;
                Ok(inhalt)
            }
        }
    }

    fn schreiben<T: Serialize>(
        &self,
        ausgabe: &mut impl Write,
        zeilen: &[T],
        als_text: impl Fn(&T) -> String,
    ) -> Result<()> {
        for zeile in zeilen {
            match self.config.simulation.ausgabe {
                AusgabeFormat::Json => {
                    serde_json::to_writer(&mut *ausgabe, zeile)?;
                    writeln!(ausgabe)?;
                }
                AusgabeFormat::Text => writeln!(ausgabe, "{}", als_text(zeile))?,
            }
        }
        ausgabe.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogramm_modus_als_json() {
        let mut config = SimConfig::default();
        config.simulation.modus = SimModus::Histogramm;
        config.simulation.ausgabe = AusgabeFormat::Json;
        config.histogramm.start_gewichte = vec![2.0];

        let mut puffer = Vec::new();
        Simulation::neu(config).ausfuehren(&mut puffer).unwrap();

        let text = String::from_utf8(puffer).unwrap();
        let zeilen: Vec<serde_json::Value> = text
            .lines()
            .map(|z| serde_json::from_str(z).unwrap())
            .collect();
        assert_eq!(zeilen.len(), 303);
        assert_eq!(zeilen[0]["index"], 20);
        assert_eq!(zeilen[302]["quantil_bucket"], 0);
    }

    #[test]
    fn trace_modus_als_text() {
        let pfad = std::env::temp_dir().join(format!("playout-sim-{}.trace", std::process::id()));
        std::fs::write(&pfad, "0 0\n960 20\n1920 90\n").unwrap();

        let mut config = SimConfig::default();
        config.simulation.trace_datei = Some(pfad.to_string_lossy().into_owned());

        let mut puffer = Vec::new();
        let ergebnis = Simulation::neu(config).ausfuehren(&mut puffer);
        std::fs::remove_file(&pfad).unwrap();
        ergebnis.unwrap();

        let text = String::from_utf8(puffer).unwrap();
        let zeilen: Vec<&str> = text.lines().collect();
        assert_eq!(zeilen.len(), 3);
        assert!(zeilen[0].contains("delay=    -"));
        assert!(zeilen[2].contains("delay=   50"));
    }

    #[test]
    fn fehlende_trace_datei_ist_fehler() {
        let mut config = SimConfig::default();
        config.simulation.trace_datei = Some("/nicht/vorhanden.trace".into());
        let fehler = Simulation::neu(config)
            .ausfuehren(&mut Vec::<u8>::new())
            .unwrap_err();
        assert!(fehler.to_string().contains("nicht lesbar"));
    }
}
