//! Simulator-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, sodass der Simulator ohne Konfigurationsdatei laeuft.

use anyhow::{bail, Context};
use playout_neteq::DelayManagerConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Simulator-Konfiguration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Parameter des Delay Managers
    pub delay_manager: DelayManagerConfig,
    /// Ankunftsverlauf und Paketformat
    pub verlauf: VerlaufEinstellungen,
    /// Modus, Eingabe und Ausgabe
    pub simulation: SimulationEinstellungen,
    /// Anlauf-Simulation des Histogramms
    pub histogramm: HistogrammEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Ankunftsverlauf und Paketformat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerlaufEinstellungen {
    /// Fenstergroesse des Ankunftsverlaufs in ms
    pub fenster_ms: i64,
    /// Abtastrate der RTP-Timestamps
    pub abtastrate_hz: u32,
    /// Audio pro Paket in Samples
    pub paket_laenge_samples: u32,
}

impl Default for VerlaufEinstellungen {
    fn default() -> Self {
        Self {
            fenster_ms: 2_000,
            abtastrate_hz: 48_000,
            paket_laenge_samples: 960,
        }
    }
}

/// Was der Simulator ausfuehrt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimModus {
    /// Paket-Trace durch den Ankunfts-Tracker abspielen
    #[default]
    Trace,
    /// Anlaufverhalten des Histogramms fuer mehrere Startgewichte
    Histogramm,
}

/// Format der Ergebniszeilen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AusgabeFormat {
    #[default]
    Text,
    /// Eine JSON-Zeile pro Ergebnis
    Json,
}

/// Modus, Eingabe und Ausgabe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationEinstellungen {
    pub modus: SimModus,
    /// Trace-Datei (leer = stdin)
    pub trace_datei: Option<String>,
    /// Aufloesung der simulierten Uhr
    pub ms_pro_tick: u64,
    pub ausgabe: AusgabeFormat,
}

impl Default for SimulationEinstellungen {
    fn default() -> Self {
        Self {
            modus: SimModus::Trace,
            trace_datei: None,
            ms_pro_tick: 10,
            ausgabe: AusgabeFormat::Text,
        }
    }
}

/// Parameter der Histogramm-Anlaufsimulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogrammEinstellungen {
    /// Ziel-Forget-Factor (0..1)
    pub forget_factor: f64,
    /// Zu vergleichende Startgewichte (negativ = exponentieller Anlauf)
    pub start_gewichte: Vec<f64>,
    /// Abgefragtes Quantil (0..1]
    pub quantil: f64,
    pub buckets: usize,
}

impl Default for HistogrammEinstellungen {
    fn default() -> Self {
        Self {
            forget_factor: 0.999,
            start_gewichte: vec![-1.0, 1.0, 2.0],
            quantil: 0.95,
            buckets: 100,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SimConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft alle Wertebereiche
    pub fn pruefen(&self) -> anyhow::Result<()> {
        self.delay_manager
            .validieren()
            .context("Ungueltige [delay_manager]-Einstellungen")?;

        if self.verlauf.abtastrate_hz == 0 {
            bail!("verlauf.abtastrate_hz muss > 0 sein");
        }
        if self.verlauf.fenster_ms <= 0 {
            bail!("verlauf.fenster_ms muss > 0 sein");
        }
        if self.simulation.ms_pro_tick == 0 {
            bail!("simulation.ms_pro_tick muss > 0 sein");
        }

        let h = &self.histogramm;
        if !(h.quantil > 0.0 && h.quantil <= 1.0) {
            bail!("histogramm.quantil muss in (0, 1] liegen, ist {}", h.quantil);
        }
        if !(0.0..1.0).contains(&h.forget_factor) {
            bail!(
                "histogramm.forget_factor muss in [0, 1) liegen, ist {}",
                h.forget_factor
            );
        }
        if h.buckets == 0 {
            bail!("histogramm.buckets muss > 0 sein");
        }
        Ok(())
    }
}
