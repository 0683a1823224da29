//! Playout-Simulator – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und fuehrt die
//! Simulation aus. Ergebnisse gehen nach stdout, Logs nach stderr.

use anyhow::Result;
use playout_sim::{config::SimConfig, Simulation};

fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("PLAYOUT_CONFIG").unwrap_or_else(|_| "playout.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = SimConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Playout-Simulator wird initialisiert"
    );

    let stdout = std::io::stdout();
    Simulation::neu(config).ausfuehren(&mut stdout.lock())?;

    Ok(())
}

/// Initialisiert tracing-subscriber mit dem konfigurierten Level und Format
///
/// `PLAYOUT_LOG_LEVEL` ueberschreibt das konfigurierte Level.
fn logging_initialisieren(level: &str, format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("PLAYOUT_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
