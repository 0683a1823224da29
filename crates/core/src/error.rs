//! Fehlertypen fuer die Playout-Steuerung
//!
//! Alle Fehler sind lokal und vom direkten Aufrufer behandelbar. Ein
//! abgelehnter Setter laesst den Zustand unveraendert.

use thiserror::Error;

/// Result-Alias fuer alle Playout-Crates
pub type Result<T> = std::result::Result<T, PlayoutError>;

/// Alle moeglichen Fehler der Playout-Verzoegerungssteuerung
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayoutError {
    // --- Konstruktion ---
    #[error("Bitbreite nicht unterstuetzt: {0} (erlaubt: 8, 16, 32)")]
    BitbreiteNichtUnterstuetzt(u32),

    // --- Setter ---
    #[error("Ungueltige Verzoegerung: {wert_ms} ms ({grund})")]
    UngueltigeVerzoegerung { wert_ms: i32, grund: &'static str },

    #[error("Ungueltige Paketlaenge: {0} ms")]
    UngueltigePaketlaenge(i32),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl PlayoutError {
    /// Erstellt einen Konfigurationsfehler aus einer beliebigen Nachricht
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
