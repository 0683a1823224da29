//! playout-core – Gemeinsame Bausteine der Playout-Steuerung
//!
//! Dieses Crate stellt die Bausteine bereit, die von der Verzoegerungs-
//! steuerung und dem Simulator gemeinsam genutzt werden.

pub mod error;
pub mod tick;
pub mod unwrapper;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PlayoutError, Result};
pub use tick::{CountDown, GeteilteTickQuelle, StopWatch, TickQuelle, TickTimer};
pub use unwrapper::NumberUnwrapper;
