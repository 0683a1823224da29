//! Injizierte Zeitquelle
//!
//! Die Verzoegerungssteuerung liest Zeit ausschliesslich ueber eine
//! [`TickQuelle`], nie ueber die Wanduhr. Damit sind Simulationen und Tests
//! deterministisch wiederholbar: der Aufrufer schaltet den [`TickTimer`]
//! selbst weiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Standard-Aufloesung des Tick-Timers (10 ms pro Tick)
pub const STANDARD_MS_PRO_TICK: u64 = 10;

/// Monotone Tick-Quelle
pub trait TickQuelle: Send + Sync {
    /// Aktueller Tick-Zaehlerstand
    fn ticks(&self) -> u64;

    /// Dauer eines Ticks in Millisekunden
    fn ms_pro_tick(&self) -> u64;
}

/// Geteilte Tick-Quelle, wie sie die Optimierer halten
pub type GeteilteTickQuelle = Arc<dyn TickQuelle>;

// ---------------------------------------------------------------------------
// TickTimer
// ---------------------------------------------------------------------------

/// Manuell weitergeschalteter Tick-Timer
///
/// Der Zaehler ist atomar, damit der Timer per `Arc` zwischen der
/// Empfangsschleife (schaltet weiter) und den Optimierern (lesen) geteilt
/// werden kann.
#[derive(Debug)]
pub struct TickTimer {
    ticks: AtomicU64,
    ms_pro_tick: u64,
}

impl TickTimer {
    /// Erstellt einen Timer mit gegebener Aufloesung (mindestens 1 ms pro Tick)
    pub fn neu(ms_pro_tick: u64) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            ms_pro_tick: ms_pro_tick.max(1),
        }
    }

    /// Erstellt einen Timer mit 10 ms pro Tick
    pub fn standard() -> Self {
        Self::neu(STANDARD_MS_PRO_TICK)
    }

    /// Schaltet den Timer um `anzahl` Ticks weiter
    pub fn increment(&self, anzahl: u64) {
        self.ticks.fetch_add(anzahl, Ordering::Relaxed);
    }

    /// Schaltet den Timer bis mindestens `zeit_ms` weiter (nie rueckwaerts)
    pub fn vorspulen_bis_ms(&self, zeit_ms: u64) {
        let ziel = zeit_ms / self.ms_pro_tick;
        self.ticks.fetch_max(ziel, Ordering::Relaxed);
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::standard()
    }
}

impl TickQuelle for TickTimer {
    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn ms_pro_tick(&self) -> u64 {
        self.ms_pro_tick
    }
}

// ---------------------------------------------------------------------------
// StopWatch
// ---------------------------------------------------------------------------

/// Misst die seit dem Start vergangene Zeit gegen eine Tick-Quelle
pub struct StopWatch {
    quelle: GeteilteTickQuelle,
    start_tick: u64,
}

impl StopWatch {
    /// Startet eine Stoppuhr beim aktuellen Tick der Quelle
    pub fn starten(quelle: GeteilteTickQuelle) -> Self {
        let start_tick = quelle.ticks();
        Self { quelle, start_tick }
    }

    /// Vergangene Ticks seit dem Start
    pub fn elapsed_ticks(&self) -> u64 {
        self.quelle.ticks().saturating_sub(self.start_tick)
    }

    /// Vergangene Millisekunden seit dem Start
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ticks() * self.quelle.ms_pro_tick()
    }
}

impl std::fmt::Debug for StopWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopWatch")
            .field("start_tick", &self.start_tick)
            .field("elapsed_ticks", &self.elapsed_ticks())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CountDown
// ---------------------------------------------------------------------------

/// Laeuft nach einer festen Anzahl Ticks ab
#[derive(Debug)]
pub struct CountDown {
    stopwatch: StopWatch,
    ticks_bis_ablauf: u64,
}

impl CountDown {
    /// Startet den Countdown beim aktuellen Tick der Quelle
    pub fn starten(quelle: GeteilteTickQuelle, ticks_bis_ablauf: u64) -> Self {
        Self {
            stopwatch: StopWatch::starten(quelle),
            ticks_bis_ablauf,
        }
    }

    pub fn abgelaufen(&self) -> bool {
        self.stopwatch.elapsed_ticks() >= self.ticks_bis_ablauf
    }
}
