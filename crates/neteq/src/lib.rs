//! playout-neteq – Adaptive Ziel-Verzoegerung fuer Jitter Buffer
//!
//! Aus den Ankunftszeiten der Pakete wird geschaetzt, wie viel Audio der
//! Jitter Buffer vorhalten sollte:
//!
//! ```text
//! Paket ──▶ ArrivalHistory ──▶ relative Verzoegerung ──┬─▶ UnderrunOptimizer ─┐
//!                                                      └─▶ ReorderOptimizer ──┴─▶ DelayManager ──▶ Ziel (ms)
//! ```
//!
//! Beide Optimierer arbeiten auf einem Festkomma-[`Histogram`] mit
//! Vergessensfaktor. Der [`DelayManager`] kombiniert die Schaetzungen und
//! begrenzt sie durch Minimum, Maximum und Buffer-Kapazitaet.

pub mod arrival_history;
pub mod arrival_tracker;
pub mod config;
pub mod delay_manager;
pub mod histogram;
pub mod reorder_optimizer;
pub mod underrun_optimizer;

pub use arrival_history::{ArrivalHistory, PacketArrival};
pub use arrival_tracker::ArrivalTracker;
pub use config::DelayManagerConfig;
pub use delay_manager::{DelayManager, DelayStatistik, MAX_BASE_MINIMUM_DELAY_MS, START_DELAY_MS};
pub use histogram::{AnlaufModus, Histogram, BUCKET_SIZE_MS, DELAY_BUCKETS, Q15_EINS, Q30_EINS};
pub use reorder_optimizer::ReorderOptimizer;
pub use underrun_optimizer::UnderrunOptimizer;
