//! Anlauf-Simulation des Histogramms
//!
//! Speist eine feste Folge von Bucket-Indizes in ein frisches Histogramm:
//! zwei Ausreisser in Bucket 20, einmal Bucket 1, danach 300 mal Bucket 0.
//! Pro Startgewicht wird nach jedem Schritt Quantil-Bucket und Forget-Factor
//! festgehalten. Daran sieht man, wie schnell sich das Histogramm von fruehen
//! Ausreissern erholt.

use playout_neteq::{Histogram, Q15_EINS, Q30_EINS};
use serde::Serialize;

use crate::config::HistogrammEinstellungen;

/// Ein Simulationsschritt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogrammSchritt {
    pub start_gewicht: f64,
    pub schritt: usize,
    /// Eingespeister Bucket-Index
    pub index: usize,
    pub quantil_bucket: usize,
    /// Forget-Factor als Anteil (0..1)
    pub forget_factor: f64,
}

/// Die eingespeiste Index-Folge
pub fn eingabe_folge() -> Vec<usize> {
    let mut folge = vec![20, 20, 1];
    folge.extend(std::iter::repeat(0).take(300));
    folge
}

/// Simuliert alle konfigurierten Startgewichte nacheinander
pub fn simulieren(einstellungen: &HistogrammEinstellungen) -> Vec<HistogrammSchritt> {
    let forget_factor = (Q15_EINS as f64 * einstellungen.forget_factor) as i32;
    let quantil = (Q30_EINS as f64 * einstellungen.quantil) as i32;
    let folge = eingabe_folge();

    let mut schritte = Vec::with_capacity(folge.len() * einstellungen.start_gewichte.len());
    for &start_gewicht in &einstellungen.start_gewichte {
        let mut histogram = Histogram::neu(einstellungen.buckets, forget_factor, start_gewicht);
        for (schritt, &index) in folge.iter().enumerate() {
            histogram.add(index);
            schritte.push(HistogrammSchritt {
                start_gewicht,
                schritt,
                index,
                quantil_bucket: histogram.quantile(quantil),
                forget_factor: histogram.forget_factor() as f64 / Q15_EINS as f64,
            });
        }
        tracing::debug!(
            start_gewicht,
            forget_factor = histogram.forget_factor(),
            "Anlauf simuliert"
        );
    }
    schritte
}
