//! Festkomma-Histogramm mit Vergessensfaktor
//!
//! Die Buckets halten Wahrscheinlichkeitsmasse in Q30 (`1 << 30` = 100%).
//! Jeder [`Histogram::add`] multipliziert alle Buckets mit dem aktuellen
//! Forget-Factor (Q15) und schreibt die Restmasse `1 - forget_factor` in den
//! beobachteten Bucket. Da beide Schritte getrennt runden, wird die
//! Gesamtmasse danach explizit auf exakt `1 << 30` korrigiert.
//!
//! Der Forget-Factor startet bei 0 und naehert sich dem Zielwert:
//! - **Zaehler-Anlauf** (Startgewicht >= 0): `1 - gewicht / (n + 1)`
//! - **Exponentiell** (Startgewicht < 0): ein Viertel des Restabstands pro Aufruf
//!
//! Fruehe Beobachtungen wirken dadurch wie ein einfacher Mittelwert, spaeter
//! verfaellt altes Wissen exponentiell.

/// Volle Wahrscheinlichkeitsmasse in Q30
pub const Q30_EINS: i32 = 1 << 30;
/// Forget-Factor 1.0 in Q15
pub const Q15_EINS: i32 = 1 << 15;

/// Anzahl Verzoegerungs-Buckets der Optimierer
pub const DELAY_BUCKETS: usize = 100;
/// Breite eines Verzoegerungs-Buckets in ms (100 Buckets = 0–2000 ms)
pub const BUCKET_SIZE_MS: i32 = 20;

/// Bildet eine Verzoegerung auf ihren Bucket ab, begrenzt auf `[0, DELAY_BUCKETS)`
pub fn bucket_index(delay_ms: i32) -> usize {
    let index = (delay_ms / BUCKET_SIZE_MS).max(0) as usize;
    index.min(DELAY_BUCKETS - 1)
}

/// Verzoegerung, die ein Bucket-Ergebnis abdeckt (Obergrenze des Buckets)
pub fn bucket_obergrenze_ms(index: usize) -> i32 {
    (1 + index as i32) * BUCKET_SIZE_MS
}

/// Wie der Forget-Factor gegen den Zielwert laeuft
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnlaufModus {
    /// Interpolation ueber die Anzahl Beobachtungen
    Zaehler { start_gewicht: f64 },
    /// Pro Aufruf ein Viertel des Restabstands
    Exponentiell,
}

impl AnlaufModus {
    /// Waehlt den Modus anhand des Vorzeichens des Startgewichts
    pub fn aus_gewicht(start_gewicht: f64) -> Self {
        if start_gewicht >= 0.0 {
            Self::Zaehler { start_gewicht }
        } else {
            Self::Exponentiell
        }
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Histogramm ueber eine diskretisierte Verzoegerungsachse
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Masse pro Bucket in Q30
    buckets: Vec<i32>,
    /// Aktueller Forget-Factor in Q15
    forget_factor: i32,
    /// Zielwert des Forget-Factors in Q15
    ziel_forget_factor: i32,
    anlauf: AnlaufModus,
    /// Anzahl `add`-Aufrufe seit dem letzten Reset
    add_count: u64,
}

impl Histogram {
    /// Erstellt ein Histogramm mit `num_buckets` Buckets (mindestens 1)
    ///
    /// `forget_factor` ist der Q15-Zielwert, `start_forget_weight` waehlt
    /// ueber sein Vorzeichen den [`AnlaufModus`].
    pub fn neu(num_buckets: usize, forget_factor: i32, start_forget_weight: f64) -> Self {
        let mut histogram = Self {
            buckets: vec![0; num_buckets.max(1)],
            forget_factor: 0,
            ziel_forget_factor: forget_factor.clamp(0, Q15_EINS),
            anlauf: AnlaufModus::aus_gewicht(start_forget_weight),
            add_count: 0,
        };
        histogram.reset();
        histogram
    }

    /// Setzt eine fallende Startverteilung und den Forget-Factor auf 0
    ///
    /// Bucket i erhaelt grob 2^-(i+1) der Masse, damit Quantil-Abfragen vor
    /// den ersten echten Daten nicht entarten.
    pub fn reset(&mut self) {
        let mut masse: i32 = 0x4002;
        for bucket in self.buckets.iter_mut() {
            masse >>= 1;
            *bucket = masse << 16;
        }
        self.forget_factor = 0;
        self.add_count = 0;
    }

    /// Fuegt eine Beobachtung in Bucket `index` ein
    ///
    /// Ein Index ausserhalb des Histogramms wird auf den letzten Bucket begrenzt.
    pub fn add(&mut self, index: usize) {
        let letzter = self.buckets.len() - 1;
        let index = if index > letzter {
            tracing::debug!(index, letzter, "Histogramm-Index begrenzt");
            letzter
        } else {
            index
        };

        // Alte Masse verfallen lassen: Q30 * Q15 >> 15
        let mut summe: i64 = 0;
        for bucket in self.buckets.iter_mut() {
            *bucket = ((*bucket as i64 * self.forget_factor as i64) >> 15) as i32;
            summe += *bucket as i64;
        }

        // Neue Beobachtung mit (1 - forget_factor), Q15 << 15
        let zuwachs = (Q15_EINS - self.forget_factor) << 15;
        self.buckets[index] += zuwachs;
        summe += zuwachs as i64;

        // Rundungsfehler auf Buckets mit Masse verteilen, kein Bucket wird negativ
        let mut fehler = summe - Q30_EINS as i64;
        if fehler != 0 {
            let vorzeichen: i64 = if fehler > 0 { -1 } else { 1 };
            for bucket in self.buckets.iter_mut() {
                let korrektur = vorzeichen * fehler.abs().min(*bucket as i64);
                *bucket += korrektur as i32;
                fehler += korrektur;
                if fehler == 0 {
                    break;
                }
            }
        }

        self.add_count += 1;
        self.forget_factor_anpassen();
    }

    /// Kleinster Bucket, bis zu dem die kumulierte Masse `probability` (Q30) erreicht
    pub fn quantile(&self, probability: i32) -> usize {
        let rest_schwelle = Q30_EINS as i64 - probability as i64;
        let mut index = 0;
        let mut rest = Q30_EINS as i64 - self.buckets[0] as i64;
        while rest > rest_schwelle && index + 1 < self.buckets.len() {
            index += 1;
            rest -= self.buckets[index] as i64;
        }
        index
    }

    /// Masse aller Buckets in Q30
    pub fn buckets(&self) -> &[i32] {
        &self.buckets
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Aktueller Forget-Factor in Q15
    pub fn forget_factor(&self) -> i32 {
        self.forget_factor
    }

    pub fn add_count(&self) -> u64 {
        self.add_count
    }

    fn forget_factor_anpassen(&mut self) {
        match self.anlauf {
            AnlaufModus::Zaehler { start_gewicht } => {
                if self.forget_factor != self.ziel_forget_factor {
                    let faktor = Q15_EINS as f64
                        * (1.0 - start_gewicht / (self.add_count + 1) as f64);
                    self.forget_factor = (faktor as i32).clamp(0, self.ziel_forget_factor);
                }
            }
            AnlaufModus::Exponentiell => {
                // Konvergiert sicher auf den Zielwert (+3 rundet auf)
                self.forget_factor += (self.ziel_forget_factor - self.forget_factor + 3) >> 2;
            }
        }
    }
}
