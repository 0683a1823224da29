//! Entpacken umlaufender Zaehler (RTP-Timestamps, Sequenznummern)
//!
//! Ein 8/16/32-Bit-Zaehler laeuft regelmaessig ueber. Der [`NumberUnwrapper`]
//! bildet die Rohwerte auf eine fortlaufende `i64`-Folge ab, indem er jeden
//! Schritt als den kuerzeren Weg auf dem Zahlenkreis interpretiert.

use crate::error::{PlayoutError, Result};

/// Entpackt einen umlaufenden Zaehler fester Bitbreite
#[derive(Debug, Clone)]
pub struct NumberUnwrapper {
    /// Groesster darstellbarer Rohwert (2^bits - 1)
    max_wert: u32,
    /// Letzter Rohwert, `None` vor dem ersten `unwrap`
    letzter_wert: Option<u32>,
    /// Laufende entpackte Summe
    letzter_entpackt: i64,
}

impl NumberUnwrapper {
    /// Erstellt einen Unwrapper fuer 8, 16 oder 32 Bit
    pub fn neu(bits: u32) -> Result<Self> {
        let max_wert = match bits {
            8 => u8::MAX as u32,
            16 => u16::MAX as u32,
            32 => u32::MAX,
            andere => return Err(PlayoutError::BitbreiteNichtUnterstuetzt(andere)),
        };
        Ok(Self {
            max_wert,
            letzter_wert: None,
            letzter_entpackt: 0,
        })
    }

    /// Unwrapper fuer 32-Bit-RTP-Timestamps
    pub fn rtp() -> Self {
        Self {
            max_wert: u32::MAX,
            letzter_wert: None,
            letzter_entpackt: 0,
        }
    }

    /// Entpackt `roh` und merkt sich den Wert als neue Referenz
    ///
    /// Der erste Aufruf liefert den Rohwert selbst als Basis.
    pub fn unwrap(&mut self, roh: u32) -> i64 {
        let roh = roh & self.max_wert;
        self.letzter_entpackt = self.berechnen(roh);
        self.letzter_wert = Some(roh);
        self.letzter_entpackt
    }

    /// Wie [`unwrap`](Self::unwrap), aber ohne Zustandsaenderung
    ///
    /// Gibt `None` zurueck solange noch kein Wert entpackt wurde.
    pub fn peek_unwrap(&self, roh: u32) -> Option<i64> {
        self.letzter_wert?;
        Some(self.berechnen(roh & self.max_wert))
    }

    /// Vergisst den letzten Wert; der naechste `unwrap` beginnt neu
    pub fn reset(&mut self) {
        self.letzter_wert = None;
        self.letzter_entpackt = 0;
    }

    /// Groesse des Zahlenkreises (2^bits)
    fn umfang(&self) -> i64 {
        self.max_wert as i64 + 1
    }

    fn berechnen(&self, roh: u32) -> i64 {
        let Some(letzter) = self.letzter_wert else {
            return roh as i64;
        };
        let umfang = self.umfang();
        // Vorwaertsabstand auf dem Zahlenkreis, in [0, umfang)
        let vorwaerts = (roh as i64 - letzter as i64).rem_euclid(umfang);
        // Mehr als ein halber Umlauf vorwaerts ist ein Schritt rueckwaerts
        let delta = if vorwaerts > umfang / 2 {
            vorwaerts - umfang
        } else {
            vorwaerts
        };
        self.letzter_entpackt + delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nur_8_16_32_bit_erlaubt() {
        assert!(NumberUnwrapper::neu(8).is_ok());
        assert!(NumberUnwrapper::neu(16).is_ok());
        assert!(NumberUnwrapper::neu(32).is_ok());
        assert_eq!(
            NumberUnwrapper::neu(24).unwrap_err(),
            PlayoutError::BitbreiteNichtUnterstuetzt(24)
        );
        assert!(NumberUnwrapper::neu(0).is_err());
    }

    #[test]
    fn umlauf_16_bit_wird_erkannt() {
        let mut u = NumberUnwrapper::neu(16).unwrap();
        let ergebnis: Vec<i64> = [65530u32, 65533, 2, 5]
            .into_iter()
            .map(|roh| u.unwrap(roh))
            .collect();
        assert_eq!(ergebnis, vec![65530, 65533, 65538, 65541]);
    }

    #[test]
    fn rueckwaerts_umlauf_wird_abgezogen() {
        let mut u = NumberUnwrapper::neu(16).unwrap();
        assert_eq!(u.unwrap(3), 3);
        // 3 -> 65534 ist vorwaerts ein fast voller Umlauf, also 5 zurueck
        assert_eq!(u.unwrap(65534), -2);
    }

    #[test]
    fn kleiner_schritt_zurueck_bleibt_klein() {
        let mut u = NumberUnwrapper::neu(32).unwrap();
        assert_eq!(u.unwrap(1_000), 1_000);
        assert_eq!(u.unwrap(960), 960);
    }

    #[test]
    fn gleicher_wert_ergibt_keinen_sprung() {
        let mut u = NumberUnwrapper::rtp();
        assert_eq!(u.unwrap(4_000_000_000), 4_000_000_000);
        assert_eq!(u.unwrap(4_000_000_000), 4_000_000_000);
    }

    #[test]
    fn null_ist_gueltiger_erster_wert() {
        let mut u = NumberUnwrapper::neu(16).unwrap();
        assert_eq!(u.peek_unwrap(0), None);
        assert_eq!(u.unwrap(0), 0);
        // Nach einer 0 muss die Umlauferkennung weiter funktionieren
        assert_eq!(u.peek_unwrap(65535), Some(-1));
        assert_eq!(u.unwrap(10), 10);
    }

    #[test]
    fn peek_aendert_keinen_zustand() {
        let mut u = NumberUnwrapper::neu(8).unwrap();
        u.unwrap(250);
        assert_eq!(u.peek_unwrap(4), Some(260));
        assert_eq!(u.peek_unwrap(4), Some(260));
        assert_eq!(u.unwrap(252), 252);
    }

    #[test]
    fn rohwert_wird_auf_bitbreite_maskiert() {
        let mut u = NumberUnwrapper::neu(8).unwrap();
        assert_eq!(u.unwrap(0x1FF), 255);
    }

    #[test]
    fn reset_vergisst_letzten_wert() {
        let mut u = NumberUnwrapper::neu(16).unwrap();
        u.unwrap(65530);
        u.unwrap(5);
        u.reset();
        assert_eq!(u.peek_unwrap(7), None);
        assert_eq!(u.unwrap(7), 7);
    }
}
