//! Ankunftsverlauf der Pakete
//!
//! Haelt ein gleitendes Fenster aus (Medienzeit, Ankunftszeit)-Paaren und
//! misst die Verzoegerung eines Pakets relativ zum am wenigsten verzoegerten
//! Paket im Fenster. Eine konstante Netzwerk-Laufzeit faellt dabei heraus,
//! uebrig bleibt der Jitter.
//!
//! ## Invarianten
//! - Der Verlauf ist in Einfuegereihenfolge, nicht sortiert
//! - Die gecachten Extrema (min/max nach relativer Verzoegerung) sind entweder
//!   Mitglieder des aktuellen Fensters oder leer; wird ein Extremum aus dem
//!   Fenster geschoben, wird der Cache per Vollscan neu aufgebaut

use std::cmp::Ordering;
use std::collections::VecDeque;

use playout_core::NumberUnwrapper;

/// Ein empfangenes Paket auf der Zeitachse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketArrival {
    /// Entpackter RTP-Timestamp in ms
    pub rtp_timestamp_ms: f64,
    /// Lokale Ankunftszeit in ms
    pub arrival_time_ms: i64,
}

impl PacketArrival {
    /// Ankunftszeit minus Medienzeit; kleiner heisst "frueher"
    pub fn relative_verzoegerung_ms(&self) -> f64 {
        self.arrival_time_ms as f64 - self.rtp_timestamp_ms
    }

    /// Ordnet zwei Ankuenfte nach ihrer relativen Verzoegerung
    pub fn vergleiche_verzoegerung(&self, andere: &PacketArrival) -> Ordering {
        self.relative_verzoegerung_ms()
            .total_cmp(&andere.relative_verzoegerung_ms())
    }
}

// ---------------------------------------------------------------------------
// ArrivalHistory
// ---------------------------------------------------------------------------

/// Gleitendes Fenster der Paketankuenfte
#[derive(Debug, Clone)]
pub struct ArrivalHistory {
    history: VecDeque<PacketArrival>,
    min_packet_arrival: Option<PacketArrival>,
    max_packet_arrival: Option<PacketArrival>,
    /// 0 = noch nicht gesetzt
    sample_rate_hz: u32,
    window_size_ms: i64,
    /// Hoechster entpackter Timestamp (in Samples)
    newest_rtp_timestamp: Option<i64>,
    timestamp_unwrapper: NumberUnwrapper,
}

impl ArrivalHistory {
    /// Erstellt einen leeren Verlauf mit gegebener Fenstergroesse
    pub fn neu(window_size_ms: i64) -> Self {
        Self {
            history: VecDeque::new(),
            min_packet_arrival: None,
            max_packet_arrival: None,
            sample_rate_hz: 0,
            window_size_ms,
            newest_rtp_timestamp: None,
            timestamp_unwrapper: NumberUnwrapper::rtp(),
        }
    }

    /// Setzt die Abtastrate, mit der Timestamps in ms umgerechnet werden
    pub fn set_sample_rate(&mut self, sample_rate_hz: u32) {
        self.sample_rate_hz = sample_rate_hz;
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Fuegt eine Ankunft ein und schiebt veraltete Eintraege aus dem Fenster
    pub fn insert(&mut self, rtp_timestamp: u32, arrival_time_ms: i64) {
        if self.sample_rate_hz == 0 {
            tracing::warn!(rtp_timestamp, "Ankunft ohne Abtastrate ignoriert");
            return;
        }

        let entpackt = self.timestamp_unwrapper.unwrap(rtp_timestamp);
        let newest = self
            .newest_rtp_timestamp
            .map_or(entpackt, |bisher| bisher.max(entpackt));
        self.newest_rtp_timestamp = Some(newest);

        let ankunft = PacketArrival {
            rtp_timestamp_ms: self.in_ms(entpackt),
            arrival_time_ms,
        };
        self.history.push_back(ankunft);
        self.maybe_update_cached_arrivals(ankunft);

        let newest_ms = self.in_ms(newest);
        while let Some(aelteste) = self.history.front().copied() {
            if aelteste.rtp_timestamp_ms + self.window_size_ms as f64 >= newest_ms {
                break;
            }
            if self.min_packet_arrival == Some(aelteste) {
                self.min_packet_arrival = None;
            }
            if self.max_packet_arrival == Some(aelteste) {
                self.max_packet_arrival = None;
            }
            self.history.pop_front();
        }

        if self.min_packet_arrival.is_none() || self.max_packet_arrival.is_none() {
            for i in 0..self.history.len() {
                let ankunft = self.history[i];
                self.maybe_update_cached_arrivals(ankunft);
            }
        }
    }

    /// Verzoegerung einer (auch zukuenftigen) Ankunft relativ zum fruehesten Paket
    ///
    /// Gibt 0 zurueck solange kein Referenzpaket existiert.
    pub fn delay_ms(&self, rtp_timestamp: u32, time_ms: i64) -> i32 {
        if self.sample_rate_hz == 0 {
            return 0;
        }
        let Some(entpackt) = self.timestamp_unwrapper.peek_unwrap(rtp_timestamp) else {
            return 0;
        };
        self.packet_arrival_delay_ms(&PacketArrival {
            rtp_timestamp_ms: self.in_ms(entpackt),
            arrival_time_ms: time_ms,
        })
    }

    /// Verzoegerung des am staerksten verzoegerten Pakets im Fenster
    pub fn max_delay_ms(&self) -> i32 {
        self.max_packet_arrival
            .map_or(0, |max| self.packet_arrival_delay_ms(&max))
    }

    /// True wenn `rtp_timestamp` der bisher hoechste entpackte Timestamp ist
    pub fn is_newest_rtp_timestamp(&self, rtp_timestamp: u32) -> bool {
        match (self.newest_rtp_timestamp, self.timestamp_unwrapper.peek_unwrap(rtp_timestamp)) {
            (Some(newest), Some(entpackt)) => newest == entpackt,
            _ => false,
        }
    }

    /// Leert den Verlauf; der Unwrapper beginnt ebenfalls neu
    pub fn reset(&mut self) {
        self.history.clear();
        self.min_packet_arrival = None;
        self.max_packet_arrival = None;
        self.newest_rtp_timestamp = None;
        self.timestamp_unwrapper.reset();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Ankuenfte im Fenster, in Einfuegereihenfolge
    pub fn iter(&self) -> impl Iterator<Item = &PacketArrival> {
        self.history.iter()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn in_ms(&self, entpackt: i64) -> f64 {
        entpackt as f64 * 1000.0 / self.sample_rate_hz as f64
    }

    fn maybe_update_cached_arrivals(&mut self, ankunft: PacketArrival) {
        let neues_min = self
            .min_packet_arrival
            .map_or(true, |min| ankunft.vergleiche_verzoegerung(&min) != Ordering::Greater);
        if neues_min {
            self.min_packet_arrival = Some(ankunft);
        }
        let neues_max = self
            .max_packet_arrival
            .map_or(true, |max| ankunft.vergleiche_verzoegerung(&max) != Ordering::Less);
        if neues_max {
            self.max_packet_arrival = Some(ankunft);
        }
    }

    fn packet_arrival_delay_ms(&self, ankunft: &PacketArrival) -> i32 {
        let Some(min) = self.min_packet_arrival else {
            return 0;
        };
        let delay = (ankunft.arrival_time_ms - min.arrival_time_ms) as f64
            - (ankunft.rtp_timestamp_ms - min.rtp_timestamp_ms);
        delay.max(0.0) as i32
    }
}
