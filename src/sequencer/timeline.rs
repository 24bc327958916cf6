// Timeline - Musical time representation
// Tempo and time signature, clamped to the ranges the sequencer supports

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 240;
pub const DEFAULT_BPM: u32 = 120;

/// Largest beats-per-bar accepted
pub const MAX_BEATS_PER_BAR: u8 = 32;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
///
/// Only the numerator drives step timing; a beat always lasts 60/bpm seconds
/// whatever the beat unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Out-of-range values are clamped: the numerator to 1..=32, a
    /// denominator that is not a power of two falls back to 4.
    pub fn new(numerator: u8, denominator: u8) -> Self {
        let denominator = if denominator.is_power_of_two() && denominator <= 64 {
            denominator
        } else {
            4
        };
        Self {
            numerator: numerator.clamp(1, MAX_BEATS_PER_BAR),
            denominator,
        }
    }

    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3, 4)
    }

    pub fn six_eight() -> Self {
        Self::new(6, 8)
    }

    /// Number of beats per bar
    pub fn beats_per_bar(&self) -> u32 {
        self.numerator as u32
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time signature '{0}', expected the form 4/4")]
pub struct ParseTimeSignatureError(pub String);

impl FromStr for TimeSignature {
    type Err = ParseTimeSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeSignatureError(s.to_string());
        let (num, den) = s.trim().split_once('/').ok_or_else(err)?;
        let numerator: u8 = num.trim().parse().map_err(|_| err())?;
        let denominator: u8 = den.trim().parse().map_err(|_| err())?;
        if numerator == 0 {
            return Err(err());
        }
        Ok(Self::new(numerator, denominator))
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = ParseTimeSignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

/// Tempo in BPM (Beats Per Minute), always within MIN_BPM..=MAX_BPM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Tempo {
    bpm: u32,
}

impl Tempo {
    pub fn new(bpm: u32) -> Self {
        Self {
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
        }
    }

    /// Rounds and clamps a fractional tempo; NaN gives the default
    pub fn from_f64(bpm: f64) -> Self {
        if bpm.is_nan() {
            return Self::default();
        }
        Self::new(bpm.round().clamp(0.0, u32::MAX as f64) as u32)
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        *self = Self::new(bpm);
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Duration of one bar in seconds at given time signature
    pub fn bar_duration_seconds(&self, time_signature: &TimeSignature) -> f64 {
        self.beat_duration_seconds() * time_signature.beats_per_bar() as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

impl From<u32> for Tempo {
    fn from(bpm: u32) -> Self {
        Self::new(bpm)
    }
}

impl From<Tempo> for u32 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature() {
        let ts = TimeSignature::four_four();
        assert_eq!(ts.numerator, 4);
        assert_eq!(ts.denominator, 4);
        assert_eq!(ts.beats_per_bar(), 4);
        assert_eq!(ts.to_string(), "4/4");
    }

    #[test]
    fn test_time_signature_clamping() {
        assert_eq!(TimeSignature::new(0, 4).numerator, 1);
        assert_eq!(TimeSignature::new(200, 4).numerator, MAX_BEATS_PER_BAR);
        assert_eq!(TimeSignature::new(4, 3).denominator, 4);
        assert_eq!(TimeSignature::new(7, 8).denominator, 8);
    }

    #[test]
    fn test_time_signature_parsing() {
        assert_eq!("3/4".parse::<TimeSignature>().unwrap(), TimeSignature::three_four());
        assert_eq!(" 6 / 8 ".parse::<TimeSignature>().unwrap(), TimeSignature::six_eight());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("four".parse::<TimeSignature>().is_err());
        assert!("4/x".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_time_signature_serializes_as_text() {
        let json = serde_json::to_string(&TimeSignature::six_eight()).unwrap();
        assert_eq!(json, "\"6/8\"");
        let back: TimeSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TimeSignature::six_eight());
        assert!(serde_json::from_str::<TimeSignature>("\"0/4\"").is_err());
    }

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120);
        assert_eq!(tempo.bpm(), 120);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
        assert_eq!(tempo.bar_duration_seconds(&TimeSignature::four_four()), 2.0);
    }

    #[test]
    fn test_tempo_is_clamped() {
        assert_eq!(Tempo::new(10).bpm(), MIN_BPM);
        assert_eq!(Tempo::new(1000).bpm(), MAX_BPM);
        assert_eq!(Tempo::from_f64(99.6).bpm(), 100);
        assert_eq!(Tempo::from_f64(f64::NAN).bpm(), DEFAULT_BPM);
        assert_eq!(Tempo::from_f64(-5.0).bpm(), MIN_BPM);

        let mut tempo = Tempo::default();
        tempo.set_bpm(500);
        assert_eq!(tempo.bpm(), MAX_BPM);
    }

    #[test]
    fn test_tempo_serde_clamps() {
        let tempo: Tempo = serde_json::from_str("999").unwrap();
        assert_eq!(tempo.bpm(), MAX_BPM);
        assert_eq!(serde_json::to_string(&Tempo::new(90)).unwrap(), "90");
    }
}
