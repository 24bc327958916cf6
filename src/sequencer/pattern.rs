// Pattern - tempo, meter and step grid resolution
// The number of steps is always derived, never stored.

use serde::{Deserialize, Serialize};

use crate::sequencer::timeline::{Tempo, TimeSignature};

pub const MIN_STEPS_PER_BEAT: u32 = 1;
pub const MAX_STEPS_PER_BEAT: u32 = 16;
pub const DEFAULT_STEPS_PER_BEAT: u32 = 4;

/// Timing of the step grid shared by every track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pattern {
    #[serde(rename = "bpm")]
    tempo: Tempo,
    #[serde(rename = "timeSig")]
    time_signature: TimeSignature,
    #[serde(deserialize_with = "deserialize_steps_per_beat")]
    steps_per_beat: u32,
}

fn deserialize_steps_per_beat<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = u32::deserialize(deserializer)?;
    Ok(raw.clamp(MIN_STEPS_PER_BEAT, MAX_STEPS_PER_BEAT))
}

impl Pattern {
    pub fn new(bpm: u32, time_signature: TimeSignature, steps_per_beat: u32) -> Self {
        Self {
            tempo: Tempo::new(bpm),
            time_signature,
            steps_per_beat: steps_per_beat.clamp(MIN_STEPS_PER_BEAT, MAX_STEPS_PER_BEAT),
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn bpm(&self) -> u32 {
        self.tempo.bpm()
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn steps_per_beat(&self) -> u32 {
        self.steps_per_beat
    }

    /// beatsPerBar × stepsPerBeat
    pub fn steps_per_pattern(&self) -> usize {
        (self.time_signature.beats_per_bar() * self.steps_per_beat) as usize
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.tempo.set_bpm(bpm);
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        // Re-run the constructor so public-field edits are clamped too
        self.time_signature = TimeSignature::new(time_signature.numerator, time_signature.denominator);
    }

    pub fn set_steps_per_beat(&mut self, steps_per_beat: u32) {
        self.steps_per_beat = steps_per_beat.clamp(MIN_STEPS_PER_BEAT, MAX_STEPS_PER_BEAT);
    }

    pub fn seconds_per_beat(&self) -> f64 {
        self.tempo.beat_duration_seconds()
    }

    /// Duration of one step in seconds: (60 / bpm) / stepsPerBeat
    pub fn step_duration(&self) -> f64 {
        self.seconds_per_beat() / self.steps_per_beat as f64
    }

    /// Offset of a step from the start of the pattern
    pub fn step_time(&self, step: usize) -> f64 {
        step as f64 * self.step_duration()
    }

    /// stepsPerPattern / (stepsPerBeat × beatsPerBar)
    pub fn bars(&self) -> f64 {
        let per_bar = self.steps_per_beat * self.time_signature.beats_per_bar();
        self.steps_per_pattern() as f64 / per_bar as f64
    }

    /// Whole bars covered by an export, at least one
    pub fn render_bars(&self) -> u32 {
        (self.bars().ceil() as u32).max(1)
    }

    /// Length of an offline render including `tail_seconds` of decay
    pub fn render_duration(&self, tail_seconds: f64) -> f64 {
        self.render_bars() as f64 * self.tempo.bar_duration_seconds(&self.time_signature)
            + tail_seconds.max(0.0)
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            time_signature: TimeSignature::default(),
            steps_per_beat: DEFAULT_STEPS_PER_BEAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern() {
        let pattern = Pattern::default();
        assert_eq!(pattern.bpm(), 120);
        assert_eq!(pattern.steps_per_beat(), 4);
        assert_eq!(pattern.steps_per_pattern(), 16);
        assert!((pattern.step_duration() - 0.125).abs() < 1e-12);
        assert!((pattern.step_time(8) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_steps_per_pattern_follows_meter() {
        let mut pattern = Pattern::default();
        pattern.set_time_signature(TimeSignature::three_four());
        assert_eq!(pattern.steps_per_pattern(), 12);
        pattern.set_steps_per_beat(3);
        assert_eq!(pattern.steps_per_pattern(), 9);
        pattern.set_time_signature(TimeSignature::new(7, 8));
        assert_eq!(pattern.steps_per_pattern(), 21);
    }

    #[test]
    fn test_steps_per_beat_is_clamped() {
        assert_eq!(Pattern::new(120, TimeSignature::default(), 0).steps_per_beat(), 1);
        assert_eq!(Pattern::new(120, TimeSignature::default(), 99).steps_per_beat(), 16);
    }

    #[test]
    fn test_raw_time_signature_is_clamped_on_set() {
        let mut pattern = Pattern::default();
        pattern.set_time_signature(TimeSignature {
            numerator: 0,
            denominator: 5,
        });
        assert_eq!(pattern.time_signature(), TimeSignature::new(1, 4));
        assert!(pattern.steps_per_pattern() > 0);
    }

    #[test]
    fn test_render_duration() {
        // 120 BPM 4/4: one bar = 2 s, plus one second of tail
        let pattern = Pattern::default();
        assert_eq!(pattern.render_bars(), 1);
        assert!((pattern.render_duration(1.0) - 3.0).abs() < 1e-12);

        let slow = Pattern::new(60, TimeSignature::three_four(), 2);
        assert!((slow.render_duration(1.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let json = serde_json::to_string(&Pattern::default()).unwrap();
        assert!(json.contains("\"bpm\":120"));
        assert!(json.contains("\"timeSig\":\"4/4\""));
        assert!(json.contains("\"stepsPerBeat\":4"));

        let parsed: Pattern =
            serde_json::from_str(r#"{"bpm":300,"timeSig":"3/4","stepsPerBeat":0}"#).unwrap();
        assert_eq!(parsed.bpm(), 240);
        assert_eq!(parsed.steps_per_pattern(), 3);
    }
}
