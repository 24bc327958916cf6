// Dynamics - transient noise gate
//
// Soft-knee downward expander: signal above the threshold passes at unity,
// signal below it is pushed down by (ratio - 1) dB per dB under the
// threshold. With the threshold at -100 dB the gate never closes on any
// audible material.
//
// The detector follows the stereo peak instantly and falls with the release
// time; the gain moves towards its target with the attack time when opening
// and the release time when closing. On digital silence the gain is held.

use crate::audio::buffer::StereoFrame;
use crate::audio::dsp_utils::{OnePoleSmoother, PARAM_SMOOTHING_MS, db_to_linear, linear_to_db};

pub const GATE_KNEE_DB: f32 = 10.0;
pub const GATE_RATIO: f32 = 15.0;
pub const GATE_ATTACK_SECONDS: f32 = 0.003;
pub const GATE_RELEASE_SECONDS: f32 = 0.1;

// Detector level under which the gain is held (-160 dB)
const SILENCE_FLOOR: f32 = 1e-8;

pub const MIN_THRESHOLD_DB: f32 = -100.0;
pub const MAX_THRESHOLD_DB: f32 = 0.0;

/// Envelope coefficient for a time constant in seconds
fn time_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (-1.0 / (seconds * sample_rate)).exp()
}

/// Gain change in dB for a detected level
///
/// `over` is the level relative to the threshold; above +knee/2 no change,
/// below -knee/2 full expansion, quadratic blend in between.
#[inline]
pub fn gain_reduction_db(level_db: f32, threshold_db: f32) -> f32 {
    let over = level_db - threshold_db;
    let half_knee = GATE_KNEE_DB * 0.5;
    if over >= half_knee {
        0.0
    } else if over <= -half_knee {
        (GATE_RATIO - 1.0) * over
    } else {
        let d = over - half_knee;
        -(GATE_RATIO - 1.0) * d * d / (2.0 * GATE_KNEE_DB)
    }
}

#[derive(Debug, Clone)]
pub struct NoiseGate {
    threshold_db: f32,
    threshold_smoother: OnePoleSmoother,
    attack: f32,
    release: f32,
    envelope: f32,
    gain: f32,
}

impl NoiseGate {
    pub fn new(threshold_db: f32, sample_rate: f32) -> Self {
        let threshold_db = threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
        Self {
            threshold_db,
            threshold_smoother: OnePoleSmoother::new(threshold_db, PARAM_SMOOTHING_MS, sample_rate),
            attack: time_coefficient(GATE_ATTACK_SECONDS, sample_rate),
            release: time_coefficient(GATE_RELEASE_SECONDS, sample_rate),
            envelope: 0.0,
            gain: 1.0,
        }
    }

    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
    }

    pub fn set_threshold_immediate(&mut self, threshold_db: f32) {
        self.set_threshold(threshold_db);
        self.threshold_smoother.reset(self.threshold_db);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_db
    }

    /// Current linear gain applied by the gate
    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    pub fn process(&mut self, input: StereoFrame) -> StereoFrame {
        let threshold = self.threshold_smoother.process(self.threshold_db);

        let peak = input.peak();
        self.envelope = if peak > self.envelope {
            peak
        } else {
            self.release * self.envelope + (1.0 - self.release) * peak
        };
        if self.envelope < SILENCE_FLOOR {
            return input * self.gain;
        }

        let target = db_to_linear(gain_reduction_db(linear_to_db(self.envelope), threshold));
        let coefficient = if target > self.gain {
            self.attack
        } else {
            self.release
        };
        self.gain = coefficient * self.gain + (1.0 - coefficient) * target;
        if self.gain < 1e-10 {
            self.gain = 0.0;
        }

        input * self.gain
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.gain = 1.0;
    }
}
