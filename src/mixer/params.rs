// Mixer parameters - per-track effect settings and their domains

use serde::{Deserialize, Serialize};

use crate::audio::dsp_utils::clamp_param;

pub const MAX_DELAY_TIME_SEC: f32 = 1.0;
pub const MAX_DELAY_FEEDBACK: f32 = 0.95;
pub const MIN_CUTOFF_HZ: f32 = 50.0;
pub const MAX_CUTOFF_HZ: f32 = 22050.0;
pub const MIN_GATE_DB: f32 = -100.0;
pub const MAX_GATE_DB: f32 = 0.0;

/// Effect settings of one track
///
/// Every field can change at any time. Values are clamped to their domain
/// with `clamped()` before they reach a channel graph; non-finite input
/// falls back to the default of that field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MixerParams {
    /// Track gain [0, 1]
    pub volume: f32,
    /// Echo time in seconds [0, 1]
    pub delay_time_sec: f32,
    /// Echo feedback [0, 0.95]
    pub delay_feedback: f32,
    /// Reverb send level [0, 1]
    pub reverb_send: f32,
    /// Waveshaper drive [0, 1]
    pub distortion_drive: f32,
    /// Lowpass cutoff in Hz [50, 22050]
    pub lowpass_cutoff_hz: f32,
    /// Gate threshold in dB [-100, 0]
    pub noise_gate_threshold_db: f32,
}

impl Default for MixerParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            delay_time_sec: 0.0,
            delay_feedback: 0.0,
            reverb_send: 0.0,
            distortion_drive: 0.0,
            lowpass_cutoff_hz: MAX_CUTOFF_HZ,
            noise_gate_threshold_db: MIN_GATE_DB,
        }
    }
}

impl MixerParams {
    /// Copy with every field clamped into its domain
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            volume: clamp_param(self.volume, 0.0, 1.0, d.volume),
            delay_time_sec: clamp_param(self.delay_time_sec, 0.0, MAX_DELAY_TIME_SEC, d.delay_time_sec),
            delay_feedback: clamp_param(
                self.delay_feedback,
                0.0,
                MAX_DELAY_FEEDBACK,
                d.delay_feedback,
            ),
            reverb_send: clamp_param(self.reverb_send, 0.0, 1.0, d.reverb_send),
            distortion_drive: clamp_param(self.distortion_drive, 0.0, 1.0, d.distortion_drive),
            lowpass_cutoff_hz: clamp_param(
                self.lowpass_cutoff_hz,
                MIN_CUTOFF_HZ,
                MAX_CUTOFF_HZ,
                d.lowpass_cutoff_hz,
            ),
            noise_gate_threshold_db: clamp_param(
                self.noise_gate_threshold_db,
                MIN_GATE_DB,
                MAX_GATE_DB,
                d.noise_gate_threshold_db,
            ),
        }
    }

    /// Settings the default kit and uploaded tracks start with
    pub fn track_default() -> Self {
        Self {
            volume: 0.8,
            reverb_send: 0.1,
            ..Self::default()
        }
    }
}
