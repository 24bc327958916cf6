// Voice - procedural percussion and sample playback
//
// `VoiceSynthesizer` turns (voice kind, trigger time, per-hit params) into a
// `Sound`: a list of self-contained layers, each with its own source,
// absolute start/stop times and exponential amplitude envelope. Nothing in
// a `Sound` refers back to the synthesizer, so any number of them can be
// scheduled into the future without interfering.
//
// `LayerVoice` is the playback state the renderer keeps for one layer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::buffer::{AudioBuffer, StereoFrame};
use crate::audio::timing::seconds_to_frame;
use crate::synth::envelope::ExpRamp;
use crate::synth::filter::{Biquad, FilterParams};
use crate::synth::noise::NoiseGenerator;
use crate::synth::oscillator::{Oscillator, SimpleOscillator, WaveformType};

// Kick: pitch sweep and amplitude decay
const KICK_START_HZ: f32 = 150.0;
const KICK_END_HZ: f32 = 40.0;
const KICK_SWEEP_SECONDS: f64 = 0.12;
const KICK_DECAY_SECONDS: f64 = 0.18;
const KICK_LENGTH_SECONDS: f64 = 0.2;

// Snare: noise burst plus triangle body
const SNARE_NOISE_LEVEL: f32 = 0.5;
const SNARE_BODY_LEVEL: f32 = 0.3;
const SNARE_BODY_HZ: f32 = 200.0;
const SNARE_DECAY_SECONDS: f64 = 0.15;
const SNARE_LENGTH_SECONDS: f64 = 0.2;

// Clap: three staggered noise taps
const CLAP_TAP_OFFSETS: [f64; 3] = [0.0, 0.015, 0.03];
const CLAP_LEVEL: f32 = 0.6;
const CLAP_DECAY_SECONDS: f64 = 0.08;
const CLAP_LENGTH_SECONDS: f64 = 0.1;

// Hi-hat: high-passed noise
const HIHAT_CUTOFF_HZ: f32 = 7000.0;
const HIHAT_LEVEL: f32 = 0.5;
const HIHAT_DECAY_SECONDS: f64 = 0.05;
const HIHAT_LENGTH_SECONDS: f64 = 0.06;

/// Synthesized percussion voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    Kick,
    Snare,
    Clap,
    /// Fallback voice for unknown names
    #[default]
    Hihat,
}

impl VoiceKind {
    pub const ALL: [VoiceKind; 4] = [
        VoiceKind::Kick,
        VoiceKind::Snare,
        VoiceKind::Clap,
        VoiceKind::Hihat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VoiceKind::Kick => "kick",
            VoiceKind::Snare => "snare",
            VoiceKind::Clap => "clap",
            VoiceKind::Hihat => "hihat",
        }
    }

    /// Parse a voice name, falling back to the hi-hat for anything unknown
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for VoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown voice kind: {0}")]
pub struct UnknownVoiceKind(pub String);

impl FromStr for VoiceKind {
    type Err = UnknownVoiceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kick" => Ok(VoiceKind::Kick),
            "snare" => Ok(VoiceKind::Snare),
            "clap" => Ok(VoiceKind::Clap),
            "hihat" | "hat" => Ok(VoiceKind::Hihat),
            _ => Err(UnknownVoiceKind(s.to_string())),
        }
    }
}

/// Optional per-hit parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Linear level applied on top of the voice envelope
    pub level: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self { level: 1.0 }
    }
}

/// Source of one layer
#[derive(Debug, Clone)]
pub enum LayerSource {
    Tone {
        waveform: WaveformType,
        frequency: ExpRamp,
    },
    Noise {
        samples: Arc<[f32]>,
        highpass_hz: Option<f32>,
    },
    Sample {
        buffer: Arc<AudioBuffer>,
    },
}

/// One scheduled, self-contained sound component
#[derive(Debug, Clone)]
pub struct Layer {
    pub source: LayerSource,
    /// Absolute start time (seconds)
    pub start: f64,
    /// Absolute stop time (seconds)
    pub stop: f64,
    pub envelope: ExpRamp,
    pub level: f32,
}

/// Everything a single trigger produces
#[derive(Debug, Clone, Default)]
pub struct Sound {
    pub layers: Vec<Layer>,
}

impl Sound {
    /// One-shot playback of a loaded buffer at `time`
    pub fn sample(buffer: Arc<AudioBuffer>, time: f64, level: f32) -> Self {
        let stop = time + buffer.duration_seconds();
        Self {
            layers: vec![Layer {
                source: LayerSource::Sample { buffer },
                start: time,
                stop,
                envelope: ExpRamp::constant(1.0),
                level,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Earliest layer start
    pub fn start_time(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| l.start)
            .fold(f64::INFINITY, f64::min)
    }

    /// Latest layer stop
    pub fn end_time(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| l.stop)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Procedural drum synthesizer
///
/// # Example
/// ```
/// use drumseq::synth::noise::NoiseGenerator;
/// use drumseq::synth::voice::{VoiceKind, VoiceParams, VoiceSynthesizer};
///
/// let mut synth = VoiceSynthesizer::new(44100, NoiseGenerator::seeded(1));
/// let kick = synth.synthesize(VoiceKind::Kick, 1.0, &VoiceParams::default());
/// assert_eq!(kick.layers.len(), 1);
/// assert!((kick.end_time() - 1.2).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceSynthesizer {
    sample_rate: u32,
    noise: NoiseGenerator,
}

impl VoiceSynthesizer {
    pub fn new(sample_rate: u32, noise: NoiseGenerator) -> Self {
        Self { sample_rate, noise }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Build the layers of `kind` triggered at absolute `time`
    pub fn synthesize(&mut self, kind: VoiceKind, time: f64, params: &VoiceParams) -> Sound {
        let level = if params.level.is_finite() {
            params.level.max(0.0)
        } else {
            1.0
        };

        let layers = match kind {
            VoiceKind::Kick => vec![Layer {
                source: LayerSource::Tone {
                    waveform: WaveformType::Sine,
                    frequency: ExpRamp::new(
                        KICK_START_HZ,
                        KICK_END_HZ,
                        time,
                        time + KICK_SWEEP_SECONDS,
                    ),
                },
                start: time,
                stop: time + KICK_LENGTH_SECONDS,
                envelope: ExpRamp::decay(1.0, time, KICK_DECAY_SECONDS),
                level,
            }],
            VoiceKind::Snare => vec![
                Layer {
                    source: self.noise_source(SNARE_LENGTH_SECONDS, None),
                    start: time,
                    stop: time + SNARE_LENGTH_SECONDS,
                    envelope: ExpRamp::decay(SNARE_NOISE_LEVEL, time, SNARE_DECAY_SECONDS),
                    level,
                },
                Layer {
                    source: LayerSource::Tone {
                        waveform: WaveformType::Triangle,
                        frequency: ExpRamp::constant(SNARE_BODY_HZ),
                    },
                    start: time,
                    stop: time + SNARE_LENGTH_SECONDS,
                    envelope: ExpRamp::decay(SNARE_BODY_LEVEL, time, SNARE_DECAY_SECONDS),
                    level,
                },
            ],
            VoiceKind::Clap => CLAP_TAP_OFFSETS
                .iter()
                .map(|offset| {
                    let start = time + offset;
                    Layer {
                        source: self.noise_source(CLAP_LENGTH_SECONDS, None),
                        start,
                        stop: start + CLAP_LENGTH_SECONDS,
                        envelope: ExpRamp::decay(CLAP_LEVEL, start, CLAP_DECAY_SECONDS),
                        level,
                    }
                })
                .collect(),
            VoiceKind::Hihat => vec![Layer {
                source: self.noise_source(HIHAT_LENGTH_SECONDS, Some(HIHAT_CUTOFF_HZ)),
                start: time,
                stop: time + HIHAT_LENGTH_SECONDS,
                envelope: ExpRamp::decay(HIHAT_LEVEL, time, HIHAT_DECAY_SECONDS),
                level,
            }],
        };

        Sound { layers }
    }

    fn noise_source(&mut self, seconds: f64, highpass_hz: Option<f32>) -> LayerSource {
        let len = (seconds * self.sample_rate as f64).ceil() as usize + 1;
        LayerSource::Noise {
            samples: self.noise.buffer(len).into(),
            highpass_hz,
        }
    }
}

enum SourceState {
    Tone {
        oscillator: SimpleOscillator,
        frequency: ExpRamp,
    },
    Noise {
        samples: Arc<[f32]>,
        filter: Option<Biquad>,
        position: usize,
    },
    Sample {
        buffer: Arc<AudioBuffer>,
        position: f64,
        step: f64,
    },
}

impl SourceState {
    #[inline]
    fn next(&mut self, time: f64) -> Option<StereoFrame> {
        match self {
            SourceState::Tone {
                oscillator,
                frequency,
            } => {
                oscillator.set_frequency(frequency.value_at(time));
                Some(StereoFrame::mono(oscillator.next_sample()))
            }
            SourceState::Noise {
                samples,
                filter,
                position,
            } => {
                let raw = *samples.get(*position)?;
                *position += 1;
                let value = match filter {
                    Some(filter) => filter.process(raw),
                    None => raw,
                };
                Some(StereoFrame::mono(value))
            }
            SourceState::Sample {
                buffer,
                position,
                step,
            } => {
                let index = position.floor() as usize;
                if index >= buffer.frames() {
                    return None;
                }
                let frac = (*position - index as f64) as f32;
                let a = buffer.stereo_frame(index);
                let value = if frac > 0.0 {
                    a * (1.0 - frac) + buffer.stereo_frame(index + 1) * frac
                } else {
                    a
                };
                *position += *step;
                Some(value)
            }
        }
    }
}

/// Playback state of one layer inside the renderer
pub struct LayerVoice {
    start_frame: u64,
    stop_frame: u64,
    envelope: ExpRamp,
    level: f32,
    source: SourceState,
}

impl LayerVoice {
    pub fn new(layer: Layer, sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        let source = match layer.source {
            LayerSource::Tone {
                waveform,
                frequency,
            } => SourceState::Tone {
                oscillator: SimpleOscillator::new(waveform, sample_rate as f32),
                frequency,
            },
            LayerSource::Noise {
                samples,
                highpass_hz,
            } => SourceState::Noise {
                samples,
                filter: highpass_hz
                    .map(|hz| Biquad::new(FilterParams::highpass(hz), sample_rate as f32)),
                position: 0,
            },
            LayerSource::Sample { buffer } => {
                // Rate compensation only, no pitch change
                let step = if buffer.sample_rate() > 0 {
                    buffer.sample_rate() as f64 / rate
                } else {
                    1.0
                };
                SourceState::Sample {
                    buffer,
                    position: 0.0,
                    step,
                }
            }
        };

        Self {
            start_frame: seconds_to_frame(layer.start, rate),
            stop_frame: seconds_to_frame(layer.stop, rate),
            envelope: layer.envelope,
            level: layer.level,
            source,
        }
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn stop_frame(&self) -> u64 {
        self.stop_frame
    }

    /// Mix this layer into `out`, whose first element is absolute frame
    /// `base`. Returns false once the layer has finished.
    pub fn render_into(&mut self, out: &mut [StereoFrame], base: u64, sample_rate: f64) -> bool {
        let end = base + out.len() as u64;
        if end <= self.start_frame {
            return true;
        }

        let first = self.start_frame.saturating_sub(base) as usize;
        for (offset, slot) in out.iter_mut().enumerate().skip(first) {
            let frame = base + offset as u64;
            if frame >= self.stop_frame {
                return false;
            }
            let time = frame as f64 / sample_rate;
            let Some(value) = self.source.next(time) else {
                return false;
            };
            *slot += value * (self.envelope.value_at(time) * self.level);
        }

        end < self.stop_frame
    }
}
