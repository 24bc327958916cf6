// Track - one row of the step grid with its sound source and mixer settings

use std::sync::Arc;

use uuid::Uuid;

use crate::audio::buffer::AudioBuffer;
use crate::mixer::MixerParams;
use crate::synth::voice::{Sound, VoiceKind, VoiceParams, VoiceSynthesizer};

pub type TrackId = Uuid;

/// What a track plays when one of its steps fires
#[derive(Debug, Clone)]
pub enum Source {
    /// Decoded audio, played back as a one-shot
    Sample(Arc<AudioBuffer>),
    /// Procedural voice
    Synth(VoiceKind),
    /// Nothing to play (sample failed to load and no voice configured)
    Silent,
}

impl Source {
    /// Short label for display: "sample", the voice name, or "silent"
    pub fn label(&self) -> &'static str {
        match self {
            Source::Sample(_) => "sample",
            Source::Synth(kind) => kind.name(),
            Source::Silent => "silent",
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self, Source::Sample(_))
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub source: Source,
    /// Voice used when no sample is loaded
    pub voice: Option<VoiceKind>,
    pub voice_params: VoiceParams,
    steps: Vec<bool>,
    mixer: MixerParams,
}

impl Track {
    /// A synth track with the default channel settings
    pub fn synth(name: impl Into<String>, kind: VoiceKind, steps: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source: Source::Synth(kind),
            voice: Some(kind),
            voice_params: VoiceParams::default(),
            steps: vec![false; steps],
            mixer: MixerParams::track_default(),
        }
    }

    /// A sample track without a fallback voice
    pub fn sample(name: impl Into<String>, buffer: Arc<AudioBuffer>, steps: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source: Source::Sample(buffer),
            voice: None,
            voice_params: VoiceParams::default(),
            steps: vec![false; steps],
            mixer: MixerParams::track_default(),
        }
    }

    pub fn steps(&self) -> &[bool] {
        &self.steps
    }

    /// Steps past the end of the grid are never active
    pub fn is_active(&self, step: usize) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    /// Returns false when `step` is outside the grid
    pub fn set_step(&mut self, step: usize, active: bool) -> bool {
        match self.steps.get_mut(step) {
            Some(slot) => {
                *slot = active;
                true
            }
            None => false,
        }
    }

    /// Flip a step, returning its new value
    pub fn toggle_step(&mut self, step: usize) -> Option<bool> {
        let slot = self.steps.get_mut(step)?;
        *slot = !*slot;
        Some(*slot)
    }

    pub fn clear_steps(&mut self) {
        self.steps.fill(false);
    }

    /// Keep existing flags by index, fill new slots with false
    pub fn resize(&mut self, len: usize) {
        self.steps.resize(len, false);
    }

    pub fn mixer(&self) -> MixerParams {
        self.mixer
    }

    /// Stores the clamped version of `params`
    pub fn set_mixer(&mut self, params: MixerParams) {
        self.mixer = params.clamped();
    }

    pub fn load_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        self.source = Source::Sample(buffer);
    }

    /// Go back to the configured voice, or silence when there is none
    pub fn fall_back(&mut self) {
        self.source = match self.voice {
            Some(kind) => Source::Synth(kind),
            None => Source::Silent,
        };
    }

    /// The sound this track makes when triggered at `time`
    pub fn sound_at(&self, synth: &mut VoiceSynthesizer, time: f64) -> Option<Sound> {
        match &self.source {
            Source::Sample(buffer) => Some(Sound::sample(
                Arc::clone(buffer),
                time,
                self.voice_params.level,
            )),
            Source::Synth(kind) => Some(synth.synthesize(*kind, time, &self.voice_params)),
            Source::Silent => None,
        }
    }
}
