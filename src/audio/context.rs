// Audio output seam - the clock and dispatch surface the scheduler drives
//
// The scheduler never touches the audio thread directly. It reads the
// output clock, pushes triggers stamped with absolute times and keeps the
// channel graph set in sync with the track list. `RealtimeOutput` forwards
// all of that to the cpal callback; `HeadlessOutput` renders in-process,
// which is what tests and benchmarks use.

use std::sync::Arc;

use crate::audio::buffer::StereoFrame;
use crate::audio::engine::EngineResult;
use crate::audio::parameters::PeakMeter;
use crate::audio::render::{Renderer, Trigger};
use crate::mixer::{Mixer, MixerParams};
use crate::synth::reverb::ImpulseResponse;

pub trait AudioOutput: Send {
    fn sample_rate(&self) -> u32;

    /// Time in seconds of the next frame the output will produce
    fn current_time(&self) -> f64;

    /// Make sure audio is flowing. May block briefly on first start.
    fn resume(&mut self) -> EngineResult<()>;

    /// Replace every channel graph: one per entry, parameters applied
    /// without smoothing. Returns false if the output could not take the
    /// new set, in which case the old one stays in place.
    fn rebuild_channels(&mut self, params: &[MixerParams]) -> bool;

    /// Update one channel in place (smoothed). Returns false if the update
    /// was not delivered.
    fn apply_params(&mut self, channel: usize, params: &MixerParams) -> bool;

    /// Queue a sound at its absolute time
    fn dispatch(&mut self, trigger: Trigger);

    /// Per-channel level meters of the current graph set
    fn meters(&self) -> Vec<PeakMeter> {
        Vec::new()
    }
}

/// Renders in the calling thread; the clock only moves when `render` is called
pub struct HeadlessOutput {
    renderer: Renderer,
    resumed: bool,
}

impl HeadlessOutput {
    pub fn new(sample_rate: u32, impulse: Arc<ImpulseResponse>) -> Self {
        Self {
            renderer: Renderer::new(Mixer::new(sample_rate, impulse)),
            resumed: false,
        }
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Produce the next frames and advance the clock
    pub fn render(&mut self, out: &mut [StereoFrame]) {
        self.renderer.render(out);
    }

    /// Produce `seconds` worth of audio
    pub fn render_seconds(&mut self, seconds: f64) -> Vec<StereoFrame> {
        let frames = (seconds.max(0.0) * self.renderer.sample_rate() as f64).round() as usize;
        let mut out = vec![StereoFrame::SILENCE; frames];
        self.renderer.render(&mut out);
        out
    }
}

impl AudioOutput for HeadlessOutput {
    fn sample_rate(&self) -> u32 {
        self.renderer.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.renderer.current_time()
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.resumed = true;
        Ok(())
    }

    fn rebuild_channels(&mut self, params: &[MixerParams]) -> bool {
        self.renderer.rebuild_channels(params);
        true
    }

    fn apply_params(&mut self, channel: usize, params: &MixerParams) -> bool {
        self.renderer.apply_params(channel, params);
        true
    }

    fn dispatch(&mut self, trigger: Trigger) {
        self.renderer.schedule(trigger);
    }

    fn meters(&self) -> Vec<PeakMeter> {
        self.renderer.mixer().meters()
    }
}
