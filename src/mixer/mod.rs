// Mixer - per-track channel graphs summed into the master bus

pub mod channel;
pub mod params;

pub use channel::ChannelGraph;
pub use params::MixerParams;

use std::sync::Arc;

use crate::audio::buffer::StereoFrame;
use crate::audio::parameters::PeakMeter;
use crate::synth::reverb::ImpulseResponse;

/// Set of channel graphs owned by one rendering context
///
/// All channels share the context's impulse response. The channel set is
/// replaced as a whole when the track list changes shape; parameters are
/// updated in place.
pub struct Mixer {
    sample_rate: u32,
    impulse: Arc<ImpulseResponse>,
    channels: Vec<ChannelGraph>,
    master_gain: f32,
    master_meter: PeakMeter,
}

impl Mixer {
    pub fn new(sample_rate: u32, impulse: Arc<ImpulseResponse>) -> Self {
        Self {
            sample_rate,
            impulse,
            channels: Vec::new(),
            master_gain: 1.0,
            master_meter: PeakMeter::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn impulse(&self) -> &Arc<ImpulseResponse> {
        &self.impulse
    }

    /// Build a channel graph bound to this mixer's impulse response
    pub fn create_channel(&self, params: &MixerParams) -> ChannelGraph {
        ChannelGraph::new(self.sample_rate, self.impulse.clone(), params)
    }

    /// Replace the channel set with one fresh graph per entry of `params`
    pub fn rebuild(&mut self, params: &[MixerParams]) {
        let channels = params.iter().map(|p| self.create_channel(p)).collect();
        self.channels = channels;
    }

    /// Install graphs built elsewhere, returning the previous set
    pub fn set_channels(&mut self, channels: Vec<ChannelGraph>) -> Vec<ChannelGraph> {
        std::mem::replace(&mut self.channels, channels)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelGraph> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut ChannelGraph> {
        self.channels.get_mut(index)
    }

    /// Smoothly retarget the parameters of one channel. Unknown indices are
    /// ignored.
    pub fn apply_params(&mut self, index: usize, params: &MixerParams) {
        if let Some(channel) = self.channels.get_mut(index) {
            channel.apply_params(params);
        }
    }

    pub fn meters(&self) -> Vec<PeakMeter> {
        self.channels.iter().map(ChannelGraph::meter).collect()
    }

    pub fn master_meter(&self) -> PeakMeter {
        self.master_meter.clone()
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        if gain.is_finite() {
            self.master_gain = gain.max(0.0);
        }
    }

    pub fn clear_inputs(&mut self) {
        for channel in &mut self.channels {
            channel.clear_input();
        }
    }

    /// Run every channel over its input block and write the master sum
    pub fn process(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::SILENCE);
        for channel in &mut self.channels {
            channel.process_block(out);
        }

        let mut peak = 0.0f32;
        for frame in out.iter_mut() {
            *frame = *frame * self.master_gain;
            peak = peak.max(frame.peak());
        }
        self.master_meter.update(peak);
    }
}
