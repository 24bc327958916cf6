// Renderer - the rendering context shared by live playback and export
//
// Audio is produced in fixed render quanta of RENDER_QUANTUM frames. Before
// each quantum, every pending layer whose start falls inside it is moved
// from the time-ordered queue into the active set; active layers are mixed
// into their channel inputs, then the mixer runs the channel graphs.
//
// Events are ordered by their absolute start frame, whatever order they
// were scheduled in. An event whose time has already passed starts at the
// beginning of the next quantum.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::audio::buffer::StereoFrame;
use crate::audio::timing::seconds_to_frame;
use crate::mixer::{ChannelGraph, Mixer, MixerParams};
use crate::synth::voice::{Layer, LayerVoice, Sound};

/// Frames per render quantum
pub const RENDER_QUANTUM: usize = 128;

/// Layers that can wait in the queue before it has to grow
pub const QUEUED_LAYERS_CAPACITY: usize = 1024;

/// Layers that can sound at once before the active set has to grow
pub const ACTIVE_LAYERS_CAPACITY: usize = 256;

/// A sound aimed at one channel
#[derive(Debug, Clone)]
pub struct Trigger {
    pub channel: usize,
    /// Absolute context time in seconds
    pub time: f64,
    pub sound: Sound,
}

struct PendingLayer {
    start_frame: u64,
    sequence: u64,
    channel: usize,
    layer: Layer,
}

impl PartialEq for PendingLayer {
    fn eq(&self, other: &Self) -> bool {
        self.start_frame == other.start_frame && self.sequence == other.sequence
    }
}

impl Eq for PendingLayer {}

impl PartialOrd for PendingLayer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingLayer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start_frame, self.sequence).cmp(&(other.start_frame, other.sequence))
    }
}

struct ActiveLayer {
    channel: usize,
    voice: LayerVoice,
}

pub struct Renderer {
    sample_rate: u32,
    mixer: Mixer,
    queue: BinaryHeap<Reverse<PendingLayer>>,
    active: Vec<ActiveLayer>,
    sequence: u64,
    /// Frames produced by the mixer so far (multiple of RENDER_QUANTUM)
    frames_rendered: u64,
    /// Frames handed out through `render`
    frames_delivered: u64,
    block: Vec<StereoFrame>,
    block_pos: usize,
}

impl Renderer {
    pub fn new(mixer: Mixer) -> Self {
        Self {
            sample_rate: mixer.sample_rate(),
            mixer,
            queue: BinaryHeap::with_capacity(QUEUED_LAYERS_CAPACITY),
            active: Vec::with_capacity(ACTIVE_LAYERS_CAPACITY),
            sequence: 0,
            frames_rendered: 0,
            frames_delivered: 0,
            block: vec![StereoFrame::SILENCE; RENDER_QUANTUM],
            block_pos: RENDER_QUANTUM,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Context time of the next frame `render` will hand out
    pub fn current_time(&self) -> f64 {
        self.frames_delivered as f64 / self.sample_rate as f64
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    /// Number of layers waiting for their start time
    pub fn pending_layers(&self) -> usize {
        self.queue.len()
    }

    /// Number of layers currently sounding
    pub fn active_layers(&self) -> usize {
        self.active.len()
    }

    /// Queue every layer of a trigger
    pub fn schedule(&mut self, trigger: Trigger) {
        let rate = self.sample_rate as f64;
        for layer in trigger.sound.layers {
            let start_frame = seconds_to_frame(layer.start, rate);
            self.sequence += 1;
            self.queue.push(Reverse(PendingLayer {
                start_frame,
                sequence: self.sequence,
                channel: trigger.channel,
                layer,
            }));
        }
    }

    /// Swap in a new channel set. Sounds already playing keep their channel
    /// index; those pointing past the new set are dropped.
    pub fn replace_channels(&mut self, channels: Vec<ChannelGraph>) -> Vec<ChannelGraph> {
        let old = self.mixer.set_channels(channels);
        let count = self.mixer.channel_count();
        self.active.retain(|layer| layer.channel < count);
        old
    }

    /// Rebuild the channel set from parameters (immediate values)
    pub fn rebuild_channels(&mut self, params: &[MixerParams]) {
        self.mixer.rebuild(params);
        let count = self.mixer.channel_count();
        self.active.retain(|layer| layer.channel < count);
    }

    pub fn apply_params(&mut self, channel: usize, params: &MixerParams) {
        self.mixer.apply_params(channel, params);
    }

    /// Fill `out` with the next frames of the context
    pub fn render(&mut self, out: &mut [StereoFrame]) {
        let mut written = 0;
        while written < out.len() {
            if self.block_pos >= RENDER_QUANTUM {
                self.render_quantum();
                self.block_pos = 0;
            }
            let available = RENDER_QUANTUM - self.block_pos;
            let count = available.min(out.len() - written);
            out[written..written + count]
                .copy_from_slice(&self.block[self.block_pos..self.block_pos + count]);
            self.block_pos += count;
            written += count;
        }
        self.frames_delivered += out.len() as u64;
    }

    fn render_quantum(&mut self) {
        let base = self.frames_rendered;
        let end = base + RENDER_QUANTUM as u64;
        let sample_rate = self.sample_rate;

        while let Some(Reverse(pending)) = self.queue.peek() {
            if pending.start_frame >= end {
                break;
            }
            if let Some(Reverse(pending)) = self.queue.pop() {
                self.active.push(ActiveLayer {
                    channel: pending.channel,
                    voice: LayerVoice::new(pending.layer, sample_rate),
                });
            }
        }

        self.mixer.clear_inputs();
        let rate = sample_rate as f64;
        let mixer = &mut self.mixer;
        self.active.retain_mut(|layer| match mixer.channel_mut(layer.channel) {
            Some(channel) => layer.voice.render_into(channel.input_mut(), base, rate),
            None => false,
        });

        self.mixer.process(&mut self.block);
        self.frames_rendered = end;
    }
}
