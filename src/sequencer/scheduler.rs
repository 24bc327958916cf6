// Scheduler - lookahead step sequencing against the output clock
//
// Two clocks are involved. The tick arrives late and irregularly (a thread
// waking up every few tens of milliseconds); the output clock is the audio
// frame counter. Each tick pre-commits every step whose trigger time falls
// inside `now + lookahead` and stamps its sounds with that exact time, so
// audible timing depends only on the output clock. Trigger times advance by
// exactly one step duration per step and never go backwards.
//
// A tick that arrives after several step boundaries have already passed
// (an overrun) still schedules every missed step, in order, in that same
// tick. Nothing is dropped.
//
// Channel state is only recorded once the output has accepted it. A rebuild
// or parameter update the output could not take is retried on the next tick.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::context::AudioOutput;
use crate::audio::engine::EngineResult;
use crate::audio::parameters::PeakMeter;
use crate::audio::render::Trigger;
use crate::mixer::MixerParams;
use crate::sequencer::state::{SequencerState, StateSource};
use crate::sequencer::track::TrackId;
use crate::synth::voice::VoiceSynthesizer;

/// Playhead notifications kept when nobody polls them
pub const MAX_PENDING_STEPS: usize = 256;

/// Lookahead timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far ahead of the output clock steps are committed (seconds)
    pub lookahead_sec: f64,
    /// Period of the scheduling tick
    pub tick_interval_ms: u64,
    /// Delay between `start()` and the first step
    pub start_offset_sec: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_sec: 0.1,
            tick_interval_ms: 50,
            start_offset_sec: 0.05,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// Receives the step under the playhead, `None` once playback stops
pub trait PlayheadSink: Send {
    fn on_step(&mut self, step: Option<usize>);
}

impl<F> PlayheadSink for F
where
    F: FnMut(Option<usize>) + Send,
{
    fn on_step(&mut self, step: Option<usize>) {
        self(step)
    }
}

impl PlayheadSink for mpsc::Sender<Option<usize>> {
    fn on_step(&mut self, step: Option<usize>) {
        // A dropped receiver just means nobody is watching
        let _ = self.send(step);
    }
}

pub struct Scheduler<O: AudioOutput> {
    output: O,
    state: Arc<dyn StateSource>,
    playhead: Box<dyn PlayheadSink>,
    synth: VoiceSynthesizer,
    config: SchedulerConfig,
    playback: PlaybackState,
    current_step: u64,
    next_trigger_time: f64,
    /// Track behind each output channel; None until a rebuild was delivered
    channel_tracks: Option<Vec<TrackId>>,
    /// Mixer settings the output has accepted, one per channel
    applied: Vec<MixerParams>,
    /// Playhead notifications waiting for their time: (time, step index)
    pending_steps: VecDeque<(f64, usize)>,
    overruns: u64,
    dispatched: u64,
}

impl<O: AudioOutput> Scheduler<O> {
    pub fn new(
        output: O,
        state: Arc<dyn StateSource>,
        playhead: Box<dyn PlayheadSink>,
        synth: VoiceSynthesizer,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            output,
            state,
            playhead,
            synth,
            config,
            playback: PlaybackState::Idle,
            current_step: 0,
            next_trigger_time: 0.0,
            channel_tracks: None,
            applied: Vec::new(),
            pending_steps: VecDeque::new(),
            overruns: 0,
            dispatched: 0,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    pub fn is_playing(&self) -> bool {
        self.playback == PlaybackState::Playing
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Steps scheduled since `start()`
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Time of the next step to be scheduled
    pub fn next_trigger_time(&self) -> f64 {
        self.next_trigger_time
    }

    /// Ticks that found already-passed steps
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Triggers sent to the output since creation
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn meters(&self) -> Vec<PeakMeter> {
        self.output.meters()
    }

    /// Build fresh channel graphs for the current tracks and start at step 0.
    /// Calling it while playing restarts from the top.
    pub fn start(&mut self) -> EngineResult<()> {
        let snapshot = self.state.snapshot();
        self.rebuild_channels(&snapshot);

        self.output.resume()?;

        self.pending_steps.clear();
        self.current_step = 0;
        self.next_trigger_time = self.output.current_time() + self.config.start_offset_sec;
        self.playback = PlaybackState::Playing;

        log::info!(
            "Playback started at {} BPM, {} steps, {} tracks",
            snapshot.pattern().bpm(),
            snapshot.steps_per_pattern(),
            snapshot.tracks().len()
        );

        self.schedule_ahead(&snapshot);
        Ok(())
    }

    /// Stop scheduling. Sounds already handed to the output play out;
    /// the playhead always receives `None`, even when nothing was playing.
    pub fn stop(&mut self) {
        if self.playback == PlaybackState::Playing {
            log::info!("Playback stopped after {} steps", self.current_step);
        }
        self.playback = PlaybackState::Idle;
        self.pending_steps.clear();
        self.playhead.on_step(None);
    }

    /// One scheduling pass. Returns the number of triggers dispatched.
    pub fn tick(&mut self) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let snapshot = self.state.snapshot();
        self.sync_mixer(&snapshot);
        self.schedule_ahead(&snapshot)
    }

    /// Deliver playhead notifications whose time has come
    pub fn poll_playhead(&mut self) -> usize {
        let now = self.output.current_time();
        let mut delivered = 0;
        while let Some(&(time, step)) = self.pending_steps.front() {
            if time > now {
                break;
            }
            self.pending_steps.pop_front();
            self.playhead.on_step(Some(step));
            delivered += 1;
        }
        delivered
    }

    /// Playhead notifications not yet delivered
    pub fn pending_playhead(&self) -> usize {
        self.pending_steps.len()
    }

    /// Time left until the next playhead notification is due
    pub fn until_next_playhead(&self) -> Option<Duration> {
        let &(time, _) = self.pending_steps.front()?;
        let wait = (time - self.output.current_time()).max(0.0);
        Some(Duration::from_secs_f64(wait))
    }

    /// Fresh graphs for every track. Returns false if the output refused
    /// them; the channel layout is then unknown and the next tick retries.
    fn rebuild_channels(&mut self, state: &SequencerState) -> bool {
        let tracks: Vec<TrackId> = state.tracks().iter().map(|t| t.id).collect();
        let params = state.mixer_params();
        if self.output.rebuild_channels(&params) {
            self.channel_tracks = Some(tracks);
            self.applied = params;
            true
        } else {
            log::warn!("Channel rebuild not delivered, retrying next tick");
            self.channel_tracks = None;
            false
        }
    }

    fn sync_mixer(&mut self, state: &SequencerState) {
        let same_tracks = self.channel_tracks.as_ref().is_some_and(|ids| {
            ids.len() == state.tracks().len()
                && ids.iter().zip(state.tracks()).all(|(id, t)| *id == t.id)
        });
        if !same_tracks {
            log::debug!("Track list changed, rebuilding {} channels", state.tracks().len());
            self.rebuild_channels(state);
            return;
        }

        for (channel, track) in state.tracks().iter().enumerate() {
            let params = track.mixer();
            if self.applied[channel] != params && self.output.apply_params(channel, &params) {
                self.applied[channel] = params;
            }
        }
    }

    fn schedule_ahead(&mut self, state: &SequencerState) -> usize {
        let steps = state.steps_per_pattern();
        if steps == 0 {
            return 0;
        }
        let step_duration = state.pattern().step_duration();
        let now = self.output.current_time();
        let horizon = now + self.config.lookahead_sec;

        if self.next_trigger_time + step_duration <= now {
            let late = ((now - self.next_trigger_time) / step_duration).floor() as u64;
            self.overruns += 1;
            log::warn!(
                "Scheduling overrun: {} steps already past, catching up",
                late
            );
        }

        let mut dispatched = 0;
        while self.next_trigger_time < horizon {
            let time = self.next_trigger_time;
            let step_index = (self.current_step % steps as u64) as usize;

            for (channel, track) in state.tracks().iter().enumerate() {
                if !track.is_active(step_index) {
                    continue;
                }
                if let Some(sound) = track.sound_at(&mut self.synth, time) {
                    self.output.dispatch(Trigger {
                        channel,
                        time,
                        sound,
                    });
                    dispatched += 1;
                }
            }

            if self.pending_steps.len() == MAX_PENDING_STEPS {
                self.pending_steps.pop_front();
            }
            self.pending_steps.push_back((time, step_index));
            self.next_trigger_time += step_duration;
            self.current_step += 1;
        }

        self.dispatched += dispatched as u64;
        dispatched
    }
}
