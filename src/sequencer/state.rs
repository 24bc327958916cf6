// Sequencer state - the pattern plus its tracks
//
// Every mutation keeps the grid consistent: all step arrays have exactly
// `steps_per_pattern` entries, and mixer settings are stored clamped.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::audio::buffer::AudioBuffer;
use crate::mixer::MixerParams;
use crate::sampler::{DecodeError, SampleDecoder};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::timeline::TimeSignature;
use crate::sequencer::track::{Track, TrackId};

#[derive(Debug, Clone, Default)]
pub struct SequencerState {
    pattern: Pattern,
    tracks: Vec<Track>,
}

impl SequencerState {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            tracks: Vec::new(),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn steps_per_pattern(&self) -> usize {
        self.pattern.steps_per_pattern()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Index of the first track called `name`
    pub fn find_track(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.name == name)
    }

    /// Mixer settings of every track, in track order
    pub fn mixer_params(&self) -> Vec<MixerParams> {
        self.tracks.iter().map(Track::mixer).collect()
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.pattern.set_bpm(bpm);
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.pattern.set_time_signature(time_signature);
        self.resize_tracks();
    }

    pub fn set_steps_per_beat(&mut self, steps_per_beat: u32) {
        self.pattern.set_steps_per_beat(steps_per_beat);
        self.resize_tracks();
    }

    /// Flip one step; None if the track or step does not exist
    pub fn toggle_step(&mut self, track: usize, step: usize) -> Option<bool> {
        self.tracks.get_mut(track)?.toggle_step(step)
    }

    pub fn set_step(&mut self, track: usize, step: usize, active: bool) -> bool {
        self.tracks
            .get_mut(track)
            .is_some_and(|t| t.set_step(step, active))
    }

    /// Turn off every step of every track
    pub fn clear_pattern(&mut self) {
        for track in &mut self.tracks {
            track.clear_steps();
        }
    }

    /// Append a track, fitting its steps to the grid. Returns its index.
    pub fn add_track(&mut self, mut track: Track) -> usize {
        track.resize(self.steps_per_pattern());
        track.set_mixer(track.mixer());
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Append an uploaded sample as a new track
    pub fn add_sample_track(&mut self, name: impl Into<String>, buffer: AudioBuffer) -> usize {
        let track = Track::sample(name, Arc::new(buffer), self.steps_per_pattern());
        self.add_track(track)
    }

    /// Decode a file and append it as a track named after the file stem
    pub fn add_sample_file(
        &mut self,
        path: &Path,
        decoder: &dyn SampleDecoder,
    ) -> Result<usize, DecodeError> {
        let bytes = std::fs::read(path)?;
        let buffer = decoder.decode(&bytes)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sample".to_string());
        log::info!("Added sample track '{}' ({} frames)", name, buffer.frames());
        Ok(self.add_sample_track(name, buffer))
    }

    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        (index < self.tracks.len()).then(|| self.tracks.remove(index))
    }

    pub fn rename_track(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.tracks.get_mut(index) {
            Some(track) => {
                track.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Store clamped mixer settings for one track
    pub fn set_mixer_params(&mut self, index: usize, params: MixerParams) -> bool {
        match self.tracks.get_mut(index) {
            Some(track) => {
                track.set_mixer(params);
                true
            }
            None => false,
        }
    }

    /// Decode `bytes` into the track's sample slot.
    ///
    /// On success the track plays the sample and, when `name` is given, is
    /// renamed. On failure it falls back to its synth voice (or silence) and
    /// the error is returned. `Ok(false)` means there is no such track.
    pub fn load_sample(
        &mut self,
        index: usize,
        decoder: &dyn SampleDecoder,
        bytes: &[u8],
        name: Option<&str>,
    ) -> Result<bool, DecodeError> {
        let Some(track) = self.tracks.get_mut(index) else {
            return Ok(false);
        };
        match decoder.decode(bytes) {
            Ok(buffer) => {
                track.load_buffer(Arc::new(buffer));
                if let Some(name) = name {
                    track.name = name.to_string();
                }
                Ok(true)
            }
            Err(err) => {
                log::warn!("Could not decode sample for '{}': {}", track.name, err);
                track.fall_back();
                Err(err)
            }
        }
    }

    fn resize_tracks(&mut self) {
        let len = self.steps_per_pattern();
        for track in &mut self.tracks {
            track.resize(len);
        }
    }
}

/// Where the scheduler reads the current pattern and tracks from
pub trait StateSource: Send + Sync {
    fn snapshot(&self) -> SequencerState;
}

impl<F> StateSource for F
where
    F: Fn() -> SequencerState + Send + Sync,
{
    fn snapshot(&self) -> SequencerState {
        self()
    }
}

/// State shared between a controller and the scheduler
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<RwLock<SequencerState>>);

impl SharedState {
    pub fn new(state: SequencerState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SequencerState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SequencerState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access
    pub fn update<R>(&self, f: impl FnOnce(&mut SequencerState) -> R) -> R {
        f(&mut self.write())
    }
}

impl StateSource for SharedState {
    fn snapshot(&self) -> SequencerState {
        self.read().clone()
    }
}
