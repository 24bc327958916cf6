// Default drum kit and starter pattern

use std::path::Path;

use crate::mixer::MixerParams;
use crate::sampler::SampleDecoder;
use crate::sequencer::state::SequencerState;
use crate::sequencer::track::Track;
use crate::synth::voice::VoiceKind;

/// Track names and their fallback voices, in grid order
pub const DEFAULT_KIT: [(&str, VoiceKind); 6] = [
    ("Kick", VoiceKind::Kick),
    ("Snare", VoiceKind::Snare),
    ("Clap", VoiceKind::Clap),
    ("HiHat", VoiceKind::Hihat),
    ("OpenHat", VoiceKind::Hihat),
    ("Crash", VoiceKind::Hihat),
];

fn kit_mixer(name: &str) -> MixerParams {
    let mut params = MixerParams::track_default();
    match name {
        "Crash" => params.reverb_send = 0.35,
        "Clap" => {
            params.delay_time_sec = 0.08;
            params.delay_feedback = 0.2;
        }
        _ => {}
    }
    params
}

/// The six kit tracks with empty steps
pub fn default_tracks(steps: usize) -> Vec<Track> {
    DEFAULT_KIT
        .iter()
        .map(|(name, kind)| {
            let mut track = Track::synth(*name, *kind, steps);
            track.set_mixer(kit_mixer(name));
            track
        })
        .collect()
}

/// Kick on 0 and 8, snare on 4 and 12, closed hat every four steps from 2.
/// Steps past the end of the grid are skipped.
pub fn apply_starter_pattern(state: &mut SequencerState) {
    let steps = state.steps_per_pattern();
    if let Some(kick) = state.find_track("Kick") {
        for step in [0, 8] {
            state.set_step(kick, step, true);
        }
    }
    if let Some(snare) = state.find_track("Snare") {
        for step in [4, 12] {
            state.set_step(snare, step, true);
        }
    }
    if let Some(hat) = state.find_track("HiHat") {
        for step in (2..steps).step_by(4) {
            state.set_step(hat, step, true);
        }
    }
}

/// Default pattern, default kit and the starter beat
pub fn default_state() -> SequencerState {
    let mut state = SequencerState::default();
    for track in default_tracks(state.steps_per_pattern()) {
        state.add_track(track);
    }
    apply_starter_pattern(&mut state);
    state
}

/// Try `<dir>/<Name>.wav` for every kit track; tracks without a usable file
/// keep their voice. Returns how many samples were loaded.
pub fn load_kit_samples(
    state: &mut SequencerState,
    dir: &Path,
    decoder: &dyn SampleDecoder,
) -> usize {
    let mut loaded = 0;
    for (name, _) in DEFAULT_KIT {
        let Some(index) = state.find_track(name) else {
            continue;
        };
        let path = dir.join(format!("{name}.wav"));
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::debug!("No kit sample at {}: {}", path.display(), err);
                continue;
            }
        };
        match state.load_sample(index, decoder, &bytes, None) {
            Ok(true) => loaded += 1,
            Ok(false) => {}
            Err(err) => log::warn!("Kit sample {} unusable: {}", path.display(), err),
        }
    }
    log::info!("Loaded {} kit samples from {}", loaded, dir.display());
    loaded
}
