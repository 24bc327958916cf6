//! Lookahead scheduling against a controllable output clock

use std::sync::{Arc, Mutex, mpsc};

use drumseq::audio::context::{AudioOutput, HeadlessOutput};
use drumseq::audio::engine::EngineResult;
use drumseq::audio::render::Trigger;
use drumseq::mixer::MixerParams;
use drumseq::sequencer::{Scheduler, SchedulerConfig, SequencerState, SharedState, Track, kit};
use drumseq::synth::noise::NoiseGenerator;
use drumseq::synth::reverb::ImpulseResponse;
use drumseq::synth::voice::{VoiceKind, VoiceSynthesizer};

#[derive(Default)]
struct Clock {
    now: f64,
    triggers: Vec<(usize, f64)>,
}

/// Output whose clock only moves when the test says so
#[derive(Clone, Default)]
struct ManualOutput(Arc<Mutex<Clock>>);

impl ManualOutput {
    fn advance(&self, seconds: f64) {
        self.0.lock().unwrap().now += seconds;
    }

    fn triggers(&self) -> Vec<(usize, f64)> {
        self.0.lock().unwrap().triggers.clone()
    }
}

impl AudioOutput for ManualOutput {
    fn sample_rate(&self) -> u32 {
        44100
    }

    fn current_time(&self) -> f64 {
        self.0.lock().unwrap().now
    }

    fn resume(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn rebuild_channels(&mut self, _params: &[MixerParams]) -> bool {
        true
    }

    fn apply_params(&mut self, _channel: usize, _params: &MixerParams) -> bool {
        true
    }

    fn dispatch(&mut self, trigger: Trigger) {
        self.0
            .lock()
            .unwrap()
            .triggers
            .push((trigger.channel, trigger.time));
    }
}

fn every_step_state() -> SharedState {
    let mut state = SequencerState::default();
    let hat = state.add_track(Track::synth("HiHat", VoiceKind::Hihat, 16));
    for step in 0..16 {
        state.set_step(hat, step, true);
    }
    SharedState::new(state)
}

fn scheduler<O: AudioOutput>(
    output: O,
    state: SharedState,
    playhead: mpsc::Sender<Option<usize>>,
) -> Scheduler<O> {
    Scheduler::new(
        output,
        Arc::new(state),
        Box::new(playhead),
        VoiceSynthesizer::new(44100, NoiseGenerator::seeded(9)),
        SchedulerConfig::default(),
    )
}

#[test]
fn test_trigger_times_follow_step_grid_under_jittery_ticks() {
    let output = ManualOutput::default();
    let (tx, _rx) = mpsc::channel();
    let mut scheduler = scheduler(output.clone(), every_step_state(), tx);

    scheduler.start().unwrap();
    let t0 = 0.05;

    // Irregular tick spacing, including one late tick
    let gaps = [0.03, 0.07, 0.02, 0.05, 0.5, 0.04, 0.06, 0.05, 0.01, 0.08];
    for _ in 0..6 {
        for gap in gaps {
            output.advance(gap);
            scheduler.tick();
        }
    }

    // Clock ends at 6 x 0.98 = 5.88 s, horizon 5.98 s: steps 0..=47
    let times: Vec<f64> = output.triggers().iter().map(|&(_, t)| t).collect();
    assert_eq!(times.len(), 48);
    for (k, time) in times.iter().enumerate() {
        let expected = t0 + k as f64 * 0.125;
        assert!(
            (time - expected).abs() < 1e-9,
            "step {k}: {time} != {expected}"
        );
    }
    assert!(scheduler.overruns() > 0);
}

#[test]
fn test_every_committed_step_is_within_lookahead() {
    let output = ManualOutput::default();
    let (tx, _rx) = mpsc::channel();
    let mut scheduler = scheduler(output.clone(), every_step_state(), tx);
    scheduler.start().unwrap();

    for _ in 0..100 {
        output.advance(0.05);
        let before = output.triggers().len();
        scheduler.tick();
        let now = output.current_time();
        for &(_, time) in &output.triggers()[before..] {
            assert!(time < now + 0.1 + 1e-9);
        }
        assert!(scheduler.next_trigger_time() >= now + 0.1 - 1e-9);
    }
}

#[test]
fn test_stop_without_start() {
    let output = ManualOutput::default();
    let (tx, rx) = mpsc::channel();
    let mut scheduler = scheduler(output.clone(), every_step_state(), tx);

    scheduler.stop();
    assert_eq!(rx.try_recv().unwrap(), None);
    assert_eq!(scheduler.tick(), 0);
    assert!(output.triggers().is_empty());
}

#[test]
fn test_headless_playback_produces_audio_and_playhead() {
    let mut noise = NoiseGenerator::seeded(5);
    let impulse = Arc::new(ImpulseResponse::generate(44100, 0.2, 0.5, &mut noise));
    let output = HeadlessOutput::new(44100, impulse);
    let (tx, rx) = mpsc::channel();
    let mut scheduler = scheduler(output, SharedState::new(kit::default_state()), tx);

    scheduler.start().unwrap();
    let mut peak = 0.0f32;
    // 2.5 s in 25 ms slices, ticking after each slice
    for _ in 0..100 {
        let frames = scheduler.output_mut().render_seconds(0.025);
        peak = frames.iter().fold(peak, |m, f| m.max(f.peak()));
        scheduler.tick();
        scheduler.poll_playhead();
    }
    scheduler.stop();

    assert!(peak > 0.1, "nothing audible: {peak}");

    let steps: Vec<Option<usize>> = rx.try_iter().collect();
    assert_eq!(steps.last(), Some(&None));
    let played: Vec<usize> = steps.iter().flatten().copied().collect();
    assert!(played.len() >= 18);
    for (k, step) in played.iter().enumerate() {
        assert_eq!(*step, k % 16);
    }
}
