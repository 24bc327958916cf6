//! Offline export: WAV container layout, determinism and transient timing

use std::io::Cursor;

use drumseq::audio::export::{ExportSettings, PatternExporter};
use drumseq::audio::wav::{WAV_HEADER_LEN, WavHeader, pcm16_samples};
use drumseq::config::ReverbConfig;
use drumseq::sequencer::{SequencerState, Track, kit};
use drumseq::synth::voice::VoiceKind;

const SAMPLE_RATE: usize = 44100;

fn exporter(seed: u64) -> PatternExporter {
    PatternExporter::new(ExportSettings {
        noise_seed: Some(seed),
        ..ExportSettings::default()
    })
    .with_reverb(ReverbConfig {
        seconds: 0.3,
        decay: 0.5,
    })
}

fn kick_on(steps: &[usize]) -> SequencerState {
    let mut state = SequencerState::default();
    let kick = state.add_track(Track::synth("Kick", VoiceKind::Kick, 16));
    for &step in steps {
        state.set_step(kick, step, true);
    }
    state
}

fn window_peak(samples: &[f32], from_sec: f64, to_sec: f64) -> f32 {
    let from = (from_sec * SAMPLE_RATE as f64) as usize;
    let to = ((to_sec * SAMPLE_RATE as f64) as usize).min(samples.len());
    samples[from..to].iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

fn first_onset_after(samples: &[f32], from_sec: f64, threshold: f32) -> Option<f64> {
    let from = (from_sec * SAMPLE_RATE as f64) as usize;
    samples[from..]
        .iter()
        .position(|s| s.abs() > threshold)
        .map(|i| (from + i) as f64 / SAMPLE_RATE as f64)
}

#[test]
fn test_wav_is_readable_by_hound() {
    let bytes = exporter(1)
        .export_wav_bytes(&kit::default_state(), None)
        .unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    let raw: Vec<i16> = pcm16_samples(&bytes).collect();
    assert_eq!(decoded.len(), 3 * SAMPLE_RATE * 2);
    assert_eq!(decoded, raw);
}

#[test]
fn test_header_matches_frame_count() {
    let bytes = exporter(2)
        .export_wav_bytes(&kit::default_state(), None)
        .unwrap();
    let header = WavHeader::parse(&bytes).unwrap();
    let frames = 3 * SAMPLE_RATE as u32;

    assert_eq!(header.format, 1);
    assert_eq!(header.channels, 2);
    assert_eq!(header.block_align, 4);
    assert_eq!(header.byte_rate, 44100 * 4);
    assert_eq!(header.data_size, frames * 4);
    assert_eq!(header.riff_size, 36 + frames * 4);
    assert_eq!(bytes.len(), WAV_HEADER_LEN + (frames * 4) as usize);
}

#[test]
fn test_same_seed_same_bytes() {
    let state = kit::default_state();
    let first = exporter(7).export_wav_bytes(&state, None).unwrap();
    let second = exporter(7).export_wav_bytes(&state, None).unwrap();
    assert!(first == second, "seeded exports differ");

    let other = exporter(8).export_wav_bytes(&state, None).unwrap();
    assert_eq!(first.len(), other.len());
    assert!(first != other, "noise seed has no effect");
}

#[test]
fn test_kick_transients_at_step_times() {
    // 120 BPM, 4 steps per beat: step 8 is exactly one second in
    let buffer = exporter(3).render_pattern(&kick_on(&[0, 8]), None).unwrap();
    let left = buffer.channel(0).unwrap();

    let first = window_peak(left, 0.0, 0.05);
    let second = window_peak(left, 1.0, 1.05);
    assert!(first > 0.2, "no transient at 0 s: {first}");
    assert!(second > 0.2, "no transient at 1 s: {second}");
    assert!((first - second).abs() < first * 0.1);

    // Quiet once the reverb tail has died out
    assert!(window_peak(left, 0.85, 0.99) < first * 0.1);

    let onset = first_onset_after(left, 0.85, 0.05).unwrap();
    assert!((onset - 1.0).abs() < 0.003, "second onset at {onset}");
    let onset = first_onset_after(left, 0.0, 0.05).unwrap();
    assert!(onset < 0.003, "first onset at {onset}");
}

#[test]
fn test_tempo_moves_transients() {
    let mut state = kick_on(&[0, 8]);
    state.set_bpm(60);
    let buffer = exporter(4).render_pattern(&state, None).unwrap();
    let left = buffer.channel(0).unwrap();

    // One bar at 60 BPM is 4 s, step 8 lands at 2 s
    assert_eq!(buffer.frames(), 5 * SAMPLE_RATE);
    let onset = first_onset_after(left, 1.5, 0.05).unwrap();
    assert!((onset - 2.0).abs() < 0.003, "onset at {onset}");
}

#[test]
fn test_export_to_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pattern.wav");
    let exporter = exporter(5);
    let state = kit::default_state();

    exporter.export_to_file(&state, &path, None).unwrap();
    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, exporter.export_wav_bytes(&state, None).unwrap());
}
