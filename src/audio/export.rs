// Audio Export - Offline rendering to WAV files
//
// The exporter builds its own rendering context, independent of any live
// output: fresh channel graphs with the tracks' mixer settings applied once,
// every flagged step of one pass through the pattern scheduled up front, then
// the whole buffer rendered as fast as possible. The same `Renderer` and
// voice code as live playback produce the audio, so an export sounds like
// what the sequencer plays.
//
// With a fixed noise seed the output is byte-identical from run to run.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::buffer::{AudioBuffer, StereoFrame};
use crate::audio::render::{Renderer, Trigger};
use crate::audio::wav::encode_pcm16;
use crate::config::ReverbConfig;
use crate::mixer::{Mixer, MixerParams};
use crate::sequencer::state::SequencerState;
use crate::synth::noise::NoiseGenerator;
use crate::synth::reverb::ImpulseResponse;
use crate::synth::voice::VoiceSynthesizer;

/// Frames rendered per chunk
const RENDER_CHUNK: usize = 4096;

const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = 192_000;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Offline render failed: {0}")]
    RenderFailure(String),

    #[error("Export would last {seconds:.1}s, limit is {max:.1}s")]
    DurationExceeded { seconds: f64, max: f64 },

    #[error("Cannot encode {0} channels (1 or 2 supported)")]
    UnsupportedChannels(u16),

    #[error("WAV encoding error: {0}")]
    Encode(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Audio export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Sample rate (Hz)
    pub sample_rate: u32,
    /// Silence rendered after the last bar so tails can ring out
    pub tail_seconds: f64,
    /// Longest render accepted
    pub max_duration_seconds: f64,
    /// Seed for the noise used by voices and the reverb tail
    pub noise_seed: Option<u64>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tail_seconds: 1.0,
            max_duration_seconds: 600.0,
            noise_seed: None,
        }
    }
}

/// Progress callback for export (reports 0.0 to 1.0).
/// The callback should update a shared state (e.g., Arc<Mutex<f32>>) or send progress via a channel to the UI.
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// A fixed-length, non-realtime rendering context
pub struct OfflineContext {
    renderer: Renderer,
    length: usize,
}

impl OfflineContext {
    pub fn new(sample_rate: u32, length: usize, impulse: Arc<ImpulseResponse>) -> Self {
        Self {
            renderer: Renderer::new(Mixer::new(sample_rate, impulse)),
            length,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.renderer.sample_rate()
    }

    /// Total frames the context will render
    pub fn length(&self) -> usize {
        self.length
    }

    /// One channel graph per entry, parameters applied without ramps
    pub fn build_channels(&mut self, params: &[MixerParams]) {
        self.renderer.rebuild_channels(params);
    }

    pub fn schedule(&mut self, trigger: Trigger) {
        self.renderer.schedule(trigger);
    }

    pub fn pending_layers(&self) -> usize {
        self.renderer.pending_layers()
    }

    /// Render the whole context into a stereo buffer
    pub fn start_rendering(
        mut self,
        mut progress_callback: Option<ProgressCallback>,
    ) -> ExportResult<AudioBuffer> {
        let total = self.length;
        let mut left: Vec<f32> = Vec::new();
        let mut right: Vec<f32> = Vec::new();
        left.try_reserve_exact(total)
            .and_then(|_| right.try_reserve_exact(total))
            .map_err(|e| ExportError::RenderFailure(format!("cannot allocate {total} frames: {e}")))?;

        let progress_interval = self.sample_rate() as usize;
        let mut next_report = progress_interval;
        let mut chunk = vec![StereoFrame::SILENCE; RENDER_CHUNK.min(total.max(1))];

        while left.len() < total {
            let count = chunk.len().min(total - left.len());
            let block = &mut chunk[..count];
            self.renderer.render(block);
            for frame in block.iter() {
                left.push(frame.left);
                right.push(frame.right);
            }

            if left.len() >= next_report {
                if let Some(callback) = progress_callback.as_mut() {
                    callback(left.len() as f32 / total as f32);
                }
                next_report += progress_interval;
            }
        }

        // Call progress callback one last time with 1.0
        if let Some(callback) = progress_callback.as_mut() {
            callback(1.0);
        }

        Ok(AudioBuffer::from_channels(vec![left, right], self.sample_rate()))
    }
}

/// Renders sequencer state to audio
pub struct PatternExporter {
    settings: ExportSettings,
    reverb: ReverbConfig,
}

impl PatternExporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            settings,
            reverb: ReverbConfig::default(),
        }
    }

    /// Use a different impulse response length and decay
    pub fn with_reverb(mut self, reverb: ReverbConfig) -> Self {
        self.reverb = reverb;
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Frames an export of `state` will contain
    pub fn frame_count(&self, state: &SequencerState) -> usize {
        let duration = state.pattern().render_duration(self.settings.tail_seconds);
        (duration * self.settings.sample_rate as f64).ceil() as usize
    }

    /// Render one pass of the pattern plus the tail
    pub fn render_pattern(
        &self,
        state: &SequencerState,
        progress_callback: Option<ProgressCallback>,
    ) -> ExportResult<AudioBuffer> {
        let sample_rate = self.settings.sample_rate;
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(ExportError::RenderFailure(format!(
                "unsupported sample rate {sample_rate} Hz"
            )));
        }

        let pattern = state.pattern();
        let duration = pattern.render_duration(self.settings.tail_seconds);
        if duration > self.settings.max_duration_seconds {
            return Err(ExportError::DurationExceeded {
                seconds: duration,
                max: self.settings.max_duration_seconds,
            });
        }
        let frames = self.frame_count(state);

        let mut noise = NoiseGenerator::new(self.settings.noise_seed);
        let impulse = Arc::new(ImpulseResponse::generate(
            sample_rate,
            self.reverb.seconds,
            self.reverb.decay,
            &mut noise,
        ));
        let mut synth = VoiceSynthesizer::new(sample_rate, noise);

        let mut context = OfflineContext::new(sample_rate, frames, impulse);
        context.build_channels(&state.mixer_params());

        let mut triggers = 0;
        for step in 0..state.steps_per_pattern() {
            let time = pattern.step_time(step);
            for (channel, track) in state.tracks().iter().enumerate() {
                if !track.is_active(step) {
                    continue;
                }
                if let Some(sound) = track.sound_at(&mut synth, time) {
                    context.schedule(Trigger {
                        channel,
                        time,
                        sound,
                    });
                    triggers += 1;
                }
            }
        }

        log::debug!(
            "Offline render: {:.2}s ({} frames) at {} Hz, {} tracks, {} triggers",
            duration,
            frames,
            sample_rate,
            state.tracks().len(),
            triggers
        );

        context.start_rendering(progress_callback)
    }

    /// Render and encode to PCM16 WAV bytes
    pub fn export_wav_bytes(
        &self,
        state: &SequencerState,
        progress_callback: Option<ProgressCallback>,
    ) -> ExportResult<Vec<u8>> {
        let buffer = self.render_pattern(state, progress_callback)?;
        encode_pcm16(&buffer)
    }

    /// Render and write a WAV file. Nothing is written if rendering fails.
    pub fn export_to_file(
        &self,
        state: &SequencerState,
        path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> ExportResult<()> {
        let bytes = self.export_wav_bytes(state, progress_callback)?;
        std::fs::write(path, &bytes)?;
        log::info!("Exported {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::kit;
    use crate::sequencer::track::Track;
    use crate::synth::voice::VoiceKind;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn seeded(seed: u64) -> PatternExporter {
        PatternExporter::new(ExportSettings {
            noise_seed: Some(seed),
            ..ExportSettings::default()
        })
        .with_reverb(ReverbConfig {
            seconds: 0.3,
            decay: 0.5,
        })
    }

    #[test]
    fn test_export_settings_default() {
        let settings = ExportSettings::default();
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.tail_seconds, 1.0);
        assert_eq!(settings.max_duration_seconds, 600.0);
        assert!(settings.noise_seed.is_none());
    }

    #[test]
    fn test_frame_count() {
        // 120 BPM 4/4: 2 s of pattern + 1 s tail
        let state = kit::default_state();
        assert_eq!(seeded(1).frame_count(&state), 3 * 44100);
    }

    #[test]
    fn test_empty_state_renders_silence() {
        let state = SequencerState::default();
        let buffer = seeded(1).render_pattern(&state, None).unwrap();
        assert_eq!(buffer.number_of_channels(), 2);
        assert_eq!(buffer.frames(), 3 * 44100);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_single_kick_starts_at_zero() {
        let mut state = SequencerState::default();
        let kick = state.add_track(Track::synth("Kick", VoiceKind::Kick, 16));
        state.set_step(kick, 0, true);

        let buffer = seeded(2).render_pattern(&state, None).unwrap();
        let left = buffer.channel(0).unwrap();
        let early = left[..2205].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let late = left[2 * 44100..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(early > 0.1, "kick transient missing: {early}");
        assert!(late < early * 0.1);
    }

    #[test]
    fn test_progress_reports_end() {
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        let callback: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));

        seeded(3)
            .render_pattern(&kit::default_state(), Some(callback))
            .unwrap();

        let reports = progress.lock().unwrap();
        assert!(reports.len() >= 3);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*reports.last().unwrap(), 1.0);
    }

    #[test]
    fn test_duration_limit() {
        let exporter = PatternExporter::new(ExportSettings {
            max_duration_seconds: 2.5,
            ..ExportSettings::default()
        });
        let result = exporter.render_pattern(&kit::default_state(), None);
        assert!(matches!(result, Err(ExportError::DurationExceeded { .. })));
    }

    #[test]
    fn test_bad_sample_rate() {
        let exporter = PatternExporter::new(ExportSettings {
            sample_rate: 0,
            ..ExportSettings::default()
        });
        let result = exporter.render_pattern(&kit::default_state(), None);
        assert!(matches!(result, Err(ExportError::RenderFailure(_))));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("beat.wav");

        seeded(4)
            .export_to_file(&kit::default_state(), &output_path, None)
            .unwrap();

        let metadata = std::fs::metadata(&output_path).unwrap();
        assert_eq!(metadata.len(), 44 + 3 * 44100 * 4);
    }

    #[test]
    fn test_failed_export_writes_nothing() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("never.wav");
        let exporter = PatternExporter::new(ExportSettings {
            max_duration_seconds: 1.0,
            ..ExportSettings::default()
        });
        assert!(
            exporter
                .export_to_file(&kit::default_state(), &output_path, None)
                .is_err()
        );
        assert!(!output_path.exists());
    }
}
