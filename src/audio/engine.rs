// Moteur audio - Callback CPAL temps-réel
//
// # Format Support
//
// Le moteur supporte plusieurs formats de sample :
// - **F32**: Floating point 32-bit (natif, pas de conversion nécessaire)
// - **I16**: Signed 16-bit integer (commun sur Windows/WASAPI)
// - **U16**: Unsigned 16-bit integer (moins courant)
//
// Tout le rendu se fait en f32 dans le `Renderer`; la conversion vers le
// format du device se fait à l'écriture dans le buffer de sortie.
//
// # Threads
//
// The output is split in two halves. `RealtimeOutput` is `Send` and lives
// with the scheduler: it reads the sample clock and pushes commands into a
// lock-free ring buffer. `OutputStream` owns the cpal stream, which is not
// `Send` on every backend, so it stays on the thread that opened it.
//
// Channel graphs are built on the control thread and moved into the
// callback whole. The callback does no I/O and takes no locks. It only
// allocates when more layers are queued than the renderer reserved room
// for, and it frees replaced graphs and finished layers in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};

use crate::audio::buffer::StereoFrame;
use crate::audio::context::AudioOutput;
use crate::audio::dsp_utils::hard_clip;
use crate::audio::format_conversion::write_stereo_to_interleaved_frame;
use crate::audio::parameters::PeakMeter;
use crate::audio::render::{Renderer, Trigger};
use crate::audio::timing::AudioTiming;
use crate::config::EngineConfig;
use crate::messaging::{CommandConsumer, CommandProducer, EngineCommand, create_command_channel};
use crate::mixer::{ChannelGraph, Mixer, MixerParams};
use crate::synth::noise::NoiseGenerator;
use crate::synth::reverb::ImpulseResponse;

/// Largest callback buffer rendered without growing the scratch block
const MAX_CALLBACK_FRAMES: usize = 8192;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Failed to pause audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("Unsupported sample format: {0:?}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(SampleFormat),

    #[error("Failed to spawn scheduler thread: {0}")]
    Thread(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Control-side handle of the live output
pub struct RealtimeOutput {
    sample_rate: u32,
    timing: AudioTiming,
    active: Arc<AtomicBool>,
    commands: CommandProducer,
    impulse: Arc<ImpulseResponse>,
    meters: Vec<PeakMeter>,
    master_meter: PeakMeter,
    dropped: u64,
}

impl RealtimeOutput {
    /// Pair a command producer with the clock the callback advances
    pub fn new(
        timing: AudioTiming,
        active: Arc<AtomicBool>,
        commands: CommandProducer,
        impulse: Arc<ImpulseResponse>,
        master_meter: PeakMeter,
    ) -> Self {
        Self {
            sample_rate: timing.sample_rate() as u32,
            timing,
            active,
            commands,
            impulse,
            meters: Vec::new(),
            master_meter,
            dropped: 0,
        }
    }

    pub fn master_meter(&self) -> PeakMeter {
        self.master_meter.clone()
    }

    /// Commands lost because the queue was full
    pub fn dropped_commands(&self) -> u64 {
        self.dropped
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Push a command to the callback; false when the queue is full
    fn send(&mut self, command: EngineCommand) -> bool {
        match self.commands.try_push(command) {
            Ok(()) => true,
            Err(command) => {
                self.dropped += 1;
                log::warn!("Audio command queue full, dropping {:?}", command);
                false
            }
        }
    }
}

impl AudioOutput for RealtimeOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.timing.current_time()
    }

    fn resume(&mut self) -> EngineResult<()> {
        if !self.active.swap(true, Ordering::AcqRel) {
            log::info!("Audio output resumed at {:.3}s", self.timing.current_time());
        }
        Ok(())
    }

    fn rebuild_channels(&mut self, params: &[MixerParams]) -> bool {
        let channels: Vec<ChannelGraph> = params
            .iter()
            .map(|p| ChannelGraph::new(self.sample_rate, Arc::clone(&self.impulse), p))
            .collect();
        let meters: Vec<PeakMeter> = channels.iter().map(|c| c.meter()).collect();
        let count = channels.len();
        if !self.send(EngineCommand::ReplaceChannels(channels)) {
            return false;
        }
        self.meters = meters;
        log::debug!("Rebuilt {} channel graphs", count);
        true
    }

    fn apply_params(&mut self, channel: usize, params: &MixerParams) -> bool {
        self.send(EngineCommand::ApplyParams {
            channel,
            params: *params,
        })
    }

    fn dispatch(&mut self, trigger: Trigger) {
        log::trace!(
            "Trigger channel {} at {:.4}s",
            trigger.channel,
            trigger.time
        );
        // A lost trigger is a missed hit, not stale state; nothing to retry
        let _ = self.send(EngineCommand::Trigger(trigger));
    }

    fn meters(&self) -> Vec<PeakMeter> {
        self.meters.clone()
    }
}

/// Owner of the device stream. Dropping it closes the device.
pub struct OutputStream {
    _device: Device,
    stream: Stream,
    active: Arc<AtomicBool>,
}

impl OutputStream {
    /// Silence the output and stop the clock
    pub fn pause(&self) -> EngineResult<()> {
        self.active.store(false, Ordering::Release);
        self.stream.pause()?;
        Ok(())
    }

    pub fn play(&self) -> EngineResult<()> {
        self.stream.play()?;
        Ok(())
    }
}

/// Open the default output device
pub fn open_default_output(config: &EngineConfig) -> EngineResult<(RealtimeOutput, OutputStream)> {
    // Obtenir le host audio par défaut
    let host = cpal::default_host();

    let device = host.default_output_device().ok_or(EngineError::NoDevice)?;
    log::info!(
        "Audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported_config = device.default_output_config()?;
    let sample_format = supported_config.sample_format();
    log::debug!("Audio config: {:?}", supported_config);

    let sample_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels() as usize;
    let stream_config: StreamConfig = supported_config.into();

    let mut noise = NoiseGenerator::new(config.noise_seed);
    let impulse = Arc::new(ImpulseResponse::generate(
        sample_rate,
        config.reverb.seconds,
        config.reverb.decay,
        &mut noise,
    ));

    let renderer = Renderer::new(Mixer::new(sample_rate, Arc::clone(&impulse)));
    let master_meter = renderer.mixer().master_meter();
    let (producer, consumer) = create_command_channel(config.command_queue_capacity);
    let timing = AudioTiming::new(sample_rate as f32);
    let active = Arc::new(AtomicBool::new(false));

    let callback = CallbackState {
        renderer,
        commands: consumer,
        timing: timing.clone(),
        active: Arc::clone(&active),
        scratch: vec![StereoFrame::SILENCE; MAX_CALLBACK_FRAMES],
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, callback),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, callback),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, callback),
        other => return Err(EngineError::UnsupportedFormat(other)),
    }?;
    stream.play()?;

    let output = RealtimeOutput::new(timing, Arc::clone(&active), producer, impulse, master_meter);
    let handle = OutputStream {
        _device: device,
        stream,
        active,
    };
    Ok((output, handle))
}

/// Everything the callback owns
struct CallbackState {
    renderer: Renderer,
    commands: CommandConsumer,
    timing: AudioTiming,
    active: Arc<AtomicBool>,
    scratch: Vec<StereoFrame>,
}

impl CallbackState {
    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                EngineCommand::Trigger(trigger) => self.renderer.schedule(trigger),
                EngineCommand::ReplaceChannels(channels) => {
                    // Old graphs are freed here; this only happens on start
                    // or when the track list changes shape.
                    drop(self.renderer.replace_channels(channels));
                }
                EngineCommand::ApplyParams { channel, params } => {
                    self.renderer.apply_params(channel, &params)
                }
            }
        }
    }

    fn fill<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        self.drain_commands();

        if !self.active.load(Ordering::Acquire) || channels == 0 {
            for sample in data.iter_mut() {
                *sample = Sample::from_sample::<f32>(0.0);
            }
            return;
        }

        let mut remaining = data;
        while !remaining.is_empty() {
            let frames = (remaining.len() / channels).min(self.scratch.len());
            if frames == 0 {
                for sample in remaining.iter_mut() {
                    *sample = Sample::from_sample::<f32>(0.0);
                }
                break;
            }
            let (head, tail) = remaining.split_at_mut(frames * channels);
            let block = &mut self.scratch[..frames];
            self.renderer.render(block);
            for (frame, out) in block.iter().zip(head.chunks_mut(channels)) {
                write_stereo_to_interleaved_frame(frame.map(hard_clip), out);
            }
            self.timing.advance(frames);
            remaining = tail;
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    mut state: CallbackState,
) -> EngineResult<Stream>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // ========== SACRED ZONE ==========
            // No I/O, No blocking locks
            // Queues are pre-reserved; frees happen on rebuild and layer end
            state.fill(data, channels);
            // ========== SACRED ZONE END ==========
        },
        |err| {
            // Runs outside the audio callback
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}
