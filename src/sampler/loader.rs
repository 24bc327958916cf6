// Sample loading - decode raw audio bytes into a planar float buffer
//
// Any container symphonia can probe is accepted. The decoded audio is
// brought to the target sample rate with a single rubato pass so the
// renderer plays it back without rate compensation.

use std::io::Cursor;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::audio::buffer::AudioBuffer;

/// Errors raised while turning bytes into audio
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read audio data: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode audio data: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error("audio data has no default track")]
    NoDefaultTrack,

    #[error("audio data is missing a sample rate")]
    MissingSampleRate,

    #[error("audio data contains no samples")]
    Empty,

    #[error("failed to create resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),
}

/// Turns raw file bytes into a buffer at the decoder's output rate
pub trait SampleDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError>;
}

/// Symphonia-backed decoder resampling to `target_rate`
#[derive(Debug, Clone, Copy)]
pub struct SymphoniaDecoder {
    target_rate: u32,
}

impl SymphoniaDecoder {
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate: target_rate.max(1),
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let decoded = decode_bytes(bytes, None)?;
        resample(decoded, self.target_rate)
    }
}

/// Read and decode a file, keeping its native sample rate
pub fn load_sample_file(path: &Path) -> Result<AudioBuffer, DecodeError> {
    let bytes = std::fs::read(path)?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_bytes(&bytes, extension)
}

fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> Result<AudioBuffer, DecodeError> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoDefaultTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or(DecodeError::MissingSampleRate)?;

    let mut decoder = get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut channel_count = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut interleaved: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(buf) => buf,
            // Corrupt packet: skip it and keep going
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let spec = *audio_buf.spec();
        channel_count = spec.channels.count();

        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if channel_count == 0 || interleaved.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    Ok(AudioBuffer::from_channels(channels, sample_rate))
}

/// Convert a buffer to `target_rate` in one pass
pub fn resample(buffer: AudioBuffer, target_rate: u32) -> Result<AudioBuffer, DecodeError> {
    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }
    if buffer.sample_rate() == target_rate {
        return Ok(buffer);
    }

    log::debug!(
        "Resampling {} frames from {} Hz to {} Hz",
        buffer.frames(),
        buffer.sample_rate(),
        target_rate
    );

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / buffer.sample_rate() as f64,
        2.0,
        params,
        buffer.frames(),
        buffer.number_of_channels(),
    )?;
    let waves_out = resampler.process(buffer.channels(), None)?;

    Ok(AudioBuffer::from_channels(waves_out, target_rate))
}
