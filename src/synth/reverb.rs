// Reverb - convolution against a generated decaying-noise impulse response
//
// Architecture:
// - `ImpulseResponse`: generated once per rendering context, normalized and
//   split into FFT partitions; read-only afterwards and shared by every
//   channel through an `Arc`
// - `Convolver`: per-channel state (frequency-domain delay line, overlap
//   buffers) running uniformly partitioned overlap-add convolution
//
// The convolver works on blocks of `CONVOLVER_BLOCK` frames, so its output
// lags the input by exactly one block. The channel graph relies on that lag
// to close the reverb feedback loop sample by sample.
//
// Real-time constraints:
// - FFT plans, spectra and scratch buffers are allocated at construction
// - process_block() does not allocate

use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::buffer::{AudioBuffer, StereoFrame};
use crate::synth::noise::NoiseGenerator;

/// Partition size of the convolver (frames)
pub const CONVOLVER_BLOCK: usize = 512;

/// Default impulse response length in seconds
pub const DEFAULT_IMPULSE_SECONDS: f32 = 1.5;

/// Default decay exponent of the noise tail
pub const DEFAULT_IMPULSE_DECAY: f32 = 0.5;

// Loudness normalization of the impulse response: -58 dB relative to the
// RMS power, referenced to 44.1 kHz.
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// Shared reverb impulse response with precomputed partition spectra
pub struct ImpulseResponse {
    buffer: AudioBuffer,
    scale: f32,
    block: usize,
    /// [channel][partition][bin 0..=block]
    spectra: Vec<Vec<Vec<Complex<f32>>>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl ImpulseResponse {
    /// Generate the decaying-noise tail: two channels of
    /// `sample_rate * seconds` frames, each sample uniform noise scaled by
    /// `(1 - t)^decay` where `t` is the fractional position.
    pub fn generate(
        sample_rate: u32,
        seconds: f32,
        decay: f32,
        noise: &mut NoiseGenerator,
    ) -> Self {
        let frames = ((sample_rate as f32 * seconds.max(0.0)) as usize).max(1);
        let decay = decay.max(0.0);

        let channels = (0..2)
            .map(|_| {
                (0..frames)
                    .map(|i| {
                        let t = i as f32 / frames as f32;
                        noise.next_sample() * (1.0 - t).powf(decay)
                    })
                    .collect()
            })
            .collect();

        Self::from_buffer(AudioBuffer::from_channels(channels, sample_rate), true)
    }

    /// Build from an arbitrary buffer. Mono responses are used on both
    /// sides; only the first two channels are kept.
    pub fn from_buffer(buffer: AudioBuffer, normalize: bool) -> Self {
        let scale = if normalize {
            normalization_scale(&buffer)
        } else {
            1.0
        };

        let block = CONVOLVER_BLOCK;
        let fft_len = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let frames = buffer.frames().max(1);
        let partitions = frames.div_ceil(block);

        let spectra = (0..2)
            .map(|ch| {
                let source = buffer
                    .channel(ch)
                    .or_else(|| buffer.channel(0))
                    .unwrap_or(&[]);
                (0..partitions)
                    .map(|p| {
                        let mut work = vec![Complex::new(0.0f32, 0.0); fft_len];
                        let start = p * block;
                        for (i, slot) in work.iter_mut().take(block).enumerate() {
                            let sample = source.get(start + i).copied().unwrap_or(0.0);
                            *slot = Complex::new(sample * scale, 0.0);
                        }
                        forward.process(&mut work);
                        work.truncate(block + 1);
                        work
                    })
                    .collect()
            })
            .collect();

        Self {
            buffer,
            scale,
            block,
            spectra,
            forward,
            inverse,
        }
    }

    /// Raw (unnormalized) impulse response samples
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    /// Gain applied to the raw samples before convolution
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn partitions(&self) -> usize {
        self.spectra.first().map_or(0, Vec::len)
    }

    pub fn block_size(&self) -> usize {
        self.block
    }
}

impl fmt::Debug for ImpulseResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpulseResponse")
            .field("frames", &self.buffer.frames())
            .field("sample_rate", &self.buffer.sample_rate())
            .field("scale", &self.scale)
            .field("partitions", &self.partitions())
            .finish()
    }
}

/// RMS-based loudness normalization
fn normalization_scale(buffer: &AudioBuffer) -> f32 {
    let channels = buffer.number_of_channels().max(1);
    let frames = buffer.frames().max(1);

    let energy: f64 = buffer
        .channels()
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (energy / (channels * frames) as f64).sqrt() as f32;
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    if buffer.sample_rate() > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / buffer.sample_rate() as f32;
    }
    scale
}

/// Per-channel partitioned convolver
pub struct Convolver {
    ir: Arc<ImpulseResponse>,
    block: usize,
    partitions: usize,
    /// Frequency-domain delay line: [channel][slot][bin]
    history: Vec<Vec<Vec<Complex<f32>>>>,
    head: usize,
    input: Vec<StereoFrame>,
    output: Vec<StereoFrame>,
    overlap: [Vec<f32>; 2],
    pos: usize,
    work: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    silent_blocks: usize,
}

impl Convolver {
    pub fn new(ir: Arc<ImpulseResponse>) -> Self {
        let block = ir.block;
        let fft_len = block * 2;
        let partitions = ir.partitions().max(1);
        let zero = Complex::new(0.0f32, 0.0);
        let scratch_len = ir
            .forward
            .get_inplace_scratch_len()
            .max(ir.inverse.get_inplace_scratch_len());

        Self {
            block,
            partitions,
            history: vec![vec![vec![zero; block + 1]; partitions]; 2],
            head: 0,
            input: vec![StereoFrame::SILENCE; block],
            output: vec![StereoFrame::SILENCE; block],
            overlap: [vec![0.0; block], vec![0.0; block]],
            pos: 0,
            work: vec![zero; fft_len],
            acc: vec![zero; fft_len],
            scratch: vec![zero; scratch_len],
            silent_blocks: usize::MAX,
            ir,
        }
    }

    /// Latency of the convolver in frames
    pub fn latency(&self) -> usize {
        self.block
    }

    /// Wet output for the current frame
    #[inline]
    pub fn output(&self) -> StereoFrame {
        self.output[self.pos]
    }

    /// Feed the send signal for the current frame and advance
    #[inline]
    pub fn push(&mut self, frame: StereoFrame) {
        self.input[self.pos] = frame;
        self.pos += 1;
        if self.pos == self.block {
            self.process_block();
            self.pos = 0;
        }
    }

    pub fn reset(&mut self) {
        let zero = Complex::new(0.0f32, 0.0);
        for channel in &mut self.history {
            for slot in channel.iter_mut() {
                slot.fill(zero);
            }
        }
        self.input.fill(StereoFrame::SILENCE);
        self.output.fill(StereoFrame::SILENCE);
        for overlap in &mut self.overlap {
            overlap.fill(0.0);
        }
        self.pos = 0;
        self.head = 0;
        self.silent_blocks = usize::MAX;
    }

    fn process_block(&mut self) {
        let input_silent = self
            .input
            .iter()
            .all(|f| f.left == 0.0 && f.right == 0.0);
        self.silent_blocks = if input_silent {
            self.silent_blocks.saturating_add(1)
        } else {
            0
        };

        // History and overlap are all zero once a full response length of
        // silence has gone through.
        if self.silent_blocks > self.partitions {
            self.output.fill(StereoFrame::SILENCE);
            return;
        }

        let Self {
            ir,
            block,
            partitions,
            history,
            head,
            input,
            output,
            overlap,
            work,
            acc,
            scratch,
            ..
        } = self;
        let block = *block;
        let partitions = *partitions;
        let fft_len = block * 2;
        let zero = Complex::new(0.0f32, 0.0);
        let norm = 1.0 / fft_len as f32;

        for ch in 0..2 {
            for (i, w) in work.iter_mut().enumerate() {
                *w = match input.get(i) {
                    Some(frame) if ch == 0 => Complex::new(frame.left, 0.0),
                    Some(frame) => Complex::new(frame.right, 0.0),
                    None => zero,
                };
            }
            ir.forward.process_with_scratch(work, scratch);
            history[ch][*head].copy_from_slice(&work[..=block]);

            acc.fill(zero);
            for p in 0..partitions {
                let slot = (*head + partitions - p) % partitions;
                let x = &history[ch][slot];
                let h = &ir.spectra[ch][p];
                for k in 0..=block {
                    acc[k] += x[k] * h[k];
                }
            }
            for k in 1..block {
                acc[fft_len - k] = acc[k].conj();
            }
            ir.inverse.process_with_scratch(acc, scratch);

            let overlap = &mut overlap[ch];
            for i in 0..block {
                let y = acc[i].re * norm + overlap[i];
                overlap[i] = acc[block + i].re * norm;
                if ch == 0 {
                    output[i].left = y;
                } else {
                    output[i].right = y;
                }
            }
        }

        *head = (*head + 1) % partitions;
    }
}
