// Filter - RBJ biquad (Audio EQ Cookbook)
//
// Second-order IIR filter in transposed direct form II.
//
// Characteristics:
// - 12dB/octave slope (2-pole)
// - Stable over the whole band up to Nyquist
// - A low-pass at or above Nyquist is an exact pass-through, a high-pass
//   there outputs silence
//
// Used for the channel tone control (low-pass) and the hi-hat voice
// (high-pass at 7 kHz).

use std::f64::consts::PI;

/// Butterworth Q, maximally flat pass band
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Filter type/mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
}

/// Filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Cutoff frequency in Hz
    pub cutoff: f32,
    /// Q factor (0.1 - 20.0)
    pub resonance: f32,
    pub filter_type: FilterType,
}

impl FilterParams {
    pub fn lowpass(cutoff: f32) -> Self {
        Self {
            cutoff,
            resonance: BUTTERWORTH_Q,
            filter_type: FilterType::LowPass,
        }
    }

    pub fn highpass(cutoff: f32) -> Self {
        Self {
            cutoff,
            resonance: BUTTERWORTH_Q,
            filter_type: FilterType::HighPass,
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::lowpass(1000.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const PASS: Coefficients = Coefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    const MUTE: Coefficients = Coefficients {
        b0: 0.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn compute(params: &FilterParams, sample_rate: f32) -> Self {
        let nyquist = sample_rate as f64 * 0.5;
        let normalized = params.cutoff as f64 / nyquist;

        match params.filter_type {
            FilterType::LowPass if normalized >= 1.0 => return Self::PASS,
            FilterType::LowPass if normalized <= 0.0 => return Self::MUTE,
            FilterType::HighPass if normalized >= 1.0 => return Self::MUTE,
            FilterType::HighPass if normalized <= 0.0 => return Self::PASS,
            _ => {}
        }

        let q = (params.resonance as f64).clamp(0.1, 20.0);
        let w0 = PI * normalized;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match params.filter_type {
            FilterType::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 * 0.5, b1, b1 * 0.5)
            }
            FilterType::HighPass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 * 0.5, b1, -b1 * 0.5)
            }
        };

        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (-2.0 * cos_w0 / a0) as f32,
            a2: ((1.0 - alpha) / a0) as f32,
        }
    }
}

/// Biquad filter implementation
///
/// # Example
/// ```
/// use drumseq::synth::filter::{Biquad, FilterParams};
///
/// let mut filter = Biquad::new(FilterParams::highpass(7000.0), 44100.0);
/// let output = filter.process(0.5);
/// assert!(output.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Biquad {
    params: FilterParams,
    sample_rate: f32,
    coefficients: Coefficients,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new(params: FilterParams, sample_rate: f32) -> Self {
        Self {
            params,
            sample_rate,
            coefficients: Coefficients::compute(&params, sample_rate),
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Update parameters, recomputing coefficients only when they changed.
    /// Filter state is kept so a sweeping cutoff stays click-free.
    pub fn set_params(&mut self, params: FilterParams) {
        if params != self.params {
            self.params = params;
            self.coefficients = Coefficients::compute(&params, self.sample_rate);
        }
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.set_params(FilterParams {
            cutoff,
            ..self.params
        });
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coefficients;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;

        // Anti-denormals on the state
        if self.z1.abs() < 1e-20 {
            self.z1 = 0.0;
        }
        if self.z2.abs() < 1e-20 {
            self.z2 = 0.0;
        }

        output
    }
}
