// Delay - feedback echo line for the channel graph
//
// The delay sits on a feedback path: the channel input is written into the
// line, and the delayed signal, scaled by the feedback gain, is summed back
// into the channel input on the next pass. The graph therefore reads the
// echo (`tap`) before writing the new input (`write`).
//
// Real-time constraints:
// - Pre-allocated circular buffer (no allocations during processing)
// - Fixed maximum delay time (set at creation)

use crate::audio::buffer::StereoFrame;
use crate::audio::dsp_utils::{OnePoleSmoother, PARAM_SMOOTHING_MS, flush_denormals_to_zero};

/// Capacity of the delay line in seconds
pub const MAX_DELAY_SECONDS: f32 = 2.0;

/// Delay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams {
    /// Delay time in seconds
    pub time_sec: f32,
    /// Amount of delayed signal fed back into the channel input
    pub feedback: f32,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            time_sec: 0.0,
            feedback: 0.0,
        }
    }
}

/// Circular stereo delay line with fractional read position
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<StereoFrame>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![StereoFrame::SILENCE; max_samples.max(4)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Read the signal written `delay_samples` frames ago (linear
    /// interpolation). The delay is kept within [1, capacity - 2].
    #[inline]
    pub fn read(&self, delay_samples: f32) -> StereoFrame {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1.0, (len - 2) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let newer = (self.write_pos + len - whole) % len;
        let older = (newer + len - 1) % len;

        let a = self.buffer[newer];
        let b = self.buffer[older];
        a * (1.0 - frac) + b * frac
    }

    #[inline]
    pub fn write(&mut self, frame: StereoFrame) {
        self.buffer[self.write_pos] = frame;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.fill(StereoFrame::SILENCE);
        self.write_pos = 0;
    }
}

/// Feedback delay with smoothed time and feedback gain
///
/// # Example
/// ```
/// use drumseq::audio::buffer::StereoFrame;
/// use drumseq::synth::delay::{DelayParams, FeedbackDelay};
///
/// let mut delay = FeedbackDelay::new(DelayParams { time_sec: 0.25, feedback: 0.5 }, 44100.0);
/// let echo = delay.tap();
/// delay.write(StereoFrame::mono(0.5) + echo);
/// ```
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    params: DelayParams,
    sample_rate: f32,
    line: DelayLine,
    time_smoother: OnePoleSmoother,
    feedback_smoother: OnePoleSmoother,
}

impl FeedbackDelay {
    pub fn new(params: DelayParams, sample_rate: f32) -> Self {
        let max_samples = (MAX_DELAY_SECONDS * sample_rate) as usize + 2;
        let params = Self::validate(params);

        Self {
            params,
            sample_rate,
            line: DelayLine::new(max_samples),
            time_smoother: OnePoleSmoother::new(
                params.time_sec * sample_rate,
                PARAM_SMOOTHING_MS,
                sample_rate,
            ),
            feedback_smoother: OnePoleSmoother::new(params.feedback, PARAM_SMOOTHING_MS, sample_rate),
        }
    }

    fn validate(params: DelayParams) -> DelayParams {
        DelayParams {
            time_sec: params.time_sec.clamp(0.0, MAX_DELAY_SECONDS),
            feedback: params.feedback.clamp(0.0, 0.95),
        }
    }

    /// Set new targets; the smoothers glide towards them
    pub fn set_params(&mut self, params: DelayParams) {
        self.params = Self::validate(params);
    }

    /// Set new values without gliding
    pub fn set_params_immediate(&mut self, params: DelayParams) {
        self.set_params(params);
        self.time_smoother.reset(self.params.time_sec * self.sample_rate);
        self.feedback_smoother.reset(self.params.feedback);
    }

    pub fn params(&self) -> DelayParams {
        self.params
    }

    /// Delayed signal scaled by the feedback gain, to be summed into the
    /// channel input for the current frame.
    #[inline]
    pub fn tap(&mut self) -> StereoFrame {
        let delay_samples = self
            .time_smoother
            .process(self.params.time_sec * self.sample_rate);
        let feedback = self.feedback_smoother.process(self.params.feedback);
        if feedback == 0.0 {
            return StereoFrame::SILENCE;
        }
        self.line.read(delay_samples) * feedback
    }

    /// Push the current channel input into the line
    #[inline]
    pub fn write(&mut self, input: StereoFrame) {
        // Clamp to prevent runaway feedback
        let frame = input.map(|s| flush_denormals_to_zero(s.clamp(-2.0, 2.0)));
        self.line.write(frame);
    }

    pub fn reset(&mut self) {
        self.line.clear();
    }
}
