// Envelope - exponential parameter ramps
//
// Every percussion voice is shaped by ramps of the form
// "hold v0 at t0, then approach v1 exponentially until t1". Exponential
// ramps cannot reach or cross zero, so the end values are strictly positive
// floors (0.001 for amplitude decays).

/// Smallest magnitude an exponential ramp endpoint may have
pub const MIN_RAMP_VALUE: f32 = 1e-6;

/// Amplitude floor used as the target of every percussive decay
pub const DECAY_FLOOR: f32 = 0.001;

/// Exponential ramp between two absolute times
///
/// - `t < start`: `from`
/// - `start <= t < end`: `from * (to / from)^((t - start) / (end - start))`
/// - `t >= end`: `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpRamp {
    from: f32,
    to: f32,
    start: f64,
    end: f64,
}

impl ExpRamp {
    /// Creates a ramp. Endpoints are forced positive and non-zero; a ramp
    /// whose end is not after its start jumps straight to `to`.
    pub fn new(from: f32, to: f32, start: f64, end: f64) -> Self {
        Self {
            from: from.abs().max(MIN_RAMP_VALUE),
            to: to.abs().max(MIN_RAMP_VALUE),
            start,
            end: end.max(start),
        }
    }

    /// Constant value for all times
    pub fn constant(value: f32) -> Self {
        Self::new(value, value, 0.0, 0.0)
    }

    /// Percussive decay from `peak` down to `DECAY_FLOOR` over `duration`
    pub fn decay(peak: f32, start: f64, duration: f64) -> Self {
        Self::new(peak, DECAY_FLOOR, start, start + duration)
    }

    #[inline]
    pub fn value_at(&self, time: f64) -> f32 {
        if time < self.start {
            return self.from;
        }
        if time >= self.end || self.end <= self.start {
            return self.to;
        }
        let progress = (time - self.start) / (self.end - self.start);
        let ratio = self.to as f64 / self.from as f64;
        (self.from as f64 * ratio.powf(progress)) as f32
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }
}
