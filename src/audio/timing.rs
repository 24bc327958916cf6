// Audio timing utilities - the audio clock shared by the scheduler and the
// render thread

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Convert an absolute time in seconds to the nearest frame index.
/// Negative times map to frame 0.
#[inline]
pub fn seconds_to_frame(seconds: f64, sample_rate: f64) -> u64 {
    if seconds <= 0.0 || !seconds.is_finite() {
        if seconds == f64::INFINITY {
            return u64::MAX;
        }
        return 0;
    }
    (seconds * sample_rate).round() as u64
}

/// Shared audio clock
///
/// The render thread advances the frame position after every callback; any
/// other thread reads it to learn the context's current time.
#[derive(Clone, Debug)]
pub struct AudioTiming {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Release);
    }

    /// Current context time in seconds
    pub fn current_time(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}
