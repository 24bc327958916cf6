// Atomic parameters - Lock-free communication control ↔ audio thread
// Uses atomic operations to share values between threads without locks

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe f32 value using atomic operations
/// Converts f32 to u32 bits for atomic storage
#[derive(Clone)]
pub struct AtomicF32 {
    inner: Arc<AtomicU32>,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            inner: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    pub fn set(&self, value: f32) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl std::fmt::Debug for AtomicF32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicF32").field(&self.get()).finish()
    }
}

/// Per-block peak level tap
///
/// Written by the audio thread once per render quantum, read by anyone
/// holding a clone. The held value decays by `PEAK_DECAY` per block so a
/// meter falls back smoothly after a transient.
#[derive(Clone, Debug, Default)]
pub struct PeakMeter {
    level: AtomicF32,
}

const PEAK_DECAY: f32 = 0.95;

impl PeakMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the peak of the last block (audio thread)
    pub fn update(&self, block_peak: f32) {
        let held = self.level.get() * PEAK_DECAY;
        self.level.set(block_peak.max(held));
    }

    /// Current peak level, linear
    pub fn level(&self) -> f32 {
        self.level.get()
    }

    pub fn reset(&self) {
        self.level.set(0.0);
    }
}
