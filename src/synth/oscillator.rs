// Oscillateurs - Générateurs de formes d'onde

use std::f64::consts::PI;

pub trait Oscillator {
    fn next_sample(&mut self) -> f32;
    fn set_frequency(&mut self, freq: f32);
    fn reset(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveformType {
    Sine,
    Triangle,
}

/// Phase-accumulating oscillator
///
/// Both waveforms start at zero and rise, so a voice triggered at an exact
/// frame begins without a step.
#[derive(Debug, Clone)]
pub struct SimpleOscillator {
    waveform: WaveformType,
    phase: f64,
    phase_increment: f64,
    sample_rate: f64,
}

impl SimpleOscillator {
    pub fn new(waveform: WaveformType, sample_rate: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate: sample_rate as f64,
        }
    }

    pub fn waveform(&self) -> WaveformType {
        self.waveform
    }
}

impl Oscillator for SimpleOscillator {
    fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let sample = match self.waveform {
            WaveformType::Sine => (p * 2.0 * PI).sin(),
            WaveformType::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
        };

        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample as f32
    }

    fn set_frequency(&mut self, freq: f32) {
        self.phase_increment = freq as f64 / self.sample_rate;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;
    const EPSILON: f32 = 0.001;

    fn zero_crossings(osc: &mut SimpleOscillator, frames: usize) -> usize {
        let mut crossings = 0;
        let mut previous = osc.next_sample();
        for _ in 1..frames {
            let sample = osc.next_sample();
            if previous <= 0.0 && sample > 0.0 {
                crossings += 1;
            }
            previous = sample;
        }
        crossings
    }

    #[test]
    fn test_oscillator_frequency() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(200.0);
        let crossings = zero_crossings(&mut osc, SAMPLE_RATE as usize);
        assert!((198..=201).contains(&crossings), "crossings: {}", crossings);
    }

    #[test]
    fn test_waveforms_start_at_zero() {
        for waveform in [WaveformType::Sine, WaveformType::Triangle] {
            let mut osc = SimpleOscillator::new(waveform, SAMPLE_RATE);
            osc.set_frequency(440.0);
            assert!(osc.next_sample().abs() < EPSILON);
            assert!(osc.next_sample() > 0.0);
        }
    }

    #[test]
    fn test_triangle_range() {
        let mut osc = SimpleOscillator::new(WaveformType::Triangle, SAMPLE_RATE);
        osc.set_frequency(200.0);
        let mut max = f32::MIN;
        let mut min = f32::MAX;
        for _ in 0..1000 {
            let s = osc.next_sample();
            max = max.max(s);
            min = min.min(s);
        }
        assert!(max <= 1.0 + EPSILON && max > 0.98);
        assert!(min >= -1.0 - EPSILON && min < -0.98);
    }

    #[test]
    fn test_reset() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(1000.0);
        for _ in 0..17 {
            osc.next_sample();
        }
        osc.reset();
        assert!(osc.next_sample().abs() < EPSILON);
    }
}
