// Distortion - waveshaping insert with gain compensation
//
// Transfer curve for drive amount k (k = 40 * drive) and x in [-1, 1]:
//
//   f(x) = (3 + k) * x * 20 * (pi / 180) / (pi + k * |x|)
//
// The curve is sampled at `CURVE_RESOLUTION` points and regenerated whenever
// the drive changes. Lookup follows the Web Audio WaveShaper rule: the input
// is mapped onto the curve index range and linearly interpolated; inputs
// beyond [-1, 1] take the end values.

use std::f32::consts::PI;

/// Number of points of the transfer curve
pub const CURVE_RESOLUTION: usize = 44100;

/// Scale from the user-facing drive in [0, 1] to the curve's k
pub const DRIVE_TO_K: f32 = 40.0;

/// Evaluate the closed-form saturator
#[inline]
pub fn saturate(x: f32, k: f32) -> f32 {
    (3.0 + k) * x * 20.0 * (PI / 180.0) / (PI + k * x.abs())
}

/// Pre-gain applied before the curve
#[inline]
pub fn pre_gain(drive: f32) -> f32 {
    1.0 + 2.0 * drive
}

/// Post-gain bringing the insert's small-signal gain back to unity.
///
/// Near zero the curve has slope (3 + k) / 9, so after the pre-gain the
/// chain gain is pre * (3 + k) / 9; this is its inverse.
#[inline]
pub fn post_gain(drive: f32) -> f32 {
    let k = drive * DRIVE_TO_K;
    9.0 / (pre_gain(drive) * (3.0 + k))
}

/// Sampled transfer curve
#[derive(Debug, Clone)]
pub struct Waveshaper {
    drive: f32,
    curve: Vec<f32>,
}

impl Waveshaper {
    pub fn new(drive: f32) -> Self {
        let mut shaper = Self {
            drive: f32::NAN,
            curve: vec![0.0; CURVE_RESOLUTION],
        };
        shaper.set_drive(drive);
        shaper
    }

    /// Regenerate the curve for a new drive in [0, 1]. Unchanged drive is
    /// a no-op.
    pub fn set_drive(&mut self, drive: f32) {
        let drive = if drive.is_finite() {
            drive.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if drive == self.drive {
            return;
        }
        self.drive = drive;

        let k = drive * DRIVE_TO_K;
        let last = (self.curve.len() - 1) as f32;
        for (i, point) in self.curve.iter_mut().enumerate() {
            // Symmetric around the centre so shape(0.0) is exactly 0.0
            let x = (i as f32 * 2.0 - last) / last;
            *point = saturate(x, k);
        }
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    pub fn curve(&self) -> &[f32] {
        &self.curve
    }

    #[inline]
    pub fn shape(&self, input: f32) -> f32 {
        let last = self.curve.len() - 1;
        let v = (last as f32) * 0.5 * (input + 1.0);

        if v <= 0.0 || v.is_nan() {
            return self.curve[0];
        }
        if v >= last as f32 {
            return self.curve[last];
        }

        let index = v.floor() as usize;
        let frac = v - index as f32;
        let a = self.curve[index];
        let b = self.curve[(index + 1).min(last)];
        a + (b - a) * frac
    }
}
