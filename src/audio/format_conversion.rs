// Format conversion - internal f32 to device and file sample formats
//
// - PCM16 for the WAV encoder (asymmetric scaling, truncation)
// - any CPAL sample type for the real-time stream
//
// All conversions are allocation-free and suitable for real-time audio callbacks.

use cpal::{FromSample, Sample};

use crate::audio::buffer::StereoFrame;

/// Convert f32 sample to i16
///
/// Clamps to [-1.0, 1.0] first, then scales negative samples by 32768 and
/// non-negative samples by 32767, truncating toward zero.
/// NaN maps to 0.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);

    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Convert i16 sample to f32 (inverse of `f32_to_i16`, up to quantization)
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample >= 0 {
        sample as f32 / i16::MAX as f32
    } else {
        sample as f32 / -(i16::MIN as f32)
    }
}

/// Write a stereo frame into one interleaved device frame
///
/// Channels beyond the first two get silence; a mono device gets the
/// average of left and right.
#[inline]
pub fn write_stereo_to_interleaved_frame<T>(frame: StereoFrame, output_frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    if output_frame.len() >= 2 {
        output_frame[0] = Sample::from_sample::<f32>(frame.left);
        output_frame[1] = Sample::from_sample::<f32>(frame.right);
        for channel_sample in output_frame.iter_mut().skip(2) {
            *channel_sample = Sample::from_sample::<f32>(0.0);
        }
    } else if let Some(channel_sample) = output_frame.first_mut() {
        let mono_sample = (frame.left + frame.right) * 0.5;
        *channel_sample = Sample::from_sample::<f32>(mono_sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_conversion() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);

        // Truncation toward zero, asymmetric scale
        assert_eq!(f32_to_i16(0.5), 16383);
        assert_eq!(f32_to_i16(-0.5), -16384);
        assert_eq!(f32_to_i16(-0.00001), 0);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_roundtrip_i16() {
        let test_values = [-1.0f32, -0.5, -0.1, 0.0, 0.1, 0.5, 0.9, 1.0];

        for &original in &test_values {
            let back = i16_to_f32(f32_to_i16(original));
            assert!(
                (back - original).abs() < 0.001,
                "Roundtrip failed for {}: got {}",
                original,
                back
            );
        }
    }

    #[test]
    fn test_write_stereo_to_interleaved() {
        let mut output: [f32; 2] = [0.0; 2];
        write_stereo_to_interleaved_frame(StereoFrame::new(0.5, -0.5), &mut output);
        assert_eq!(output, [0.5, -0.5]);

        let mut surround: [f32; 4] = [1.0; 4];
        write_stereo_to_interleaved_frame(StereoFrame::new(0.25, 0.75), &mut surround);
        assert_eq!(surround, [0.25, 0.75, 0.0, 0.0]);

        let mut mono: [f32; 1] = [0.0];
        write_stereo_to_interleaved_frame(StereoFrame::new(0.25, 0.75), &mut mono);
        assert_eq!(mono[0], 0.5);
    }

    #[test]
    fn test_write_stereo_to_i16_device() {
        let mut output_i16: [i16; 2] = [0; 2];
        write_stereo_to_interleaved_frame(StereoFrame::mono(0.5), &mut output_i16);
        assert!(output_i16[0] > 0);
        assert_eq!(output_i16[0], output_i16[1]);
    }
}
