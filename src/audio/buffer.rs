// Gestion des buffers audio
//
// `StereoFrame` is the unit every processor in the graph works on.
// `AudioBuffer` is the planar multichannel container shared by decoded
// samples, the reverb impulse response and offline render output.

use std::ops::{Add, AddAssign, Mul};

/// One stereo sample frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame {
        left: 0.0,
        right: 0.0,
    };

    #[inline]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels
    #[inline]
    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Largest absolute value of the two channels
    #[inline]
    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }

    #[inline]
    pub fn map(self, mut f: impl FnMut(f32) -> f32) -> Self {
        Self {
            left: f(self.left),
            right: f(self.right),
        }
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;

    #[inline]
    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for StereoFrame {
    #[inline]
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;

    #[inline]
    fn mul(self, gain: f32) -> StereoFrame {
        StereoFrame::new(self.left * gain, self.right * gain)
    }
}

/// Planar multichannel float buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Creates a silent buffer
    pub fn new(channel_count: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count],
        }
    }

    /// Wraps already decoded planar data. All channels are truncated to the
    /// shortest one so every channel has the same length.
    pub fn from_channels(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    /// Builds a stereo buffer from interleaved frames
    pub fn from_frames(frames: &[StereoFrame], sample_rate: u32) -> Self {
        let left = frames.iter().map(|f| f.left).collect();
        let right = frames.iter().map(|f| f.right).collect();
        Self {
            sample_rate,
            channels: vec![left, right],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in sample frames
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Reads a frame as stereo. Mono buffers are duplicated to both sides,
    /// extra channels are ignored.
    #[inline]
    pub fn stereo_frame(&self, index: usize) -> StereoFrame {
        match self.channels.as_slice() {
            [] => StereoFrame::SILENCE,
            [mono] => StereoFrame::mono(mono.get(index).copied().unwrap_or(0.0)),
            [left, right, ..] => StereoFrame::new(
                left.get(index).copied().unwrap_or(0.0),
                right.get(index).copied().unwrap_or(0.0),
            ),
        }
    }

    /// Peak absolute value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_arithmetic() {
        let mut a = StereoFrame::new(0.5, -0.25);
        a += StereoFrame::mono(0.25);
        assert_eq!(a, StereoFrame::new(0.75, 0.0));
        assert_eq!(a * 2.0, StereoFrame::new(1.5, 0.0));
        assert_eq!(StereoFrame::new(-0.8, 0.3).peak(), 0.8);
    }

    #[test]
    fn test_from_channels_truncates_to_shortest() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.1; 10], vec![0.2; 7]], 44100);
        assert_eq!(buffer.frames(), 7);
        assert_eq!(buffer.channel(0).map(<[f32]>::len), Some(7));
    }

    #[test]
    fn test_mono_buffer_reads_as_stereo() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.5, -0.5]], 48000);
        assert_eq!(buffer.stereo_frame(1), StereoFrame::mono(-0.5));
        assert_eq!(buffer.stereo_frame(5), StereoFrame::SILENCE);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(2, 22050, 44100);
        assert!((buffer.duration_seconds() - 0.5).abs() < 1e-9);
        assert_eq!(buffer.number_of_channels(), 2);
    }
}
