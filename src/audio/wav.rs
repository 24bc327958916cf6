// WAV encoding - canonical 16-bit PCM container
//
// Layout (little-endian, 44-byte header):
//   "RIFF" <36 + data size> "WAVE"
//   "fmt " 16, format 1, channels, sample rate, byte rate, block align, 16
//   "data" <frames * channels * 2> followed by interleaved samples
//
// hound writes exactly this header for 16-bit integer PCM with one or two
// channels; the sample values go through `f32_to_i16`.

use std::io::Cursor;

use hound::{WavSpec, WavWriter};

use crate::audio::buffer::AudioBuffer;
use crate::audio::export::{ExportError, ExportResult};
use crate::audio::format_conversion::f32_to_i16;

/// Size of the canonical header in bytes
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: u16 = 2;

/// Encode a buffer as PCM16 WAV bytes
pub fn encode_pcm16(buffer: &AudioBuffer) -> ExportResult<Vec<u8>> {
    let channels = buffer.number_of_channels();
    if channels == 0 || channels > 2 {
        return Err(ExportError::UnsupportedChannels(channels as u16));
    }

    let spec = WavSpec {
        channels: channels as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let data_len = buffer.frames() * channels * BYTES_PER_SAMPLE as usize;
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_len));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for frame in 0..buffer.frames() {
            for channel in buffer.channels() {
                writer.write_sample(f32_to_i16(channel[frame]))?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Header fields of a canonical PCM WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Read the 44-byte header. None if the bytes are not a canonical WAV.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..WAV_HEADER_LEN)?;
        if &header[0..4] != b"RIFF"
            || &header[8..12] != b"WAVE"
            || &header[12..16] != b"fmt "
            || &header[36..40] != b"data"
        {
            return None;
        }
        if read_u32(header, 16) != 16 {
            return None;
        }

        Some(Self {
            riff_size: read_u32(header, 4),
            format: read_u16(header, 20),
            channels: read_u16(header, 22),
            sample_rate: read_u32(header, 24),
            byte_rate: read_u32(header, 28),
            block_align: read_u16(header, 32),
            bits_per_sample: read_u16(header, 34),
            data_size: read_u32(header, 40),
        })
    }

    pub fn frames(&self) -> u32 {
        if self.block_align == 0 {
            0
        } else {
            self.data_size / self.block_align as u32
        }
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Interleaved PCM16 samples following the header
pub fn pcm16_samples(bytes: &[u8]) -> impl Iterator<Item = i16> + '_ {
    bytes
        .get(WAV_HEADER_LEN..)
        .unwrap_or(&[])
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let buffer = AudioBuffer::new(2, 100, 44100);
        let bytes = encode_pcm16(&buffer).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_LEN + 400);

        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.riff_size, 36 + 400);
        assert_eq!(header.format, 1);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.byte_rate, 44100 * 4);
        assert_eq!(header.block_align, 4);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_size, 400);
        assert_eq!(header.frames(), 100);
    }

    #[test]
    fn test_sample_scaling_and_interleaving() {
        let buffer = AudioBuffer::from_channels(
            vec![vec![1.0, -1.0, 0.5, 2.0], vec![-0.5, 0.0, -3.0, f32::NAN]],
            8000,
        );
        let bytes = encode_pcm16(&buffer).unwrap();
        let samples: Vec<i16> = pcm16_samples(&bytes).collect();
        assert_eq!(
            samples,
            vec![32767, -16384, -32768, 0, 16383, -32768, 32767, 0]
        );
    }

    #[test]
    fn test_mono_is_supported() {
        let buffer = AudioBuffer::new(1, 10, 22050);
        let bytes = encode_pcm16(&buffer).unwrap();
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.channels, 1);
        assert_eq!(header.block_align, 2);
        assert_eq!(header.data_size, 20);
    }

    #[test]
    fn test_unsupported_channel_counts() {
        let empty = AudioBuffer::new(0, 10, 44100);
        assert!(matches!(
            encode_pcm16(&empty),
            Err(ExportError::UnsupportedChannels(0))
        ));
        let surround = AudioBuffer::new(6, 10, 44100);
        assert!(matches!(
            encode_pcm16(&surround),
            Err(ExportError::UnsupportedChannels(6))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(WavHeader::parse(b"RIFF").is_none());
        assert!(WavHeader::parse(&[0u8; 64]).is_none());
    }
}
