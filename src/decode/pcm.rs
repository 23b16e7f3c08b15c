//! Raw PCM to f32 conversion
//!
//! Decoder pipes deliver bytes in arbitrary chunk sizes. [`PcmDecoder`] keeps
//! any trailing partial sample frame and prepends it to the next chunk, so the
//! output only ever contains whole interleaved frames.

use crate::config::SampleFormat;

/// Incremental little-endian PCM decoder
#[derive(Debug, Clone)]
pub struct PcmDecoder {
    format: SampleFormat,
    bytes_per_frame: usize,
    carry: Vec<u8>,
}

impl PcmDecoder {
    /// Create a decoder for `channels` interleaved channels of `format`
    pub fn new(format: SampleFormat, channels: u16) -> Self {
        let bytes_per_frame = format.bytes_per_sample() * channels.max(1) as usize;
        PcmDecoder {
            format,
            bytes_per_frame,
            carry: Vec::with_capacity(bytes_per_frame),
        }
    }

    /// Decode `bytes`, appending normalized samples to `out`
    ///
    /// Returns the number of samples appended.
    pub fn decode(&mut self, bytes: &[u8], out: &mut Vec<f32>) -> usize {
        let before = out.len();

        let mut input = bytes;
        if !self.carry.is_empty() {
            let need = self.bytes_per_frame - self.carry.len();
            let take = need.min(input.len());
            self.carry.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.carry.len() < self.bytes_per_frame {
                return 0;
            }
            let carry = std::mem::take(&mut self.carry);
            self.convert(&carry, out);
        }

        let whole = input.len() - input.len() % self.bytes_per_frame;
        self.convert(&input[..whole], out);
        self.carry.extend_from_slice(&input[whole..]);

        out.len() - before
    }

    /// Bytes held back waiting for the rest of a sample frame
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    fn convert(&self, bytes: &[u8], out: &mut Vec<f32>) {
        let width = self.format.bytes_per_sample();
        out.reserve(bytes.len() / width);
        for raw in bytes.chunks_exact(width) {
            out.push(sample_to_f32(self.format, raw));
        }
    }
}

/// Convert one little-endian sample to f32 on [-1.0, 1.0)
#[inline]
pub fn sample_to_f32(format: SampleFormat, raw: &[u8]) -> f32 {
    match format {
        SampleFormat::S8 => raw[0] as i8 as f32 / 128.0,
        SampleFormat::S16 => i16::from_le_bytes([raw[0], raw[1]]) as f32 / 32768.0,
        SampleFormat::S24 => {
            // sign-extend from bit 23
            let v = i32::from_le_bytes([0, raw[0], raw[1], raw[2]]) >> 8;
            v as f32 / 8388608.0
        }
        SampleFormat::S32 => {
            i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32 / 2147483648.0
        }
        SampleFormat::F32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
    }
}
