//! Frame type

use serde::Serialize;

/// A fixed-length window of consecutive samples, one vector per channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Position of this frame in the sequence, starting at 0
    pub index: usize,
    /// Sample offset (per channel) of the first sample; negative when the
    /// frame begins before the signal, those positions holding zeros
    pub start: i64,
    /// Samples up to the end of the signal; the rest is trailing zero padding
    pub valid_len: usize,
    /// Per-channel samples, all the same length
    pub samples: Vec<Vec<f32>>,
}

impl Frame {
    /// Samples per channel
    pub fn len(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.samples[ch]
    }

    /// Whether the tail of the frame is zero padding past the end of the signal
    pub fn is_padded(&self) -> bool {
        self.valid_len < self.len()
    }

    /// Offset one past the last real sample
    pub fn end(&self) -> i64 {
        self.start + self.valid_len as i64
    }

    /// Start time in seconds
    pub fn start_secs(&self, sample_rate: u32) -> f64 {
        self.start as f64 / sample_rate as f64
    }

    /// Samples as [L,R,L,R,...]
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.num_channels());
        for i in 0..self.len() {
            for channel in &self.samples {
                out.push(channel[i]);
            }
        }
        out
    }

    /// RMS level across all channels (linear)
    pub fn rms(&self) -> f32 {
        let count = self.len() * self.num_channels();
        if count == 0 {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_squares / count as f64).sqrt() as f32
    }

    /// Peak absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }
}
