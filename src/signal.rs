//! Whole-file reads
//!
//! Convenience for short files where holding the full signal in memory is
//! fine. Built on [`FrameReader`] with non-overlapping frames.

use std::path::Path;

use crate::config::{Alignment, FinalFrame, StreamConfig, Window};
use crate::error::Result;
use crate::reader::FrameReader;

/// A fully decoded signal, one vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl Signal {
    /// Samples per channel
    pub fn num_samples(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }
}

/// Read an entire source into memory
///
/// Rate, channels, format and decoder come from `config`; its framing
/// settings are replaced by contiguous, unwindowed, left-aligned frames with
/// no offset so the result is exactly the decoded sample stream.
pub fn read_signal(source: impl AsRef<Path>, config: &StreamConfig) -> Result<Signal> {
    let config = config
        .clone()
        .with_hop_size(config.frame_size)
        .with_final_frame(FinalFrame::Short)
        .with_window(Window::Rectangular)
        .with_alignment(Alignment::Left)
        .with_offset_secs(0.0);

    let mut samples = vec![Vec::new(); config.channels as usize];
    let sample_rate = config.sample_rate;

    for frame in FrameReader::open(source, config)? {
        let frame = frame?;
        let valid = frame.valid_len;
        for (dst, src) in samples.iter_mut().zip(&frame.samples) {
            dst.extend_from_slice(&src[..valid]);
        }
    }

    Ok(Signal {
        samples,
        sample_rate,
    })
}
