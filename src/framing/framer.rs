//! Rolling-buffer framing
//!
//! [`Framer`] accepts interleaved samples in chunks of any size and hands out
//! frames as soon as enough samples have arrived. Consecutive frame starts are
//! exactly `hop_size` apart:
//! - `hop_size < frame_size`: the overlapping tail stays buffered for the
//!   next frame
//! - `hop_size > frame_size`: the gap between frames is skipped, including
//!   samples that have not arrived yet
//!
//! The first frame may start before the signal (centre or right alignment, a
//! negative offset), in which case the missing samples read as zeros, or after
//! it (a positive offset), in which case the leading samples are skipped.
//!
//! Memory is bounded by one frame plus one pushed chunk.

use std::collections::VecDeque;

use super::frame::Frame;
use super::window;
use crate::config::{FinalFrame, StreamConfig, Window};
use crate::error::Result;

/// Per-channel buffer capacity reserved up front; larger frames grow on demand
const INITIAL_CAPACITY: usize = 8192;

/// Slices a sample stream into fixed-size, hop-spaced frames
#[derive(Debug, Clone)]
pub struct Framer {
    channels: usize,
    frame_size: usize,
    hop_size: usize,
    final_frame: FinalFrame,
    window: Window,
    coefficients: Option<Vec<f32>>,
    buffer: Vec<VecDeque<f32>>,
    /// Offset of the first buffered sample; negative while leading zeros are buffered
    buffer_start: i64,
    /// Incoming samples still to discard before the next frame start
    skip: usize,
    /// Zeros to insert ahead of the first sample
    lead_zeros: usize,
    /// End of the last emitted frame
    covered_until: i64,
    received: u64,
    next_index: usize,
    finished: bool,
}

impl Framer {
    /// Create a framer; `frame_size`, `hop_size` and `channels` must be positive
    pub(crate) fn new(
        channels: usize,
        frame_size: usize,
        hop_size: usize,
        final_frame: FinalFrame,
        window: Window,
    ) -> Self {
        debug_assert!(channels > 0 && frame_size > 0 && hop_size > 0);
        Framer {
            channels,
            frame_size,
            hop_size,
            final_frame,
            window,
            coefficients: window::coefficients(window, frame_size),
            buffer: vec![VecDeque::with_capacity(frame_size.min(INITIAL_CAPACITY)); channels],
            buffer_start: 0,
            skip: 0,
            lead_zeros: 0,
            covered_until: 0,
            received: 0,
            next_index: 0,
            finished: false,
        }
    }

    /// Build a framer from a config, validating it first
    pub fn from_config(config: &StreamConfig) -> Result<Self> {
        let hop_size = config.validate()?;
        let framer = Self::new(
            config.channels as usize,
            config.frame_size,
            hop_size,
            config.final_frame,
            config.window,
        );
        Ok(framer.with_lead(config.lead_samples()))
    }

    /// Place the first frame `lead` samples after the first input sample
    pub(crate) fn with_lead(mut self, lead: i64) -> Self {
        if lead >= 0 {
            self.skip = lead as usize;
        } else {
            self.lead_zeros = lead.unsigned_abs() as usize;
            self.buffer_start = lead;
        }
        self
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Samples per channel received so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Samples per channel waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.buffer[0].len()
    }

    /// Append interleaved samples
    ///
    /// The length must be a multiple of the channel count.
    pub fn push(&mut self, interleaved: &[f32]) {
        debug_assert_eq!(interleaved.len() % self.channels, 0);

        let frames = interleaved.chunks_exact(self.channels);
        let frame_count = frames.len();

        if frame_count > 0 && self.lead_zeros > 0 {
            let zeros = std::mem::take(&mut self.lead_zeros);
            for channel in &mut self.buffer {
                channel.extend(std::iter::repeat(0.0).take(zeros));
            }
        }

        // The buffer is empty whenever skip is non-zero
        let skipped = self.skip.min(frame_count);
        self.skip -= skipped;
        self.buffer_start += skipped as i64;

        for sample_frame in frames.skip(skipped) {
            for (channel, &sample) in self.buffer.iter_mut().zip(sample_frame) {
                channel.push_back(sample);
            }
        }

        self.received += frame_count as u64;
    }

    /// Next full frame, if enough samples are buffered
    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.finished || self.buffered() < self.frame_size {
            return None;
        }
        let frame = self.build_frame(self.frame_size, self.frame_size);
        self.advance();
        Some(frame)
    }

    /// Flush at end of stream
    ///
    /// Emits one final frame when some received sample is not covered by any
    /// emitted frame, shaped by the final-frame policy. Later calls return
    /// `None`; so do [`pop_frame`](Self::pop_frame) calls.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.finished {
            return None;
        }
        self.finished = true;

        let available = self.buffered();
        if available == 0 || self.received as i64 <= self.covered_until {
            return None;
        }

        match self.final_frame {
            FinalFrame::Discard => None,
            FinalFrame::ZeroPad => Some(self.build_frame(available, self.frame_size)),
            FinalFrame::Short => Some(self.build_frame(available, available)),
        }
    }

    fn build_frame(&mut self, valid_len: usize, len: usize) -> Frame {
        let mut samples: Vec<Vec<f32>> = self
            .buffer
            .iter()
            .map(|channel| {
                let mut data: Vec<f32> = channel.iter().take(valid_len).copied().collect();
                data.resize(len, 0.0);
                data
            })
            .collect();

        let short_window;
        let coefficients = if len == self.frame_size {
            self.coefficients.as_deref()
        } else {
            short_window = window::coefficients(self.window, len);
            short_window.as_deref()
        };
        if let Some(coefficients) = coefficients {
            for channel in &mut samples {
                window::apply(coefficients, channel);
            }
        }

        let frame = Frame {
            index: self.next_index,
            start: self.buffer_start,
            valid_len,
            samples,
        };
        self.next_index += 1;
        self.covered_until = frame.end().max(self.covered_until);
        frame
    }

    fn advance(&mut self) {
        let drop = self.hop_size.min(self.buffered());
        for channel in &mut self.buffer {
            channel.drain(..drop);
        }
        self.buffer_start += drop as i64;
        self.skip = self.hop_size - drop;
    }
}
