//! In-process WAV decoding
//!
//! When a WAV file is already at the requested rate, channel count and sample
//! format there is nothing for an external converter to do, so the samples are
//! read directly with hound.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat as WavSampleFormat, WavReader, WavSpec};
use log::debug;

use super::DecodeSession;
use crate::config::{SampleFormat, StreamConfig};
use crate::error::{Result, SoxFrameError};

/// Map a WAV header to the equivalent raw sample format
pub fn sample_format_of(spec: &WavSpec) -> Option<SampleFormat> {
    match (spec.sample_format, spec.bits_per_sample) {
        (WavSampleFormat::Int, 8) => Some(SampleFormat::S8),
        (WavSampleFormat::Int, 16) => Some(SampleFormat::S16),
        (WavSampleFormat::Int, 24) => Some(SampleFormat::S24),
        (WavSampleFormat::Int, 32) => Some(SampleFormat::S32),
        (WavSampleFormat::Float, 32) => Some(SampleFormat::F32),
        _ => None,
    }
}

fn spec_matches(spec: &WavSpec, config: &StreamConfig) -> bool {
    spec.sample_rate == config.sample_rate
        && spec.channels == config.channels
        && sample_format_of(spec) == Some(config.format)
}

/// Whether `path` is a WAV file that needs no conversion for `config`
pub fn wav_matches(path: &Path, config: &StreamConfig) -> bool {
    match WavReader::open(path) {
        Ok(reader) => spec_matches(&reader.spec(), config),
        Err(_) => false,
    }
}

/// Decoding session reading a WAV file with hound
pub struct WavSession {
    reader: Option<WavReader<BufReader<File>>>,
    format: SampleFormat,
    chunk_samples: usize,
}

impl WavSession {
    /// Open `path`; the file must match `config` exactly
    pub fn open(path: &Path, config: &StreamConfig) -> Result<Self> {
        let reader = WavReader::open(path).map_err(|e| SoxFrameError::SourceUnreadable {
            path: path.display().to_string(),
            reason: format!("not a readable WAV file: {}", e),
        })?;

        let spec = reader.spec();
        if !spec_matches(&spec, config) {
            return Err(SoxFrameError::invalid(format!(
                "native WAV decoding needs {} Hz / {} ch / {}, file is {} Hz / {} ch / {}-bit {:?}",
                config.sample_rate,
                config.channels,
                config.format,
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        debug!(
            "Reading {} natively ({} samples)",
            path.display(),
            reader.len()
        );

        let bytes_per_frame = config.bytes_per_frame().max(1);
        let frames_per_chunk = (config.chunk_bytes / bytes_per_frame).max(1);

        Ok(WavSession {
            reader: Some(reader),
            format: config.format,
            chunk_samples: frames_per_chunk * config.channels as usize,
        })
    }
}

fn read_chunk<S, F>(
    reader: &mut WavReader<BufReader<File>>,
    count: usize,
    scale: F,
) -> Result<Vec<f32>>
where
    S: hound::Sample,
    F: Fn(S) -> f32,
{
    reader
        .samples::<S>()
        .take(count)
        .map(|s| s.map(&scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| SoxFrameError::interrupted(format!("failed to read WAV samples: {}", e)))
}

impl DecodeSession for WavSession {
    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let n = self.chunk_samples;
        let chunk = match self.format {
            SampleFormat::S8 => read_chunk(reader, n, |v: i8| v as f32 / 128.0),
            SampleFormat::S16 => read_chunk(reader, n, |v: i16| v as f32 / 32768.0),
            SampleFormat::S24 => read_chunk(reader, n, |v: i32| v as f32 / 8388608.0),
            SampleFormat::S32 => read_chunk(reader, n, |v: i32| v as f32 / 2147483648.0),
            SampleFormat::F32 => read_chunk(reader, n, |v: f32| v),
        };

        match chunk {
            Ok(samples) if samples.is_empty() => {
                self.reader = None;
                Ok(None)
            }
            Ok(samples) => Ok(Some(samples)),
            Err(e) => {
                self.reader = None;
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
