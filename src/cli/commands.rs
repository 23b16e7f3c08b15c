//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::io::Write;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::decode::{DecoderBackend, FfmpegDecoder, SoxDecoder};
use crate::error::Result;
use crate::framing::Frame;
use crate::probe::probe_source;
use crate::reader::FrameReader;

use super::StreamArgs;

/// One output line of the `frames` command
#[derive(Debug, Serialize)]
struct FrameSummary {
    index: usize,
    start: i64,
    start_secs: f64,
    len: usize,
    valid_len: usize,
    rms: f32,
    peak: f32,
}

impl FrameSummary {
    fn new(frame: &Frame, sample_rate: u32) -> Self {
        FrameSummary {
            index: frame.index,
            start: frame.start,
            start_secs: frame.start_secs(sample_rate),
            len: frame.len(),
            valid_len: frame.valid_len,
            rms: frame.rms(),
            peak: frame.peak(),
        }
    }

    fn table_header() -> String {
        format!(
            "{:>8} {:>12} {:>6} {:>6} {:>10} {:>10}",
            "index", "start_s", "len", "valid", "rms", "peak"
        )
    }

    fn table_row(&self) -> String {
        format!(
            "{:>8} {:>12.4} {:>6} {:>6} {:>10.6} {:>10.6}",
            self.index, self.start_secs, self.len, self.valid_len, self.rms, self.peak
        )
    }
}

/// Stream a file and print a summary of every frame.
pub fn frames(path: &Path, stream: &StreamArgs, json: bool) -> Result<()> {
    let config = stream.to_config()?;
    let sample_rate = config.sample_rate;
    let reader = FrameReader::open(path, config)?;

    info!(
        "Reading {} (frame {}, hop {})",
        path.display(),
        reader.frame_size(),
        reader.hop_size()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if !json {
        writeln!(out, "{}", FrameSummary::table_header())?;
    }

    let mut count = 0usize;
    for frame in reader {
        let summary = FrameSummary::new(&frame?, sample_rate);
        if json {
            writeln!(out, "{}", serde_json::to_string(&summary)?)?;
        } else {
            writeln!(out, "{}", summary.table_row())?;
        }
        count += 1;
    }

    info!("{} frames", count);
    Ok(())
}

/// Print header information for a file.
pub fn info(path: &Path, json: bool) -> Result<()> {
    let info = probe_source(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File:        {}", path.display());
    println!("Channels:    {}", info.channels);
    println!("Sample rate: {}", info.sample_rate);
    if let Some(precision) = info.precision {
        println!("Precision:   {}-bit", precision);
    }
    if let Some(secs) = info.duration_secs {
        match info.duration_samples {
            Some(samples) => println!("Duration:    {:.3}s ({} samples)", secs, samples),
            None => println!("Duration:    {:.3}s", secs),
        }
    }
    if let Some(encoding) = &info.encoding {
        println!("Encoding:    {}", encoding);
    }

    Ok(())
}

/// Report decoder availability.
pub fn check() -> Result<()> {
    let backends: [Box<dyn DecoderBackend>; 2] =
        [Box::new(SoxDecoder::new()), Box::new(FfmpegDecoder::new())];

    let mut any = false;
    for backend in &backends {
        let available = backend.is_available();
        any |= available;
        println!(
            "{:<8} {:<40} {}",
            backend.name(),
            backend.program().display(),
            if available { "ok" } else { "not found" }
        );
    }

    if !any {
        warn!("No external decoder found; only native WAV decoding will work");
    }
    Ok(())
}
