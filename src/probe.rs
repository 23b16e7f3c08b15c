//! Source header inspection
//!
//! WAV headers are read directly; anything else is handed to `soxi`.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use hound::WavReader;
use log::debug;
use serde::Serialize;

use crate::decode::backend::program_from_env;
use crate::decode::native::sample_format_of;
use crate::error::{Result, SoxFrameError};

/// Environment variable overriding the soxi binary
pub const SOXI_PATH_ENV: &str = "SOXFRAME_SOXI_PATH";

/// What a source file declares about itself
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceInfo {
    pub channels: u16,
    pub sample_rate: u32,
    /// Bits per sample
    pub precision: Option<u16>,
    /// Length in samples per channel
    pub duration_samples: Option<u64>,
    pub duration_secs: Option<f64>,
    pub encoding: Option<String>,
    pub file_size: Option<String>,
    pub bit_rate: Option<String>,
}

/// Inspect `path` without decoding it
pub fn probe_source(path: impl AsRef<Path>) -> Result<SourceInfo> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SoxFrameError::SourceUnreadable {
            path: path.display().to_string(),
            reason: "no such file".to_string(),
        });
    }

    if let Ok(reader) = WavReader::open(path) {
        debug!("Probing {} as WAV", path.display());
        let spec = reader.spec();
        let frames = reader.duration() as u64;
        return Ok(SourceInfo {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            precision: Some(spec.bits_per_sample),
            duration_samples: Some(frames),
            duration_secs: Some(frames as f64 / spec.sample_rate as f64),
            encoding: sample_format_of(&spec).map(|f| f.to_string()),
            file_size: None,
            bit_rate: None,
        });
    }

    run_soxi(path)
}

fn run_soxi(path: &Path) -> Result<SourceInfo> {
    let program = program_from_env(SOXI_PATH_ENV, "soxi");

    debug!("Probing {} with {}", path.display(), program.display());
    let output = Command::new(&program)
        .arg(path)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => SoxFrameError::DecoderUnavailable {
                program: program.display().to_string(),
                source: Some(e),
            },
            _ => SoxFrameError::Io(e),
        })?;

    let unreadable = |reason: String| SoxFrameError::SourceUnreadable {
        path: path.display().to_string(),
        reason,
    };

    if !output.status.success() {
        return Err(unreadable(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_soxi_output(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| unreadable("unrecognized soxi output".to_string()))
}

/// Parse the `Key : Value` report printed by `soxi`
///
/// Returns `None` unless both channel count and sample rate are present.
pub fn parse_soxi_output(text: &str) -> Option<SourceInfo> {
    let mut info = SourceInfo::default();
    let mut has_channels = false;
    let mut has_rate = false;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "Channels" => {
                info.channels = value.parse().ok()?;
                has_channels = true;
            }
            "Sample Rate" => {
                info.sample_rate = value.parse().ok()?;
                has_rate = true;
            }
            "Precision" => {
                info.precision = value.split('-').next().and_then(|v| v.parse().ok());
            }
            "Duration" => {
                let (secs, samples) = parse_duration(value);
                info.duration_secs = secs;
                info.duration_samples = samples;
            }
            "Sample Encoding" => info.encoding = Some(value.to_string()),
            "File Size" => info.file_size = Some(value.to_string()),
            "Bit Rate" => info.bit_rate = Some(value.to_string()),
            _ => {}
        }
    }

    (has_channels && has_rate).then_some(info)
}

/// `00:03:25.12 = 9057792 samples ~ 15404.4 CDDA sectors`
fn parse_duration(value: &str) -> (Option<f64>, Option<u64>) {
    let mut parts = value.splitn(2, '=');
    let clock = parts.next().unwrap_or_default().trim();
    let samples = parts
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok());

    let fields: Vec<&str> = clock.split(':').collect();
    let secs = match fields.as_slice() {
        [h, m, s] => match (h.parse::<f64>(), m.parse::<f64>(), s.parse::<f64>()) {
            (Ok(h), Ok(m), Ok(s)) => Some(h * 3600.0 + m * 60.0 + s),
            _ => None,
        },
        _ => None,
    };

    (secs, samples)
}
