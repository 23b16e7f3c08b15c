//! External decoder backends
//!
//! A backend only knows how to turn a source path and a [`StreamConfig`] into
//! a command line that writes raw interleaved PCM to stdout. Spawning and
//! reading the process is [`ProcessSession`](super::ProcessSession)'s job.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::config::{SampleFormat, StreamConfig};
use crate::error::Result;

/// Environment variable overriding the SoX binary
pub const SOX_PATH_ENV: &str = "SOXFRAME_SOX_PATH";

/// Environment variable overriding the ffmpeg binary
pub const FFMPEG_PATH_ENV: &str = "SOXFRAME_FFMPEG_PATH";

/// A command-line program that decodes audio files to raw PCM on stdout
pub trait DecoderBackend: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Program to execute
    fn program(&self) -> &Path;

    /// Arguments selecting the source and the raw output format
    fn args(&self, source: &Path, config: &StreamConfig) -> Result<Vec<OsString>>;

    /// Arguments for a cheap invocation that succeeds when the program works
    fn probe_args(&self) -> Vec<OsString> {
        Vec::new()
    }

    /// Whether the program can be started and answers the probe
    fn is_available(&self) -> bool {
        let status = Command::new(self.program())
            .args(self.probe_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("{} probe failed: {}", self.name(), e);
                false
            }
        }
    }
}

/// Program named by environment variable `var`, or `fallback` when unset or empty
pub(crate) fn program_from_env(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// SoX, the Swiss Army knife of sound processing
#[derive(Debug, Clone)]
pub struct SoxDecoder {
    program: PathBuf,
}

impl SoxDecoder {
    /// Use `$SOXFRAME_SOX_PATH`, or `sox` from `PATH`
    pub fn new() -> Self {
        Self {
            program: program_from_env(SOX_PATH_ENV, "sox"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SoxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderBackend for SoxDecoder {
    fn name(&self) -> &str {
        "sox"
    }

    fn program(&self) -> &Path {
        &self.program
    }

    fn args(&self, source: &Path, config: &StreamConfig) -> Result<Vec<OsString>> {
        let encoding = if config.format.is_float() {
            "floating-point"
        } else {
            "signed-integer"
        };

        let mut args: Vec<OsString> = vec![
            "-D".into(),
            "-V1".into(),
            source.as_os_str().to_owned(),
        ];
        args.extend(
            [
                "-t".to_string(),
                "raw".to_string(),
                "-e".to_string(),
                encoding.to_string(),
                "-b".to_string(),
                config.format.bit_depth().to_string(),
                "-c".to_string(),
                config.channels.to_string(),
                "-r".to_string(),
                config.sample_rate.to_string(),
                "-L".to_string(),
                "-".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        Ok(args)
    }

    fn probe_args(&self) -> Vec<OsString> {
        vec!["--version".into()]
    }
}

/// ffmpeg, for containers SoX was not built with
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: PathBuf,
}

impl FfmpegDecoder {
    /// Use `$SOXFRAME_FFMPEG_PATH`, or `ffmpeg` from `PATH`
    pub fn new() -> Self {
        Self {
            program: program_from_env(FFMPEG_PATH_ENV, "ffmpeg"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn raw_format(format: SampleFormat) -> &'static str {
        match format {
            SampleFormat::S8 => "s8",
            SampleFormat::S16 => "s16le",
            SampleFormat::S24 => "s24le",
            SampleFormat::S32 => "s32le",
            SampleFormat::F32 => "f32le",
        }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderBackend for FfmpegDecoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn program(&self) -> &Path {
        &self.program
    }

    fn args(&self, source: &Path, config: &StreamConfig) -> Result<Vec<OsString>> {
        let mut args: Vec<OsString> = ["-nostdin", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_owned());
        args.extend(
            [
                "-vn".to_string(),
                "-f".to_string(),
                Self::raw_format(config.format).to_string(),
                "-ac".to_string(),
                config.channels.to_string(),
                "-ar".to_string(),
                config.sample_rate.to_string(),
                "-".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        Ok(args)
    }

    fn probe_args(&self) -> Vec<OsString> {
        vec!["-version".into()]
    }
}
