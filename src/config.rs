//! Stream configuration
//!
//! Describes what the decoder should emit (rate, channels, sample format) and
//! how the framer slices it (frame size, hop, final frame, window). A config
//! is checked once with [`StreamConfig::validate`] before any process is
//! spawned.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoxFrameError};

/// Default target sample rate (CD quality)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default frame length in samples per channel
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Default bound on a single pipe read
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// Default pipe read size in bytes
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Upper bound on the samples held by one frame, summed over channels
pub const MAX_FRAME_SAMPLES: usize = 1 << 26;

/// Raw PCM sample encoding requested from the decoder
///
/// Integer formats are signed little-endian; `F32` is little-endian IEEE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    S8,
    #[default]
    S16,
    S24,
    S32,
    F32,
}

impl SampleFormat {
    /// Bits per sample
    pub fn bit_depth(self) -> u16 {
        match self {
            SampleFormat::S8 => 8,
            SampleFormat::S16 => 16,
            SampleFormat::S24 => 24,
            SampleFormat::S32 | SampleFormat::F32 => 32,
        }
    }

    /// Bytes per sample
    pub fn bytes_per_sample(self) -> usize {
        self.bit_depth() as usize / 8
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleFormat::F32)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::S8 => write!(f, "s8"),
            SampleFormat::S16 => write!(f, "s16"),
            SampleFormat::S24 => write!(f, "s24"),
            SampleFormat::S32 => write!(f, "s32"),
            SampleFormat::F32 => write!(f, "f32"),
        }
    }
}

impl FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s8" | "8" => Ok(SampleFormat::S8),
            "s16" | "16" => Ok(SampleFormat::S16),
            "s24" | "24" => Ok(SampleFormat::S24),
            "s32" | "32" => Ok(SampleFormat::S32),
            "f32" | "float" => Ok(SampleFormat::F32),
            other => Err(format!(
                "unknown sample format '{}' (expected s8, s16, s24, s32 or f32)",
                other
            )),
        }
    }
}

/// How far consecutive frames advance
///
/// Mirrors the usual ways of describing striding: an explicit sample count,
/// a fractional overlap between neighbouring frames, or a frame rate in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hop {
    /// Advance a fixed number of samples
    Samples(usize),
    /// Fraction of the frame shared with the next frame, in `[0, 1)`
    Overlap(f64),
    /// Frames per second
    FrameRate(f64),
}

impl Default for Hop {
    fn default() -> Self {
        Hop::Overlap(0.5)
    }
}

impl Hop {
    /// Resolve to an integer hop in samples
    pub fn resolve(self, frame_size: usize, sample_rate: u32) -> Result<usize> {
        let hop = match self {
            Hop::Samples(n) => n,
            Hop::Overlap(ratio) => {
                if !ratio.is_finite() || !(0.0..1.0).contains(&ratio) {
                    return Err(SoxFrameError::invalid(format!(
                        "overlap must lie in [0, 1), got {}",
                        ratio
                    )));
                }
                (frame_size as f64 * (1.0 - ratio)).round() as usize
            }
            Hop::FrameRate(hz) => {
                if !hz.is_finite() || hz <= 0.0 {
                    return Err(SoxFrameError::invalid(format!(
                        "frame rate must be positive, got {}",
                        hz
                    )));
                }
                (sample_rate as f64 / hz).round() as usize
            }
        };

        if hop == 0 {
            return Err(SoxFrameError::invalid(format!(
                "hop size must be positive ({:?} resolves to 0 samples)",
                self
            )));
        }
        Ok(hop)
    }
}

/// What to do with samples left over once the decoder is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalFrame {
    /// Emit a full-length frame, zero-filled past the end of the signal
    #[default]
    ZeroPad,
    /// Emit a frame holding only the remaining samples
    Short,
    /// Drop the remainder
    Discard,
}

impl fmt::Display for FinalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalFrame::ZeroPad => write!(f, "zero-pad"),
            FinalFrame::Short => write!(f, "short"),
            FinalFrame::Discard => write!(f, "discard"),
        }
    }
}

impl FromStr for FinalFrame {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "zero-pad" | "pad" => Ok(FinalFrame::ZeroPad),
            "short" => Ok(FinalFrame::Short),
            "discard" | "drop" => Ok(FinalFrame::Discard),
            other => Err(format!(
                "unknown final frame policy '{}' (expected zero-pad, short or discard)",
                other
            )),
        }
    }
}

/// Where each frame sits relative to its nominal position `index * hop`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// The frame starts at the position
    #[default]
    Left,
    /// The frame is centred on the position
    Center,
    /// The frame ends at the position
    Right,
}

impl Alignment {
    /// Samples the frame start lies before its nominal position
    pub fn shift(self, frame_size: usize) -> usize {
        match self {
            Alignment::Left => 0,
            Alignment::Center => frame_size / 2,
            Alignment::Right => frame_size,
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Left => write!(f, "left"),
            Alignment::Center => write!(f, "center"),
            Alignment::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Alignment::Left),
            "center" | "centre" => Ok(Alignment::Center),
            "right" => Ok(Alignment::Right),
            other => Err(format!(
                "unknown alignment '{}' (expected left, center or right)",
                other
            )),
        }
    }
}

/// Analysis window applied to every emitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    #[default]
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    Nuttall,
    Triangular,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Window::Rectangular => "rectangular",
            Window::Hann => "hann",
            Window::Hamming => "hamming",
            Window::Blackman => "blackman",
            Window::Nuttall => "nuttall",
            Window::Triangular => "triangular",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "none" => Ok(Window::Rectangular),
            "hann" | "hanning" => Ok(Window::Hann),
            "hamming" => Ok(Window::Hamming),
            "blackman" => Ok(Window::Blackman),
            "nuttall" => Ok(Window::Nuttall),
            "triangular" | "bartlett" => Ok(Window::Triangular),
            other => Err(format!("unknown window '{}'", other)),
        }
    }
}

/// Which decoder produces the sample stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    #[default]
    Sox,
    Ffmpeg,
    /// In-process WAV decoding; the file must already match the config
    NativeWav,
    /// Native WAV when the file already matches, SoX otherwise
    Auto,
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKind::Sox => write!(f, "sox"),
            DecoderKind::Ffmpeg => write!(f, "ffmpeg"),
            DecoderKind::NativeWav => write!(f, "native-wav"),
            DecoderKind::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for DecoderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "sox" => Ok(DecoderKind::Sox),
            "ffmpeg" => Ok(DecoderKind::Ffmpeg),
            "native-wav" | "wav" | "native" => Ok(DecoderKind::NativeWav),
            "auto" => Ok(DecoderKind::Auto),
            other => Err(format!("unknown decoder '{}'", other)),
        }
    }
}

/// Full configuration of one decoding session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Target channel count
    pub channels: u16,
    /// Raw sample encoding on the decoder pipe
    pub format: SampleFormat,
    /// Samples per channel in every full frame
    pub frame_size: usize,
    /// Advance between consecutive frame starts
    pub hop: Hop,
    pub final_frame: FinalFrame,
    pub window: Window,
    pub alignment: Alignment,
    /// Shift of every frame in seconds; negative values move frames earlier
    pub offset_secs: f64,
    /// Upper bound on a single pipe read; `None` blocks indefinitely
    pub read_timeout_ms: Option<u64>,
    pub decoder: DecoderKind,
    /// Bytes requested per pipe read
    pub chunk_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            format: SampleFormat::default(),
            frame_size: DEFAULT_FRAME_SIZE,
            hop: Hop::default(),
            final_frame: FinalFrame::default(),
            window: Window::default(),
            alignment: Alignment::default(),
            offset_secs: 0.0,
            read_timeout_ms: Some(DEFAULT_READ_TIMEOUT_MS),
            decoder: DecoderKind::default(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl StreamConfig {
    /// Create a config with the given frame size and default everything else
    pub fn new(frame_size: usize) -> Self {
        StreamConfig {
            frame_size,
            ..Default::default()
        }
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Set the hop as an explicit sample count
    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop = Hop::Samples(hop_size);
        self
    }

    pub fn with_hop(mut self, hop: Hop) -> Self {
        self.hop = hop;
        self
    }

    pub fn with_final_frame(mut self, final_frame: FinalFrame) -> Self {
        self.final_frame = final_frame;
        self
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_offset_secs(mut self, offset_secs: f64) -> Self {
        self.offset_secs = offset_secs;
        self
    }

    /// Set the per-read timeout, rounded up to whole milliseconds
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout_ms = timeout.map(|t| {
            let millis = t.as_nanos().div_ceil(1_000_000);
            u64::try_from(millis).unwrap_or(u64::MAX)
        });
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderKind) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Hop in samples; fails the same way [`validate`](Self::validate) does
    pub fn hop_size(&self) -> Result<usize> {
        self.hop.resolve(self.frame_size, self.sample_rate)
    }

    /// Offset of the first frame's start from the first decoded sample
    ///
    /// Negative values mean the first frames begin with zeros standing in for
    /// samples before the start of the signal; positive values skip samples.
    pub fn lead_samples(&self) -> i64 {
        let offset = (self.offset_secs * self.sample_rate as f64).round() as i64;
        offset.saturating_sub(self.alignment.shift(self.frame_size) as i64)
    }

    /// Bytes in one interleaved sample frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Check every parameter and return the resolved hop size
    pub fn validate(&self) -> Result<usize> {
        if self.frame_size == 0 {
            return Err(SoxFrameError::invalid("frame size must be positive"));
        }
        if self.channels == 0 {
            return Err(SoxFrameError::invalid("channel count must be positive"));
        }
        if self.frame_size.saturating_mul(self.channels as usize) > MAX_FRAME_SAMPLES {
            return Err(SoxFrameError::invalid(format!(
                "frame of {} samples x {} channels exceeds the limit of {} samples",
                self.frame_size, self.channels, MAX_FRAME_SAMPLES
            )));
        }
        if self.sample_rate == 0 {
            return Err(SoxFrameError::invalid("sample rate must be positive"));
        }
        if self.chunk_bytes == 0 {
            return Err(SoxFrameError::invalid("read chunk size must be positive"));
        }
        if self.read_timeout_ms == Some(0) {
            return Err(SoxFrameError::invalid(
                "read timeout must be positive (use none to disable it)",
            ));
        }
        if !self.offset_secs.is_finite() {
            return Err(SoxFrameError::invalid(format!(
                "frame offset must be finite, got {}",
                self.offset_secs
            )));
        }
        let leading_zeros = self.lead_samples().min(0).unsigned_abs();
        if leading_zeros.saturating_mul(self.channels as u64) > MAX_FRAME_SAMPLES as u64 {
            return Err(SoxFrameError::invalid(format!(
                "offset of {} s pads {} samples before the signal",
                self.offset_secs, leading_zeros
            )));
        }
        self.hop_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 1);
        assert_eq!(config.format, SampleFormat::S16);
        assert_eq!(config.final_frame, FinalFrame::ZeroPad);
        assert_eq!(config.validate().unwrap(), 1024);
    }

    #[test_case(Hop::Samples(256), 256 ; "explicit samples")]
    #[test_case(Hop::Overlap(0.0), 1000 ; "no overlap")]
    #[test_case(Hop::Overlap(0.6), 400 ; "sixty percent overlap")]
    #[test_case(Hop::FrameRate(10.0), 1600 ; "ten frames per second")]
    fn test_hop_resolution(hop: Hop, expected: usize) {
        let config = StreamConfig::new(1000)
            .with_sample_rate(16000)
            .with_hop(hop);
        assert_eq!(config.validate().unwrap(), expected);
    }

    #[test_case(StreamConfig::new(0) ; "zero frame size")]
    #[test_case(StreamConfig::default().with_channels(0) ; "zero channels")]
    #[test_case(StreamConfig::default().with_sample_rate(0) ; "zero sample rate")]
    #[test_case(StreamConfig::default().with_hop_size(0) ; "zero hop")]
    #[test_case(StreamConfig::default().with_hop(Hop::Overlap(1.0)) ; "full overlap")]
    #[test_case(StreamConfig::default().with_hop(Hop::Overlap(f64::NAN)) ; "nan overlap")]
    #[test_case(StreamConfig::default().with_hop(Hop::FrameRate(-3.0)) ; "negative frame rate")]
    #[test_case(StreamConfig::default().with_chunk_bytes(0) ; "zero chunk")]
    #[test_case(StreamConfig::default().with_read_timeout(Some(Duration::ZERO)) ; "zero timeout")]
    #[test_case(StreamConfig::new(usize::MAX / 2 + 1).with_hop_size(4) ; "frame size overflowing buffers")]
    #[test_case(StreamConfig::new(1 << 36) ; "frame size too large to allocate")]
    #[test_case(StreamConfig::new(MAX_FRAME_SAMPLES / 2 + 1).with_channels(2) ; "stereo frame over the limit")]
    #[test_case(StreamConfig::default().with_offset_secs(f64::INFINITY) ; "infinite offset")]
    #[test_case(StreamConfig::default().with_offset_secs(-1e9) ; "offset padding too long")]
    fn test_invalid_configs(config: StreamConfig) {
        match config.validate() {
            Err(SoxFrameError::ConfigurationInvalid { .. }) => {}
            other => panic!("Expected ConfigurationInvalid, got: {:?}", other),
        }
    }

    #[test]
    fn test_largest_frame_is_accepted() {
        let config = StreamConfig::new(MAX_FRAME_SAMPLES).with_hop_size(4);
        assert_eq!(config.validate().unwrap(), 4);
    }

    #[test]
    fn test_sub_millisecond_timeout_rounds_up() {
        let config = StreamConfig::default().with_read_timeout(Some(Duration::from_micros(300)));
        assert_eq!(config.read_timeout_ms, Some(1));
        assert!(config.validate().is_ok());

        let config = StreamConfig::default().with_read_timeout(Some(Duration::from_micros(2001)));
        assert_eq!(config.read_timeout_ms, Some(3));

        let config = StreamConfig::default().with_read_timeout(Some(Duration::MAX));
        assert_eq!(config.read_timeout_ms, Some(u64::MAX));
    }

    #[test_case(Alignment::Left, 0.0, 0 ; "left")]
    #[test_case(Alignment::Center, 0.0, -50 ; "center")]
    #[test_case(Alignment::Right, 0.0, -100 ; "right")]
    #[test_case(Alignment::Left, 0.01, 80 ; "left with offset")]
    #[test_case(Alignment::Center, -0.005, -90 ; "center with negative offset")]
    fn test_lead_samples(alignment: Alignment, offset_secs: f64, expected: i64) {
        let config = StreamConfig::new(100)
            .with_sample_rate(8000)
            .with_alignment(alignment)
            .with_offset_secs(offset_secs);
        assert_eq!(config.lead_samples(), expected);
    }

    #[test]
    fn test_sample_format_sizes() {
        assert_eq!(SampleFormat::S8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S24.bytes_per_sample(), 3);
        assert_eq!(SampleFormat::F32.bit_depth(), 32);

        let stereo = StreamConfig::default()
            .with_channels(2)
            .with_format(SampleFormat::S24);
        assert_eq!(stereo.bytes_per_frame(), 6);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("F32".parse::<SampleFormat>().unwrap(), SampleFormat::F32);
        assert_eq!("zero_pad".parse::<FinalFrame>().unwrap(), FinalFrame::ZeroPad);
        assert_eq!("hanning".parse::<Window>().unwrap(), Window::Hann);
        assert_eq!("native-wav".parse::<DecoderKind>().unwrap(), DecoderKind::NativeWav);
        assert_eq!("centre".parse::<Alignment>().unwrap(), Alignment::Center);
        assert!("mp3".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"frame_size": 512, "hop": {"samples": 128}, "window": "hann"}"#)
                .unwrap();
        assert_eq!(config.frame_size, 512);
        assert_eq!(config.hop, Hop::Samples(128));
        assert_eq!(config.window, Window::Hann);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        let config = StreamConfig::new(64)
            .with_channels(2)
            .with_hop(Hop::FrameRate(50.0))
            .with_decoder(DecoderKind::Ffmpeg);
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(StreamConfig::from_json_file(&path).unwrap(), config);
    }
}
