//! soxframe - Frame-based streaming audio reader
//!
//! Decodes audio files through an external converter (SoX by default,
//! ffmpeg optionally) and hands the decoded signal to the caller as a lazy
//! sequence of fixed-size, optionally overlapping frames.
//!
//! # Architecture
//!
//! - `decode`: decoder backends and sessions (child process or native WAV)
//! - `framing`: rolling-buffer framer, frame type and analysis windows
//! - `reader`: the caller-facing [`FrameReader`] iterator
//! - `signal` / `probe`: whole-file reads and header inspection

pub mod cli;
pub mod config;
pub mod decode;
pub mod error;
pub mod framing;
pub mod probe;
pub mod reader;
pub mod signal;

pub use config::{
    Alignment, DecoderKind, FinalFrame, Hop, SampleFormat, StreamConfig, Window,
};
pub use decode::{DecodeSession, DecoderBackend, FfmpegDecoder, SoxDecoder};
pub use error::{Result, SoxFrameError};
pub use framing::Frame;
pub use probe::{parse_soxi_output, probe_source, SourceInfo};
pub use reader::{FrameReader, ReaderState};
pub use signal::{read_signal, Signal};
