//! Decoding sessions
//!
//! A session turns a source file into a stream of interleaved `f32` chunks:
//! - [`ProcessSession`] drives an external decoder ([`SoxDecoder`],
//!   [`FfmpegDecoder`] or any other [`DecoderBackend`])
//! - [`WavSession`] reads WAV files that already match the config in-process

pub mod backend;
pub mod native;
pub mod pcm;
pub mod process;

use std::path::Path;

use log::debug;

pub use backend::{DecoderBackend, FfmpegDecoder, SoxDecoder, FFMPEG_PATH_ENV, SOX_PATH_ENV};
pub use native::{wav_matches, WavSession};
pub use pcm::PcmDecoder;
pub use process::ProcessSession;

use crate::config::{DecoderKind, StreamConfig};
use crate::error::Result;

/// A source of decoded, interleaved samples
pub trait DecodeSession: Send {
    /// Next chunk of whole interleaved sample frames, or `None` once exhausted
    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>>;

    /// Release every resource held by the session; later reads return `None`
    fn close(&mut self);
}

/// Start the session selected by `config.decoder`
pub fn open_session(source: &Path, config: &StreamConfig) -> Result<Box<dyn DecodeSession>> {
    match config.decoder {
        DecoderKind::Sox => spawn_backend(&SoxDecoder::new(), source, config),
        DecoderKind::Ffmpeg => spawn_backend(&FfmpegDecoder::new(), source, config),
        DecoderKind::NativeWav => Ok(Box::new(WavSession::open(source, config)?)),
        DecoderKind::Auto => {
            if wav_matches(source, config) {
                debug!("{} already matches the stream format", source.display());
                Ok(Box::new(WavSession::open(source, config)?))
            } else {
                spawn_backend(&SoxDecoder::new(), source, config)
            }
        }
    }
}

/// Start an external decoder session for `backend`
pub fn spawn_backend(
    backend: &dyn DecoderBackend,
    source: &Path,
    config: &StreamConfig,
) -> Result<Box<dyn DecodeSession>> {
    Ok(Box::new(ProcessSession::spawn(backend, source, config)?))
}
