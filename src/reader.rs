//! Streaming frame reader
//!
//! [`FrameReader`] is the caller-facing handle for one decoding session. It
//! pulls chunks from the session only when the framer has no complete frame
//! left, so at most one chunk plus one frame is held in memory regardless of
//! the length of the recording.
//!
//! Lifecycle: `Opening → Streaming → Draining → Closed`. Every path ends in
//! `Closed`, which releases the decoder. Errors close the reader too; frames
//! yielded before an error stay valid.

use std::fmt;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::StreamConfig;
use crate::decode::{self, DecodeSession, DecoderBackend};
use crate::error::{Result, SoxFrameError};
use crate::framing::{Frame, Framer};

/// Lifecycle of a [`FrameReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// Config validated, decoder being started
    #[default]
    Opening,
    /// Decoder running, frames produced as data arrives
    Streaming,
    /// Decoder exhausted, final frame pending
    Draining,
    /// Decoder released; the iterator only returns `None`
    Closed,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderState::Opening => write!(f, "Opening"),
            ReaderState::Streaming => write!(f, "Streaming"),
            ReaderState::Draining => write!(f, "Draining"),
            ReaderState::Closed => write!(f, "Closed"),
        }
    }
}

/// Lazy, forward-only sequence of frames from one audio source
///
/// Every call to an `open*` constructor starts a fresh decoding session;
/// reopening the same source with the same config yields the same frames.
///
/// # Example
/// ```no_run
/// use soxframe::{FrameReader, StreamConfig};
///
/// let config = StreamConfig::new(1024).with_hop_size(512).with_sample_rate(16000);
/// for frame in FrameReader::open("speech.flac", config)? {
///     let frame = frame?;
///     println!("{} {:.4}", frame.start, frame.rms());
/// }
/// # Ok::<(), soxframe::SoxFrameError>(())
/// ```
pub struct FrameReader {
    source: PathBuf,
    config: StreamConfig,
    framer: Framer,
    session: Option<Box<dyn DecodeSession>>,
    state: ReaderState,
}

impl FrameReader {
    /// Open `source` with the decoder selected by `config.decoder`
    ///
    /// # Errors
    /// * `ConfigurationInvalid` - bad parameters; nothing is spawned
    /// * `SourceUnreadable` - the path does not exist or is not a file
    /// * `DecoderUnavailable` - the decoder program cannot be started
    pub fn open(source: impl AsRef<Path>, config: StreamConfig) -> Result<Self> {
        Self::open_with(source.as_ref(), config, decode::open_session)
    }

    /// Open `source` with an explicit external decoder backend
    pub fn with_backend(
        source: impl AsRef<Path>,
        config: StreamConfig,
        backend: &dyn DecoderBackend,
    ) -> Result<Self> {
        Self::open_with(source.as_ref(), config, |path, config| {
            decode::spawn_backend(backend, path, config)
        })
    }

    fn open_with<F>(source: &Path, config: StreamConfig, start: F) -> Result<Self>
    where
        F: FnOnce(&Path, &StreamConfig) -> Result<Box<dyn DecodeSession>>,
    {
        // Validation comes first so a bad config never allocates anything
        let framer = Framer::from_config(&config)?;
        check_source(source)?;

        let mut reader = FrameReader {
            source: source.to_path_buf(),
            config,
            framer,
            session: None,
            state: ReaderState::Opening,
        };
        debug!(
            "Opening {} (frame {}, hop {}, {} Hz, {} ch, {}, decoder {})",
            source.display(),
            reader.framer.frame_size(),
            reader.framer.hop_size(),
            reader.config.sample_rate,
            reader.config.channels,
            reader.config.format,
            reader.config.decoder
        );

        reader.session = Some(start(source, &reader.config)?);
        reader.transition(ReaderState::Streaming);
        Ok(reader)
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn frame_size(&self) -> usize {
        self.framer.frame_size()
    }

    /// Resolved hop in samples
    pub fn hop_size(&self) -> usize {
        self.framer.hop_size()
    }

    /// Samples per channel decoded so far
    pub fn samples_decoded(&self) -> u64 {
        self.framer.received()
    }

    /// Stop reading and release the decoder; idempotent
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.transition(ReaderState::Closed);
    }

    fn transition(&mut self, next: ReaderState) {
        if self.state != next {
            debug!(
                "[READER] {}: {} -> {}",
                self.source.display(),
                self.state,
                next
            );
            self.state = next;
        }
    }
}

fn check_source(source: &Path) -> Result<()> {
    let unreadable = |reason: String| SoxFrameError::SourceUnreadable {
        path: source.display().to_string(),
        reason,
    };

    match std::fs::metadata(source) {
        Ok(meta) if meta.is_dir() => Err(unreadable("is a directory".to_string())),
        Ok(_) => Ok(()),
        Err(e) => Err(unreadable(e.to_string())),
    }
}

impl Iterator for FrameReader {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                ReaderState::Opening | ReaderState::Closed => return None,
                ReaderState::Draining => {
                    let last = self.framer.finish();
                    self.close();
                    return last.map(Ok);
                }
                ReaderState::Streaming => {
                    if let Some(frame) = self.framer.pop_frame() {
                        return Some(Ok(frame));
                    }

                    let Some(session) = self.session.as_mut() else {
                        self.close();
                        return None;
                    };

                    match session.next_chunk() {
                        Ok(Some(chunk)) => self.framer.push(&chunk),
                        Ok(None) => self.transition(ReaderState::Draining),
                        Err(e) => {
                            self.close();
                            return Some(Err(e));
                        }
                    }
                }
            }
        }
    }
}

impl FusedIterator for FrameReader {}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReader")
            .field("source", &self.source)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DecoderKind, FinalFrame};
    use hound::{SampleFormat as WavSampleFormat, WavSpec, WavWriter};

    fn write_ramp_wav(path: &Path, rate: u32, n: usize) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: WavSampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..n {
            writer.write_sample((i as i16) * 1024).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn native(frame_size: usize, hop_size: usize) -> StreamConfig {
        StreamConfig::new(frame_size)
            .with_hop_size(hop_size)
            .with_sample_rate(8)
            .with_decoder(DecoderKind::NativeWav)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReaderState::Streaming.to_string(), "Streaming");
        assert_eq!(ReaderState::default(), ReaderState::Opening);
    }

    #[test]
    fn test_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        write_ramp_wav(&path, 8, 8);

        let mut reader = FrameReader::open(&path, native(4, 4)).unwrap();
        assert_eq!(reader.state(), ReaderState::Streaming);

        assert_eq!(reader.next().unwrap().unwrap().start, 0);
        assert_eq!(reader.next().unwrap().unwrap().start, 4);
        assert!(reader.next().is_none());
        assert_eq!(reader.state(), ReaderState::Closed);
        assert_eq!(reader.samples_decoded(), 8);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_close_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        write_ramp_wav(&path, 8, 32);

        let mut reader = FrameReader::open(&path, native(4, 2)).unwrap();
        assert!(reader.next().is_some());
        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_missing_source() {
        match FrameReader::open("/nonexistent/path/audio.flac", StreamConfig::default()) {
            Err(SoxFrameError::SourceUnreadable { path, .. }) => {
                assert!(path.contains("nonexistent"));
            }
            other => panic!("Expected SourceUnreadable, got: {:?}", other),
        }
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FrameReader::open(dir.path(), StreamConfig::default()),
            Err(SoxFrameError::SourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_invalid_config_checked_before_source() {
        // Even a missing source reports the config problem first
        let result = FrameReader::open("/nonexistent.wav", StreamConfig::new(0));
        assert!(matches!(
            result,
            Err(SoxFrameError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn test_short_final_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        write_ramp_wav(&path, 8, 10);

        let config = native(4, 4).with_final_frame(FinalFrame::Short);
        let frames: Vec<Frame> = FrameReader::open(&path, config)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].len(), 2);
    }
}
