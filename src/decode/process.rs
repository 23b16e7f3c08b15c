//! Decoder child process session
//!
//! One [`ProcessSession`] owns one child process for its whole life. Stdout is
//! pumped by a helper thread into a bounded channel so every read can be
//! bounded by a timeout; stderr is collected by a second thread for error
//! messages. Releasing the session kills the child if it is still running,
//! reaps it, closes both pipes and joins both threads within a short grace
//! period. This happens on every exit path, including `Drop`.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::backend::DecoderBackend;
use super::pcm::PcmDecoder;
use super::DecodeSession;
use crate::config::StreamConfig;
use crate::error::{Result, SoxFrameError};

/// Chunks buffered between the pump thread and the reader
const CHANNEL_DEPTH: usize = 4;

/// Diagnostics kept from the decoder's stderr
const STDERR_TAIL_BYTES: usize = 2048;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long release waits for the pipe threads once the child is reaped
const HELPER_JOIN_GRACE: Duration = Duration::from_millis(200);

enum PipeMessage {
    Data(Vec<u8>),
    Eof,
    Failed(std::io::Error),
}

/// A running external decoder and the pipes attached to it
pub struct ProcessSession {
    name: String,
    source: PathBuf,
    child: Option<Child>,
    chunks: Option<Receiver<PipeMessage>>,
    pump: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<String>>,
    pcm: PcmDecoder,
    timeout: Option<Duration>,
    bytes_received: u64,
    finished: bool,
}

impl ProcessSession {
    /// Spawn `backend` for `source` and start pumping its output
    pub fn spawn(
        backend: &dyn DecoderBackend,
        source: &Path,
        config: &StreamConfig,
    ) -> Result<Self> {
        let mut command = Command::new(backend.program());
        command
            .args(backend.args(source, config)?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Spawning {}: {:?}", backend.name(), command);

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => SoxFrameError::DecoderUnavailable {
                program: backend.program().display().to_string(),
                source: Some(e),
            },
            _ => SoxFrameError::Io(e),
        })?;

        // From here on Drop cleans up the child if anything below fails
        let mut session = ProcessSession {
            name: backend.name().to_string(),
            source: source.to_path_buf(),
            child: Some(child),
            chunks: None,
            pump: None,
            stderr: None,
            pcm: PcmDecoder::new(config.format, config.channels),
            timeout: config.read_timeout(),
            bytes_received: 0,
            finished: false,
        };
        session.attach_pipes(config.chunk_bytes)?;

        Ok(session)
    }

    fn attach_pipes(&mut self, chunk_bytes: usize) -> Result<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| SoxFrameError::interrupted("decoder process already released"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SoxFrameError::interrupted("decoder stdout not available"))?;
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        self.chunks = Some(rx);
        self.pump = Some(
            thread::Builder::new()
                .name(format!("{}-stdout", self.name))
                .spawn(move || pump_stdout(stdout, tx, chunk_bytes))?,
        );

        if let Some(stderr) = stderr {
            self.stderr = Some(
                thread::Builder::new()
                    .name(format!("{}-stderr", self.name))
                    .spawn(move || collect_stderr(stderr))?,
            );
        }

        Ok(())
    }

    /// Total bytes read from the decoder so far
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Wait for the child after its stdout closed and judge the exit status
    fn finish_stream(&mut self) -> Result<()> {
        let status = self.wait_for_exit();
        let diagnostics = self.release();
        let status = status?;

        if !status.success() {
            let reason = if diagnostics.is_empty() {
                format!("{} exited with {}", self.name, status)
            } else {
                format!("{} exited with {}: {}", self.name, status, diagnostics)
            };
            warn!("{}", reason);

            return Err(if self.bytes_received == 0 {
                SoxFrameError::SourceUnreadable {
                    path: self.source.display().to_string(),
                    reason,
                }
            } else {
                SoxFrameError::interrupted(reason)
            });
        }

        if self.pcm.pending_bytes() > 0 {
            return Err(SoxFrameError::interrupted(format!(
                "{} output ended in the middle of a sample frame ({} stray bytes)",
                self.name,
                self.pcm.pending_bytes()
            )));
        }

        debug!(
            "{} finished cleanly after {} bytes",
            self.name, self.bytes_received
        );
        Ok(())
    }

    fn wait_for_exit(&mut self) -> Result<ExitStatus> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| SoxFrameError::interrupted("decoder process already released"))?;

        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(SoxFrameError::interrupted(format!(
                    "{} closed its output but did not exit within {} ms",
                    self.name,
                    timeout.as_millis()
                )));
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Kill (if needed) and reap the child, close pipes, join helper threads
    ///
    /// Returns whatever the decoder wrote to stderr. A grandchild of the
    /// decoder can keep the pipes open after the child is gone; helper threads
    /// still blocked in `read` after [`HELPER_JOIN_GRACE`] are detached and
    /// exit once the last writer closes its end.
    fn release(&mut self) -> String {
        if let Some(mut child) = self.child.take() {
            if !matches!(child.try_wait(), Ok(Some(_))) {
                debug!("Terminating {} (pid {})", self.name, child.id());
                let _ = child.kill();
            }
            let _ = child.wait();
        }

        // Dropping the receiver unblocks a pump thread stuck on a full channel
        self.chunks.take();

        let deadline = Instant::now() + HELPER_JOIN_GRACE;
        if let Some(pump) = self.pump.take() {
            join_until(pump, deadline, &self.name);
        }
        self.stderr
            .take()
            .and_then(|handle| join_until(handle, deadline, &self.name))
            .unwrap_or_default()
    }

    fn fail(&mut self, reason: String) -> SoxFrameError {
        warn!("{}", reason);
        self.finished = true;
        self.release();
        SoxFrameError::interrupted(reason)
    }
}

impl DecodeSession for ProcessSession {
    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let message = {
                let chunks = self
                    .chunks
                    .as_ref()
                    .ok_or_else(|| SoxFrameError::interrupted("decoder session closed"))?;
                match self.timeout {
                    Some(timeout) => chunks.recv_timeout(timeout),
                    None => chunks.recv().map_err(|_| RecvTimeoutError::Disconnected),
                }
            };

            match message {
                Ok(PipeMessage::Data(bytes)) => {
                    self.bytes_received += bytes.len() as u64;
                    let mut samples = Vec::new();
                    if self.pcm.decode(&bytes, &mut samples) > 0 {
                        return Ok(Some(samples));
                    }
                }
                Ok(PipeMessage::Eof) | Err(RecvTimeoutError::Disconnected) => {
                    self.finished = true;
                    return self.finish_stream().map(|_| None);
                }
                Ok(PipeMessage::Failed(e)) => {
                    let reason = format!("reading {} output failed: {}", self.name, e);
                    return Err(self.fail(reason));
                }
                Err(RecvTimeoutError::Timeout) => {
                    let reason = format!(
                        "{} produced no data within {} ms",
                        self.name,
                        self.timeout.map(|t| t.as_millis()).unwrap_or_default()
                    );
                    return Err(self.fail(reason));
                }
            }
        }
    }

    fn close(&mut self) {
        self.finished = true;
        self.release();
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn pump_stdout(mut stdout: ChildStdout, tx: SyncSender<PipeMessage>, chunk_bytes: usize) {
    loop {
        let mut buf = vec![0u8; chunk_bytes];
        match stdout.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(PipeMessage::Eof);
                return;
            }
            Ok(n) => {
                buf.truncate(n);
                if tx.send(PipeMessage::Data(buf)).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(PipeMessage::Failed(e));
                return;
            }
        }
    }
}

fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(STDERR_TAIL_BYTES);
    let mut buf = [0u8; 512];
    loop {
        match stderr.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend(&buf[..n]);
                let excess = tail.len().saturating_sub(STDERR_TAIL_BYTES);
                tail.drain(..excess);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(tail.make_contiguous()).trim().to_string()
}

/// Join `handle` if it finishes before `deadline`, otherwise detach it
fn join_until<T>(handle: JoinHandle<T>, deadline: Instant, name: &str) -> Option<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            debug!(
                "{}: {} still blocked on a pipe held by another process, detaching",
                name,
                handle.thread().name().unwrap_or("helper")
            );
            return None;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
    handle.join().ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsString;

    /// Runs an arbitrary shell script; `$1` is the source path
    struct Script(&'static str);

    impl DecoderBackend for Script {
        fn name(&self) -> &str {
            "script"
        }

        fn program(&self) -> &Path {
            Path::new("sh")
        }

        fn args(&self, source: &Path, _config: &StreamConfig) -> Result<Vec<OsString>> {
            Ok(vec![
                "-c".into(),
                self.0.into(),
                "sh".into(),
                source.as_os_str().to_owned(),
            ])
        }
    }

    fn drain(session: &mut ProcessSession) -> Result<Vec<f32>> {
        let mut all = Vec::new();
        while let Some(chunk) = session.next_chunk()? {
            all.extend(chunk);
        }
        Ok(all)
    }

    #[test]
    fn test_reads_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.raw");
        std::fs::write(&path, [0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0xc0]).unwrap();

        let config = StreamConfig::new(4).with_chunk_bytes(3);
        let mut session = ProcessSession::spawn(&Script("cat \"$1\""), &path, &config).unwrap();

        assert_eq!(drain(&mut session).unwrap(), vec![0.0, 0.5, 0.0, -0.5]);
        assert_eq!(session.bytes_received(), 8);
        // Exhausted sessions stay exhausted
        assert!(session.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_failure_before_output_is_source_unreadable() {
        let config = StreamConfig::new(4);
        let mut session = ProcessSession::spawn(
            &Script("echo 'cannot open' >&2; exit 2"),
            Path::new("whatever.flac"),
            &config,
        )
        .unwrap();

        match session.next_chunk() {
            Err(SoxFrameError::SourceUnreadable { reason, .. }) => {
                assert!(reason.contains("cannot open"), "reason: {}", reason);
            }
            other => panic!("Expected SourceUnreadable, got: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_partial_sample_is_interrupted() {
        let config = StreamConfig::new(4);
        let mut session =
            ProcessSession::spawn(&Script("printf 'abc'"), Path::new("x"), &config).unwrap();

        match drain(&mut session) {
            Err(SoxFrameError::DecodeInterrupted { reason }) => {
                assert!(reason.contains("stray"), "reason: {}", reason);
            }
            other => panic!("Expected DecodeInterrupted, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        struct Missing;
        impl DecoderBackend for Missing {
            fn name(&self) -> &str {
                "missing"
            }
            fn program(&self) -> &Path {
                Path::new("/nonexistent/decoder")
            }
            fn args(&self, _: &Path, _: &StreamConfig) -> Result<Vec<OsString>> {
                Ok(Vec::new())
            }
        }

        let result = ProcessSession::spawn(&Missing, Path::new("x"), &StreamConfig::default());
        assert!(matches!(
            result,
            Err(SoxFrameError::DecoderUnavailable { .. })
        ));
    }

    #[test]
    fn test_timeout_with_lingering_grandchild() {
        // The shell is the child; `sleep` is a grandchild holding both pipes
        let config = StreamConfig::new(4).with_read_timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let mut session =
            ProcessSession::spawn(&Script("sleep 6; true"), Path::new("x"), &config).unwrap();

        assert!(matches!(
            session.next_chunk(),
            Err(SoxFrameError::DecodeInterrupted { .. })
        ));
        drop(session);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_stderr_keeps_only_the_tail() {
        let script = "i=0; while [ $i -lt 600 ]; do echo \"noise line $i\" >&2; i=$((i+1)); done; \
                      echo 'final complaint' >&2; exit 2";
        let mut session =
            ProcessSession::spawn(&Script(script), Path::new("x"), &StreamConfig::new(4)).unwrap();

        match session.next_chunk() {
            Err(SoxFrameError::SourceUnreadable { reason, .. }) => {
                assert!(reason.ends_with("final complaint"), "reason: {}", reason);
                assert!(!reason.contains("noise line 0\n"));
                assert!(reason.len() < STDERR_TAIL_BYTES + 100);
            }
            other => panic!("Expected SourceUnreadable, got: {:?}", other),
        }
    }
}
