//! Result stream back to the orchestrator and the single-writer completion guard.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use super::protocol::{Frame, ProtocolError, write_frame};
use super::status::{ExitCode, MutationResult};

/// Reporter errors.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The stream was already completed.
    #[error("reporter is closed")]
    Closed,
    /// Writing a frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Sink for per-mutation results.
pub trait Reporter: Send + Sync {
    /// Send one result immediately.
    fn report(&self, result: &MutationResult) -> Result<(), ReporterError>;

    /// Send the completion signal and close the stream.
    ///
    /// Only the first call writes anything; later calls return `Ok(())`.
    fn done(&self, code: ExitCode) -> Result<(), ReporterError>;
}

/// Stream that can signal end-of-output to the peer.
pub trait CloseWrite: Write + Send {
    /// Half-close the write side.
    fn close_write(&mut self) -> std::io::Result<()>;
}

impl CloseWrite for TcpStream {
    fn close_write(&mut self) -> std::io::Result<()> {
        self.shutdown(Shutdown::Write)
    }
}

/// Frames results onto a stream. Frames from concurrent callers never
/// interleave and nothing is written after `done`.
#[derive(Debug)]
pub struct StreamReporter<W: CloseWrite> {
    stream: Mutex<Option<W>>,
}

/// Reporter over the orchestrator connection.
pub type SocketReporter = StreamReporter<TcpStream>;

impl<W: CloseWrite> StreamReporter<W> {
    /// Reporter writing to `stream`.
    pub fn new(stream: W) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
        }
    }

    /// Whether `done` already ran.
    pub fn is_closed(&self) -> bool {
        self.stream.lock().is_none()
    }
}

impl<W: CloseWrite> Reporter for StreamReporter<W> {
    fn report(&self, result: &MutationResult) -> Result<(), ReporterError> {
        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or(ReporterError::Closed)?;
        write_frame(stream, &Frame::Status(result.clone()))?;
        Ok(())
    }

    fn done(&self, code: ExitCode) -> Result<(), ReporterError> {
        let Some(mut stream) = self.stream.lock().take() else {
            return Ok(());
        };
        write_frame(&mut stream, &Frame::Done(code))?;
        if let Err(err) = stream.close_write() {
            tracing::debug!(error = %err, "half-close of result stream failed");
        }
        Ok(())
    }
}

/// Whichever actor finishes first performs the final flush; everyone else is
/// a no-op.
pub struct Completion {
    finished: AtomicBool,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl Completion {
    /// Guard around `reporter`.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            finished: AtomicBool::new(false),
            reporter,
        }
    }

    /// Send done with `code` unless someone already did. Returns whether this
    /// call performed the flush.
    pub fn finish(&self, code: ExitCode) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(err) = self.reporter.done(code) {
            tracing::warn!(error = %err, %code, "failed to send completion signal");
        }
        true
    }

    /// Whether `finish` already ran.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// In-memory stream whose frames stay readable after the reporter drops it.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedStream(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedStream {
    pub(crate) fn frames(&self) -> Vec<Frame> {
        let mut cursor = std::io::Cursor::new(self.0.lock().clone());
        let mut frames = Vec::new();
        while let Some(frame) =
            super::protocol::read_frame(&mut cursor).expect("captured frames should decode")
        {
            frames.push(frame);
        }
        frames
    }

    pub(crate) fn kinds(&self) -> Vec<&'static str> {
        self.frames().iter().map(Frame::kind).collect()
    }
}

#[cfg(test)]
impl Write for CapturedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl CloseWrite for CapturedStream {
    fn close_write(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
