//! Destinations for encoded records.
//!
//! Any [`io::Write`] that is [`Send`] can be used as a [`Sink`]. This module additionally
//! provides an in-memory [`BufferSink`], a time-rotated file sink built on
//! [`tracing_appender::rolling`], and a [`non_blocking`] wrapper that moves writes onto a
//! dedicated worker thread.

use std::{
    fmt, io,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};

use crate::LoggerError;

/// A flush-capable byte destination.
///
/// Each record is handed to the sink with a single [`io::Write::write_all`] call while the
/// logger holds the sink exclusively, so records from concurrent callers never interleave.
pub trait Sink: io::Write + Send + 'static {}

impl<W: io::Write + Send + 'static> Sink for W {}

/// The logger's current sink, replaceable while the logger is in use.
pub(crate) struct SinkCell {
    sink: Mutex<Box<dyn Sink>>,
}

impl SinkCell {
    pub(crate) fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Exclusive access to the current sink.
    ///
    /// A panic inside a user-provided sink poisons the lock; the sink is still handed out
    /// so logging keeps working.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn Sink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in `sink` and returns the previous one.
    pub(crate) fn replace(&self, sink: Box<dyn Sink>) -> Box<dyn Sink> {
        std::mem::replace(&mut *self.lock(), sink)
    }
}

impl fmt::Debug for SinkCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkCell").finish_non_exhaustive()
    }
}

/// An in-memory sink whose clones all append to the same buffer.
///
/// Useful for tests and for capturing output to inspect later.
#[derive(Clone, Debug, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer().clone()
    }

    /// Everything written so far, decoded as UTF-8 (lossily).
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.buffer()).into_owned()
    }

    /// The written output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents_string().lines().map(str::to_owned).collect()
    }

    /// Discards everything written so far.
    pub fn clear(&self) {
        self.buffer().clear();
    }
}

impl io::Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.buffer().extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Configuration for a rotating file sink.
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Directory where log files will be stored.
    pub directory: String,

    /// Prefix for log file names.
    pub file_name_prefix: String,

    /// Rotation strategy for log files.
    pub file_rotation: Rotation,

    /// Maximum number of log files to keep. If `None`, all files are kept.
    pub max_log_files: Option<NonZeroUsize>,
}

/// Builds a rotating file sink from the given configuration.
///
/// # Errors
///
/// Returns [`LoggerError::FileAppenderInitialization`] if the directory cannot be created or
/// the initial log file cannot be opened.
pub fn rolling_file(config: FileSinkConfig) -> Result<RollingFileAppender, LoggerError> {
    let mut file_appender_builder = RollingFileAppender::builder()
        .rotation(config.file_rotation)
        .filename_prefix(config.file_name_prefix);

    if let Some(max_log_files) = config.max_log_files {
        file_appender_builder = file_appender_builder.max_log_files(usize::from(max_log_files));
    }

    Ok(file_appender_builder.build(&config.directory)?)
}

/// Moves writes to `writer` onto a dedicated worker thread.
///
/// The returned [`NonBlocking`] handle is the sink to hand to the logger; records are queued
/// and written by the worker. Keep the [`WorkerGuard`] alive for as long as the logger is in
/// use: dropping it drains the queue, waiting a bounded amount of time for the worker, so
/// shutdown cannot hang on a stalled destination.
pub fn non_blocking<W: Sink>(writer: W) -> (NonBlocking, WorkerGuard) {
    tracing_appender::non_blocking(writer)
}
