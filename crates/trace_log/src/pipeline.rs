//! The pipeline that decides whether a record is written and writes it.

use std::{
    fmt,
    io::{self, Write},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    AtomicLevel, Encoder, Record, Severity,
    sink::{Sink, SinkCell},
};

/// Counters of failures swallowed by the logging path.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    encode_failures: AtomicU64,
    write_failures: AtomicU64,
    flush_failures: AtomicU64,
}

impl Diagnostics {
    fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a logger's failure counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Records dropped because the encoder failed.
    pub encode_failures: u64,

    /// Records lost because the sink rejected the write.
    pub write_failures: u64,

    /// Failed flushes, including those of a sink being replaced.
    pub flush_failures: u64,
}

/// Encoder, sink and level threshold bound together.
pub(crate) struct Core {
    encoder: Box<dyn Encoder>,
    sink: SinkCell,
    level: AtomicLevel,
    diagnostics: Diagnostics,
}

impl Core {
    pub(crate) fn new(encoder: Box<dyn Encoder>, sink: Box<dyn Sink>, level: AtomicLevel) -> Self {
        Self {
            encoder,
            sink: SinkCell::new(sink),
            level,
            diagnostics: Diagnostics::default(),
        }
    }

    #[inline]
    pub(crate) fn enabled(&self, severity: Severity) -> bool {
        self.level.enabled(severity)
    }

    pub(crate) fn level(&self) -> &AtomicLevel {
        &self.level
    }

    /// Writes `record` to the sink if it passes the level threshold.
    ///
    /// Never fails: encoding and I/O errors are counted and reported on standard error.
    pub(crate) fn emit(&self, record: &Record<'_>) {
        if !self.enabled(record.severity) {
            return;
        }

        let mut buffer = Vec::with_capacity(256);
        if let Err(error) = self.encoder.encode(record, &mut buffer) {
            self.diagnostics
                .encode_failures
                .fetch_add(1, Ordering::Relaxed);
            report(format_args!("dropping log record that failed to encode: {error}"));
            return;
        }

        // One `write_all` under the lock keeps each record contiguous in the sink.
        let result = self.sink.lock().write_all(&buffer);
        if let Err(error) = result {
            self.diagnostics.write_failures.fetch_add(1, Ordering::Relaxed);
            report(format_args!("failed to write log record: {error}"));
        }
    }

    /// Flushes the current sink and replaces it with `sink`.
    pub(crate) fn set_sink(&self, sink: Box<dyn Sink>) {
        let mut previous = self.sink.replace(sink);
        if let Err(error) = previous.flush() {
            self.diagnostics.flush_failures.fetch_add(1, Ordering::Relaxed);
            report(format_args!("failed to flush replaced log sink: {error}"));
        }
    }

    pub(crate) fn sync(&self) -> io::Result<()> {
        let result = self.sink.lock().flush();
        if result.is_err() {
            self.diagnostics.flush_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub(crate) fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("encoder", &self.encoder)
            .field("level", &self.level.get())
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

/// Last-resort diagnostic channel for failures on the logging path.
///
/// Errors from writing to standard error are ignored: there is nowhere left to report them.
fn report(message: fmt::Arguments<'_>) {
    let _ = writeln!(io::stderr().lock(), "[WARN] {}: {message}", env!("CARGO_PKG_NAME"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferSink, EncodeError, Fields, JsonEncoder};

    #[derive(Debug)]
    struct RejectingEncoder;

    impl Encoder for RejectingEncoder {
        fn encode(&self, _record: &Record<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
            buffer.extend_from_slice(b"partial");
            Err(EncodeError::Field {
                key: "k".to_string(),
                reason: "unsupported".to_string(),
            })
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk gone"))
        }
    }

    fn record(severity: Severity) -> Record<'static> {
        Record::new(severity, "message", Fields::new())
    }

    #[test]
    fn discards_records_below_the_threshold() {
        let sink = BufferSink::new();
        let core = Core::new(
            Box::new(JsonEncoder::compact()),
            Box::new(sink.clone()),
            AtomicLevel::new(Severity::Warn),
        );

        core.emit(&record(Severity::Info));
        assert!(sink.contents().is_empty());

        core.emit(&record(Severity::Warn));
        core.emit(&record(Severity::Error));
        assert_eq!(sink.lines().len(), 2);
    }

    #[test]
    fn encode_failures_leave_the_sink_untouched() {
        let sink = BufferSink::new();
        let core = Core::new(
            Box::new(RejectingEncoder),
            Box::new(sink.clone()),
            AtomicLevel::new(Severity::Info),
        );

        core.emit(&record(Severity::Error));
        assert!(sink.contents().is_empty());
        assert_eq!(core.diagnostics().encode_failures, 1);
    }

    #[test]
    fn write_failures_are_counted_not_propagated() {
        let core = Core::new(
            Box::new(JsonEncoder::compact()),
            Box::new(BrokenSink),
            AtomicLevel::new(Severity::Info),
        );

        core.emit(&record(Severity::Error));
        assert_eq!(core.diagnostics().write_failures, 1);
        assert!(core.sync().is_err());
        assert_eq!(core.diagnostics().flush_failures, 1);

        let sink = BufferSink::new();
        core.set_sink(Box::new(sink.clone()));
        assert_eq!(core.diagnostics().flush_failures, 2);

        core.emit(&record(Severity::Error));
        assert_eq!(sink.lines().len(), 1);
        assert!(core.sync().is_ok());
    }
}
