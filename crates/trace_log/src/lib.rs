//! `trace_log` is a structured logger that knows about distributed tracing.
//!
//! It offers:
//! - A [`Logger`] facade with leveled logging methods, in context-free and context-aware forms.
//! - Pluggable [`Encoder`]s ([`JsonEncoder`], [`ConsoleEncoder`]) and [`Sink`]s, where the sink
//!   and the threshold ([`AtomicLevel`]) can be changed while the logger is in use.
//! - Trace correlation: records logged within a context that carries an active span are
//!   enriched with its `trace_id`, `span_id` and `trace_flags`.
//! - Span escalation: records at or above a configurable severity are attached to the active
//!   span as events, optionally with a stack trace captured at the logging call.
//! - A [`LogLayer`] that routes events from the [`tracing`] ecosystem through a [`Logger`].
//!
//! The tracing backend is reached only through the [`SpanLookup`] capability. The
//! `opentelemetry` feature provides an implementation for [`opentelemetry::Context`].
//!
//! Logging never fails the caller: encoding and I/O failures are counted (see
//! [`Logger::diagnostics`]) and reported on standard error. Only construction returns errors.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod bridge;
mod config;
mod correlation;
mod encoder;
mod logger;
#[cfg(feature = "opentelemetry")]
pub mod otel;
mod pipeline;
mod record;
mod severity;
pub mod sink;

pub use self::{
    bridge::LogLayer,
    config::{BackendOption, LevelSetting, LoggerConfig},
    correlation::{Escalator, NoSpan, NoSpans, SpanHandle, SpanLookup, TraceFields, correlate},
    encoder::{
        ConsoleEncoder, ConsoleEncoderConfig, EncodeError, Encoder, JsonEncoder,
        JsonEncoderConfig,
    },
    logger::Logger,
    pipeline::DiagnosticsSnapshot,
    record::{Caller, Fields, Record},
    severity::{AtomicLevel, ParseSeverityError, Severity},
    sink::{BufferSink, Sink},
};

pub(crate) mod keys {
    use std::sync::LazyLock;

    use rustc_hash::FxHashSet;

    pub(crate) const MESSAGE: &str = "msg";
    pub(crate) const LEVEL: &str = "level";
    pub(crate) const TIME: &str = "ts";
    pub(crate) const CALLER: &str = "caller";
    pub(crate) const STACKTRACE: &str = "stacktrace";
    pub(crate) const HOSTNAME: &str = "hostname";
    pub(crate) const PID: &str = "pid";
    pub(crate) const TARGET: &str = "target";

    pub(crate) const TRACE_ID: &str = "trace_id";
    pub(crate) const SPAN_ID: &str = "span_id";
    pub(crate) const TRACE_FLAGS: &str = "trace_flags";

    pub(crate) const EXCEPTION_MESSAGE: &str = "exception.message";
    pub(crate) const EXCEPTION_STACKTRACE: &str = "exception.stacktrace";
    pub(crate) const LOG_SEVERITY: &str = "log.severity";

    /// Keys written by the encoders themselves; records may not override them.
    pub(crate) static IMPLICIT_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
        [MESSAGE, LEVEL, TIME, CALLER, STACKTRACE, HOSTNAME, PID]
            .iter()
            .copied()
            .collect()
    });
}

/// Errors that can occur while constructing or syncing a logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Represents an error in configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configured threshold does not name a severity.
    #[error("Invalid log level: {0}")]
    InvalidSeverity(#[from] ParseSeverityError),

    /// Represents an error during initialization of the rolling file appender.
    #[error("Failed to initialize rolling file appender: {0}")]
    FileAppenderInitialization(#[from] tracing_appender::rolling::InitError),

    /// The sink failed to flush.
    #[error("Failed to flush log sink: {0}")]
    Io(#[from] std::io::Error),
}
