//! Construction-time configuration of a [`Logger`](crate::Logger).

use std::fmt;

use crate::{AtomicLevel, Encoder, Fields, JsonEncoder, Severity, sink::Sink};

/// Where the logger's threshold comes from.
#[derive(Clone, Debug)]
pub enum LevelSetting {
    /// Use (and share) an existing threshold.
    Shared(AtomicLevel),

    /// Parse the threshold from a name such as `"debug"` when the logger is built.
    Directive(String),
}

impl Default for LevelSetting {
    fn default() -> Self {
        Self::Shared(AtomicLevel::default())
    }
}

impl From<Severity> for LevelSetting {
    fn from(severity: Severity) -> Self {
        Self::Shared(AtomicLevel::new(severity))
    }
}

impl From<AtomicLevel> for LevelSetting {
    fn from(level: AtomicLevel) -> Self {
        Self::Shared(level)
    }
}

impl From<&str> for LevelSetting {
    fn from(directive: &str) -> Self {
        Self::Directive(directive.to_string())
    }
}

impl From<String> for LevelSetting {
    fn from(directive: String) -> Self {
        Self::Directive(directive)
    }
}

/// Options applied to the logging backend itself, independent of tracing.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendOption {
    /// Record the source location of every logging call.
    AddCaller,

    /// Capture a stack trace into records at or above the given severity.
    AddStacktrace(Severity),

    /// Add these fields to every record. Fields given at the call site take precedence.
    Fields(Fields),
}

/// Configuration of a [`Logger`](crate::Logger).
///
/// Start from [`LoggerConfig::default`] (JSON to standard output, `info` threshold,
/// escalation at `error` with stack traces) and override what you need:
///
/// ```
/// use trace_log::{BufferSink, ConsoleEncoder, LoggerConfig, Severity};
///
/// let config = LoggerConfig::default()
///     .with_encoder(ConsoleEncoder::default())
///     .with_sink(BufferSink::new())
///     .with_level(Severity::Debug)
///     .with_escalation_severity(Severity::Warn)
///     .with_record_stack_trace_in_span(false);
/// ```
pub struct LoggerConfig {
    /// Serializes records.
    pub encoder: Box<dyn Encoder>,

    /// Initial destination for records; replaceable later with
    /// [`Logger::set_output`](crate::Logger::set_output).
    pub sink: Box<dyn Sink>,

    /// Initial threshold.
    pub level: LevelSetting,

    /// Minimum severity at which records become events on the active span.
    pub escalation_severity: Severity,

    /// Whether escalated records carry a stack trace captured at the logging call.
    pub record_stack_trace_in_span: bool,

    /// Options passed through to the logging backend.
    pub backend_options: Vec<BackendOption>,
}

impl LoggerConfig {
    /// Replaces the encoder.
    #[must_use]
    pub fn with_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    /// Replaces the sink.
    #[must_use]
    pub fn with_sink(mut self, sink: impl Sink) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Replaces the threshold.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<LevelSetting>) -> Self {
        self.level = level.into();
        self
    }

    /// Changes which severities annotate the active span.
    #[must_use]
    pub fn with_escalation_severity(mut self, severity: Severity) -> Self {
        self.escalation_severity = severity;
        self
    }

    /// Toggles stack capture for escalated records.
    #[must_use]
    pub fn with_record_stack_trace_in_span(mut self, record: bool) -> Self {
        self.record_stack_trace_in_span = record;
        self
    }

    /// Appends backend options.
    #[must_use]
    pub fn with_backend_options(mut self, options: impl IntoIterator<Item = BackendOption>) -> Self {
        self.backend_options.extend(options);
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            encoder: Box::new(JsonEncoder::default()),
            sink: Box::new(std::io::stdout()),
            level: LevelSetting::default(),
            escalation_severity: Severity::Error,
            record_stack_trace_in_span: true,
            backend_options: Vec::new(),
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("encoder", &self.encoder)
            .field("level", &self.level)
            .field("escalation_severity", &self.escalation_severity)
            .field("record_stack_trace_in_span", &self.record_stack_trace_in_span)
            .field("backend_options", &self.backend_options)
            .finish_non_exhaustive()
    }
}
