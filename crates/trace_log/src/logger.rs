//! The logger facade.

use std::{backtrace::Backtrace, fmt, panic::Location, sync::Arc};

use crate::{
    AtomicLevel, BackendOption, Caller, DiagnosticsSnapshot, Escalator, Fields, LevelSetting,
    LoggerConfig, LoggerError, Record, Severity, SpanLookup, TraceFields,
    correlation::NoSpans,
    keys,
    pipeline::Core,
    sink::Sink,
};

/// A structured logger that correlates records with the active trace span.
///
/// Every record goes through the level check, is encoded and written to the sink. Records
/// logged with a context ([`Logger::log_ctx`] and the `ctx_*` methods) additionally carry the
/// `trace_id`, `span_id` and `trace_flags` of the span active in that context, and records at
/// or above the escalation severity are attached to that span as events.
///
/// `Logger` is a cheap handle: clones share the sink, the threshold and the diagnostics.
///
/// # Example
///
/// ```
/// use trace_log::{BufferSink, Logger, LoggerConfig, Severity};
///
/// let sink = BufferSink::new();
/// let logger = Logger::untraced(LoggerConfig::default().with_sink(sink.clone()))?;
///
/// logger.log(Severity::Warn, "disk low", [("pct", 5)]);
/// logger.log(Severity::Debug, "ignored", ());
/// logger.sync()?;
///
/// let lines = sink.lines();
/// assert_eq!(lines.len(), 1);
/// let record: serde_json::Value = serde_json::from_str(&lines[0])?;
/// assert_eq!(record["level"], "warn");
/// assert_eq!(record["msg"], "disk low");
/// assert_eq!(record["pct"], 5);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Logger<L: SpanLookup = NoSpans> {
    inner: Arc<Inner<L>>,
}

struct Inner<L> {
    core: Core,
    lookup: L,
    escalator: Escalator,
    add_caller: bool,
    stacktrace_severity: Option<Severity>,
    base_fields: Fields,
}

impl Logger<NoSpans> {
    /// Creates a logger for an application without distributed tracing.
    ///
    /// # Errors
    ///
    /// See [`Logger::new`].
    pub fn untraced(config: LoggerConfig) -> Result<Self, LoggerError> {
        Self::new(NoSpans, config)
    }
}

impl<L: SpanLookup> Logger<L> {
    /// Creates a logger that finds active spans through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidSeverity`] if the level directive does not name a
    /// severity, and [`LoggerError::Configuration`] if a [`BackendOption::Fields`] option uses a
    /// reserved key.
    pub fn new(lookup: L, config: LoggerConfig) -> Result<Self, LoggerError> {
        let level = match config.level {
            LevelSetting::Shared(level) => level,
            LevelSetting::Directive(directive) => AtomicLevel::new(directive.parse()?),
        };

        let mut add_caller = false;
        let mut stacktrace_severity = None;
        let mut base_fields = Fields::new();
        for option in config.backend_options {
            match option {
                BackendOption::AddCaller => add_caller = true,
                BackendOption::AddStacktrace(severity) => stacktrace_severity = Some(severity),
                BackendOption::Fields(fields) => {
                    if let Some((key, _)) = fields
                        .iter()
                        .find(|(key, _)| keys::IMPLICIT_KEYS.contains(key.as_str()))
                    {
                        return Err(LoggerError::Configuration(format!(
                            "A reserved key `{key}` was included in the logger's fields"
                        )));
                    }
                    base_fields.extend(fields);
                }
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                core: Core::new(config.encoder, config.sink, level),
                lookup,
                escalator: Escalator::new(
                    config.escalation_severity,
                    config.record_stack_trace_in_span,
                ),
                add_caller,
                stacktrace_severity,
                base_fields,
            }),
        })
    }

    /// Logs `message` with `fields` at `severity`.
    ///
    /// The message is only rendered if the record passes the threshold.
    #[track_caller]
    pub fn log(&self, severity: Severity, message: impl fmt::Display, fields: impl Into<Fields>) {
        let caller = self.caller(Location::caller());
        self.dispatch(None, severity, message, fields.into(), caller);
    }

    /// Logs `message` with `fields` at `severity`, correlated with the span active in `cx`.
    ///
    /// Use [`format_args!`] to log a formatted message without allocating when the record is
    /// filtered out.
    #[track_caller]
    pub fn log_ctx(
        &self,
        cx: &L::Context,
        severity: Severity,
        message: impl fmt::Display,
        fields: impl Into<Fields>,
    ) {
        let caller = self.caller(Location::caller());
        self.dispatch(Some(cx), severity, message, fields.into(), caller);
    }

    /// Logs at [`Severity::Trace`].
    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.log(Severity::Trace, message, ());
    }

    /// Logs at [`Severity::Debug`].
    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Severity::Debug, message, ());
    }

    /// Logs at [`Severity::Info`].
    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Severity::Info, message, ());
    }

    /// Logs at [`Severity::Notice`].
    #[track_caller]
    pub fn notice(&self, message: impl fmt::Display) {
        self.log(Severity::Notice, message, ());
    }

    /// Logs at [`Severity::Warn`].
    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Severity::Warn, message, ());
    }

    /// Logs at [`Severity::Error`].
    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Severity::Error, message, ());
    }

    /// Logs at [`Severity::Trace`] within `cx`.
    #[track_caller]
    pub fn ctx_trace(&self, cx: &L::Context, message: impl fmt::Display) {
        self.log_ctx(cx, Severity::Trace, message, ());
    }

    /// Logs at [`Severity::Debug`] within `cx`.
    #[track_caller]
    pub fn ctx_debug(&self, cx: &L::Context, message: impl fmt::Display) {
        self.log_ctx(cx, Severity::Debug, message, ());
    }

    /// Logs at [`Severity::Info`] within `cx`.
    #[track_caller]
    pub fn ctx_info(&self, cx: &L::Context, message: impl fmt::Display) {
        self.log_ctx(cx, Severity::Info, message, ());
    }

    /// Logs at [`Severity::Notice`] within `cx`.
    #[track_caller]
    pub fn ctx_notice(&self, cx: &L::Context, message: impl fmt::Display) {
        self.log_ctx(cx, Severity::Notice, message, ());
    }

    /// Logs at [`Severity::Warn`] within `cx`.
    #[track_caller]
    pub fn ctx_warn(&self, cx: &L::Context, message: impl fmt::Display) {
        self.log_ctx(cx, Severity::Warn, message, ());
    }

    /// Logs at [`Severity::Error`] within `cx`.
    #[track_caller]
    pub fn ctx_error(&self, cx: &L::Context, message: impl fmt::Display) {
        self.log_ctx(cx, Severity::Error, message, ());
    }

    /// Routes all subsequent records to `sink`.
    ///
    /// The previous sink is flushed and dropped. A record is written entirely to either the
    /// previous or the new sink.
    pub fn set_output(&self, sink: impl Sink) {
        self.inner.core.set_sink(Box::new(sink));
    }

    /// Changes the threshold for this logger and everything sharing its [`AtomicLevel`].
    pub fn set_level(&self, severity: Severity) {
        self.inner.core.level().set(severity);
    }

    /// The current threshold.
    pub fn level(&self) -> Severity {
        self.inner.core.level().get()
    }

    /// A handle to the threshold shared by this logger.
    pub fn level_handle(&self) -> AtomicLevel {
        self.inner.core.level().clone()
    }

    /// Whether a record of `severity` would be written.
    pub fn enabled(&self, severity: Severity) -> bool {
        self.inner.core.enabled(severity)
    }

    /// Flushes the sink, so that every record accepted so far has reached it.
    ///
    /// Call this before the logger is dropped. Logging after `sync` is allowed; call `sync`
    /// again before disposal.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Io`] if the sink fails to flush.
    pub fn sync(&self) -> Result<(), LoggerError> {
        Ok(self.inner.core.sync()?)
    }

    /// Counters of failures swallowed while logging.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.core.diagnostics()
    }

    pub(crate) fn lookup(&self) -> &L {
        &self.inner.lookup
    }

    pub(crate) fn captures_caller(&self) -> bool {
        self.inner.add_caller
    }

    /// Whether a record of `severity` would be written or escalated.
    pub(crate) fn interested(&self, severity: Severity, with_context: bool) -> bool {
        self.inner.core.enabled(severity)
            || (with_context && self.inner.escalator.applies_to(severity))
    }

    fn caller(&self, location: &'static Location<'static>) -> Option<Caller> {
        self.inner.add_caller.then(|| Caller::from(location))
    }

    pub(crate) fn dispatch(
        &self,
        cx: Option<&L::Context>,
        severity: Severity,
        message: impl fmt::Display,
        fields: Fields,
        caller: Option<Caller>,
    ) {
        let inner = &*self.inner;
        let emit = inner.core.enabled(severity);
        let escalate = cx.is_some() && inner.escalator.applies_to(severity);
        if !emit && !escalate {
            return;
        }

        let fields = if inner.base_fields.is_empty() {
            fields
        } else {
            let mut merged = inner.base_fields.clone();
            merged.extend(fields);
            merged
        };

        let mut record = Record::new(severity, message.to_string(), fields);
        record.caller = caller;
        if emit
            && inner
                .stacktrace_severity
                .is_some_and(|threshold| severity >= threshold)
        {
            record.stacktrace = Some(Backtrace::force_capture().to_string());
        }

        let span = cx.and_then(|cx| inner.lookup.current_span(cx));

        if emit {
            if let Some(span) = &span {
                TraceFields::from_span(span).merge_into(&mut record.fields);
            }
            inner.core.emit(&record);
        }

        if escalate {
            if let Some(span) = &span {
                let stack = inner.escalator.capture_stack(&record);
                inner.escalator.escalate(span, &record, stack);
            }
        }
    }
}

impl<L: SpanLookup> Clone for Logger<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: SpanLookup> fmt::Debug for Logger<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("core", &self.inner.core)
            .field("escalator", &self.inner.escalator)
            .field("add_caller", &self.inner.add_caller)
            .field("stacktrace_severity", &self.inner.stacktrace_severity)
            .field("base_fields", &self.inner.base_fields)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        BufferSink, ConsoleEncoder,
        correlation::tests::{TestLookup, TestSpan},
    };

    fn logger(sink: &BufferSink, config: LoggerConfig) -> Logger<TestLookup> {
        Logger::new(TestLookup, config.with_sink(sink.clone())).unwrap()
    }

    fn records(sink: &BufferSink) -> Vec<Value> {
        sink.lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn leveled_methods_respect_the_threshold() {
        let sink = BufferSink::new();
        let logger = logger(&sink, LoggerConfig::default().with_level(Severity::Notice));

        logger.trace("t");
        logger.debug("d");
        logger.info("i");
        logger.notice("n");
        logger.warn("w");
        logger.error("e");

        let levels: Vec<Value> = records(&sink).into_iter().map(|r| r["level"].clone()).collect();
        assert_eq!(levels, [json!("notice"), json!("warn"), json!("error")]);
    }

    #[test]
    fn level_directive_is_parsed_at_construction() {
        let sink = BufferSink::new();
        let logger = logger(&sink, LoggerConfig::default().with_level("DEBUG"));
        assert_eq!(logger.level(), Severity::Debug);

        let error = Logger::new(TestLookup, LoggerConfig::default().with_level("loud")).unwrap_err();
        assert!(matches!(error, LoggerError::InvalidSeverity(_)));
    }

    #[test]
    fn shared_level_handle_controls_every_clone() {
        let sink = BufferSink::new();
        let level = AtomicLevel::new(Severity::Info);
        let logger = logger(&sink, LoggerConfig::default().with_level(level.clone()));
        let clone = logger.clone();

        clone.debug("hidden");
        level.set(Severity::Debug);
        clone.debug("shown");

        assert_eq!(sink.lines().len(), 1);
        assert_eq!(logger.level_handle().get(), Severity::Debug);
    }

    #[test]
    fn context_records_carry_trace_fields() {
        let sink = BufferSink::new();
        let logger = logger(&sink, LoggerConfig::default());
        let span = TestSpan::recording();

        logger.ctx_info(&Some(span), format_args!("hello {}", "world"));
        logger.ctx_info(&None, "no span");

        let records = records(&sink);
        assert_eq!(records[0]["msg"], json!("hello world"));
        assert_eq!(records[0]["trace_id"], json!("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert_eq!(records[0]["span_id"], json!("00f067aa0ba902b7"));
        assert_eq!(records[0]["trace_flags"], json!("01"));
        for key in ["trace_id", "span_id", "trace_flags"] {
            assert!(records[1].get(key).is_none());
        }
    }

    #[test]
    fn escalation_follows_the_configured_severity() {
        let sink = BufferSink::new();
        let logger = logger(
            &sink,
            LoggerConfig::default()
                .with_escalation_severity(Severity::Warn)
                .with_record_stack_trace_in_span(false),
        );
        let span = TestSpan::recording();
        let cx = Some(span.clone());

        logger.ctx_info(&cx, "routine");
        assert!(span.events().is_empty());

        logger.ctx_error(&cx, "failed");
        assert_eq!(span.events().len(), 1);

        logger.error("no context");
        assert_eq!(span.events().len(), 1);
    }

    #[test]
    fn escalation_happens_even_when_the_record_is_filtered() {
        let sink = BufferSink::new();
        let logger = logger(
            &sink,
            LoggerConfig::default()
                .with_level(Severity::Error)
                .with_escalation_severity(Severity::Warn),
        );
        let span = TestSpan::recording();

        logger.ctx_warn(&Some(span.clone()), "slow");
        assert!(sink.contents().is_empty());
        let events = span.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].1.iter().any(|(key, _)| *key == "exception.stacktrace"));
    }

    #[test]
    fn backend_options_add_caller_stacktrace_and_fields() {
        let sink = BufferSink::new();
        let logger = logger(
            &sink,
            LoggerConfig::default().with_backend_options([
                BackendOption::AddCaller,
                BackendOption::AddStacktrace(Severity::Error),
                BackendOption::Fields(Fields::from([("service", "press"), ("zone", "a")])),
            ]),
        );

        logger.info("up");
        logger.log(Severity::Error, "down", [("zone", "b")]);

        let records = records(&sink);
        let caller = records[0]["caller"].as_str().unwrap();
        assert!(caller.starts_with(file!()), "{caller}");
        assert_eq!(records[0]["service"], json!("press"));
        assert!(records[0].get("stacktrace").is_none());
        assert_eq!(records[1]["zone"], json!("b"));
        assert!(records[1]["stacktrace"].is_string());
    }

    #[test]
    fn span_event_shares_the_stack_written_with_the_record() {
        let sink = BufferSink::new();
        let logger = logger(
            &sink,
            LoggerConfig::default()
                .with_backend_options([BackendOption::AddStacktrace(Severity::Error)]),
        );
        let span = TestSpan::recording();

        logger.ctx_error(&Some(span.clone()), "down");

        let records = records(&sink);
        let events = span.events();
        let (_, stack) = events[0]
            .1
            .iter()
            .find(|(key, _)| *key == "exception.stacktrace")
            .unwrap();
        assert_eq!(records[0]["stacktrace"], json!(stack));
    }

    #[test]
    fn reserved_backend_fields_are_rejected() {
        let config = LoggerConfig::default()
            .with_backend_options([BackendOption::Fields(Fields::from([("msg", "x")]))]);
        let error = Logger::new(TestLookup, config).unwrap_err();
        assert!(matches!(error, LoggerError::Configuration(_)));
    }

    #[test]
    fn console_encoder_writes_upper_case_levels() {
        let sink = BufferSink::new();
        let logger = logger(&sink, LoggerConfig::default().with_encoder(ConsoleEncoder::default()));

        logger.error("this is an error log");
        let output = sink.contents_string();
        assert!(output.contains("\tERROR \t"));
        assert!(output.contains("this is an error log"));
    }
}
