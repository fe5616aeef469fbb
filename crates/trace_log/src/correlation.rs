//! Coupling between logging calls and an externally owned tracing context.
//!
//! The logger never creates, ends or propagates spans. It only asks a [`SpanLookup`] for the
//! span active in a caller-supplied context, reads that span's identity to enrich records
//! ([`correlate`]) and, for severe records, attaches an event to it ([`Escalator`]).

use std::backtrace::Backtrace;

use crate::{Fields, Record, Severity, keys};

/// A span found in an execution context.
pub trait SpanHandle {
    /// The trace id, in the tracing backend's wire representation (lowercase hex).
    fn trace_id(&self) -> String;

    /// The span id, in the tracing backend's wire representation (lowercase hex).
    fn span_id(&self) -> String;

    /// The trace flags (sampling decision), in the backend's wire representation.
    fn trace_flags(&self) -> String;

    /// Whether the span still accepts events.
    fn is_recording(&self) -> bool {
        true
    }

    /// Attaches an event with the given attributes to the span.
    fn add_event(&self, name: &'static str, attributes: Vec<(&'static str, String)>);

    /// Marks the span as failed.
    fn set_error_status(&self, _description: &str) {}
}

impl<S: SpanHandle + ?Sized> SpanHandle for &S {
    fn trace_id(&self) -> String {
        (**self).trace_id()
    }

    fn span_id(&self) -> String {
        (**self).span_id()
    }

    fn trace_flags(&self) -> String {
        (**self).trace_flags()
    }

    fn is_recording(&self) -> bool {
        (**self).is_recording()
    }

    fn add_event(&self, name: &'static str, attributes: Vec<(&'static str, String)>) {
        (**self).add_event(name, attributes);
    }

    fn set_error_status(&self, description: &str) {
        (**self).set_error_status(description);
    }
}

/// Finds the active span of an execution context.
///
/// This is the only capability the logger needs from a tracing backend.
pub trait SpanLookup: Send + Sync {
    /// The execution context carried by callers.
    type Context;

    /// The span handle returned by [`SpanLookup::current_span`].
    type Span<'a>: SpanHandle
    where
        Self: 'a;

    /// Returns the span active in `cx`, if any.
    fn current_span<'a>(&'a self, cx: &'a Self::Context) -> Option<Self::Span<'a>>;

    /// The context of the calling thread, for backends that track one implicitly.
    ///
    /// Used when a record arrives without an explicit context, e.g. through
    /// [`LogLayer`](crate::LogLayer).
    fn ambient_context(&self) -> Option<Self::Context> {
        None
    }
}

/// A [`SpanLookup`] for applications without distributed tracing: no span is ever active.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSpans;

/// The [`SpanHandle`] of [`NoSpans`]; it cannot be constructed.
#[derive(Clone, Copy, Debug)]
pub enum NoSpan {}

impl SpanHandle for NoSpan {
    fn trace_id(&self) -> String {
        match *self {}
    }

    fn span_id(&self) -> String {
        match *self {}
    }

    fn trace_flags(&self) -> String {
        match *self {}
    }

    fn add_event(&self, _name: &'static str, _attributes: Vec<(&'static str, String)>) {
        match *self {}
    }
}

impl SpanLookup for NoSpans {
    type Context = ();
    type Span<'a> = NoSpan;

    fn current_span<'a>(&'a self, _cx: &'a ()) -> Option<NoSpan> {
        None
    }
}

/// Identity of the span a record was logged under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFields {
    /// Trace id.
    pub trace_id: String,

    /// Span id.
    pub span_id: String,

    /// Trace flags.
    pub trace_flags: String,
}

impl TraceFields {
    /// Reads the identity of `span`.
    pub fn from_span<S: SpanHandle + ?Sized>(span: &S) -> Self {
        Self {
            trace_id: span.trace_id(),
            span_id: span.span_id(),
            trace_flags: span.trace_flags(),
        }
    }

    /// Merges the trace fields into `fields`. Trace fields replace caller fields with the
    /// same keys.
    pub fn merge_into(self, fields: &mut Fields) {
        fields.insert(keys::TRACE_ID, self.trace_id);
        fields.insert(keys::SPAN_ID, self.span_id);
        fields.insert(keys::TRACE_FLAGS, self.trace_flags);
    }
}

/// Returns the trace fields of the span active in `cx`, or `None` when there is none.
pub fn correlate<L: SpanLookup + ?Sized>(lookup: &L, cx: &L::Context) -> Option<TraceFields> {
    lookup
        .current_span(cx)
        .map(|span| TraceFields::from_span(&span))
}

/// Promotes severe records to events on the active span.
#[derive(Clone, Copy, Debug)]
pub struct Escalator {
    severity: Severity,
    record_stack_trace: bool,
}

impl Escalator {
    /// Event name used for escalated records.
    pub const EVENT_NAME: &'static str = "exception";

    /// Creates an escalator for records at or above `severity`.
    pub fn new(severity: Severity, record_stack_trace: bool) -> Self {
        Self {
            severity,
            record_stack_trace,
        }
    }

    /// Whether records of `severity` are escalated.
    #[inline]
    pub fn applies_to(&self, severity: Severity) -> bool {
        severity >= self.severity
    }

    /// Captures the stack of the calling thread if stack traces are recorded.
    ///
    /// A stack already attached to `record` is reused. Must be called from the logging call
    /// itself; the stack is only meaningful there.
    pub fn capture_stack(&self, record: &Record<'_>) -> Option<String> {
        self.record_stack_trace.then(|| {
            record
                .stacktrace
                .clone()
                .unwrap_or_else(|| Backtrace::force_capture().to_string())
        })
    }

    /// Attaches `record` to `span` as an event and marks the span as failed.
    ///
    /// Does nothing if the record is below the escalation severity or the span no longer
    /// records.
    pub fn escalate<S: SpanHandle + ?Sized>(
        &self,
        span: &S,
        record: &Record<'_>,
        stack: Option<String>,
    ) {
        if !self.applies_to(record.severity) || !span.is_recording() {
            return;
        }

        let mut attributes = vec![
            (keys::EXCEPTION_MESSAGE, record.message.to_string()),
            (keys::LOG_SEVERITY, record.severity.as_str().to_string()),
        ];
        if let Some(stack) = stack {
            attributes.push((keys::EXCEPTION_STACKTRACE, stack));
        }

        span.add_event(Self::EVENT_NAME, attributes);
        span.set_error_status(&record.message);
    }
}
