//! [`SpanLookup`] backed by the OpenTelemetry context.
//!
//! ```
//! use opentelemetry::Context;
//! use trace_log::{BufferSink, Logger, LoggerConfig, otel::OtelSpanLookup};
//!
//! let logger = Logger::new(OtelSpanLookup, LoggerConfig::default().with_sink(BufferSink::new()))?;
//! logger.ctx_info(&Context::current(), "no span is active here");
//! # Ok::<(), trace_log::LoggerError>(())
//! ```

use opentelemetry::{
    Context, KeyValue,
    trace::{SpanRef, Status, TraceContextExt},
};

use crate::{SpanHandle, SpanLookup};

/// Looks up the span of an [`opentelemetry::Context`].
///
/// A span is considered active when its span context is valid. The ambient context is
/// [`Context::current`], so events routed through [`LogLayer`](crate::LogLayer) are
/// correlated with the span attached to the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct OtelSpanLookup;

impl SpanLookup for OtelSpanLookup {
    type Context = Context;
    type Span<'a> = SpanRef<'a>;

    fn current_span<'a>(&'a self, cx: &'a Context) -> Option<SpanRef<'a>> {
        let span = cx.span();
        span.span_context().is_valid().then_some(span)
    }

    fn ambient_context(&self) -> Option<Context> {
        Some(Context::current())
    }
}

impl SpanHandle for SpanRef<'_> {
    fn trace_id(&self) -> String {
        self.span_context().trace_id().to_string()
    }

    fn span_id(&self) -> String {
        self.span_context().span_id().to_string()
    }

    fn trace_flags(&self) -> String {
        format!("{:02x}", self.span_context().trace_flags().to_u8())
    }

    fn is_recording(&self) -> bool {
        SpanRef::is_recording(self)
    }

    fn add_event(&self, name: &'static str, attributes: Vec<(&'static str, String)>) {
        SpanRef::add_event(
            self,
            name,
            attributes
                .into_iter()
                .map(|(key, value)| KeyValue::new(key, value))
                .collect(),
        );
    }

    fn set_error_status(&self, description: &str) {
        self.set_status(Status::error(description.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
    use serde_json::{Value, json};

    use super::*;
    use crate::{BufferSink, Logger, LoggerConfig, correlate};

    fn remote_context(flags: TraceFlags) -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            flags,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn formats_ids_as_lowercase_hex() {
        let fields = correlate(&OtelSpanLookup, &remote_context(TraceFlags::SAMPLED)).unwrap();
        assert_eq!(fields.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(fields.span_id, "00f067aa0ba902b7");
        assert_eq!(fields.trace_flags, "01");

        let fields = correlate(&OtelSpanLookup, &remote_context(TraceFlags::default())).unwrap();
        assert_eq!(fields.trace_flags, "00");
    }

    #[test]
    fn empty_context_has_no_span() {
        assert!(correlate(&OtelSpanLookup, &Context::new()).is_none());
    }

    #[test]
    fn logger_correlates_with_the_context_span() {
        let sink = BufferSink::new();
        let logger =
            Logger::new(OtelSpanLookup, LoggerConfig::default().with_sink(sink.clone())).unwrap();

        logger.ctx_error(&remote_context(TraceFlags::SAMPLED), "remote failure");
        logger.ctx_error(&Context::new(), "local failure");

        let records: Vec<Value> = sink
            .lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records[0]["trace_id"], json!("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert!(records[1].get("trace_id").is_none());
    }

    #[test]
    fn recording_span_receives_the_exception_event() {
        use opentelemetry::trace::{Tracer, TracerProvider as _};
        use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let cx = Context::new().with_span(provider.tracer("trace_log").start("checkout"));

        let sink = BufferSink::new();
        let logger =
            Logger::new(OtelSpanLookup, LoggerConfig::default().with_sink(sink.clone())).unwrap();
        logger.ctx_error(&cx, "payment declined");
        cx.span().end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert!(matches!(
            &span.status,
            Status::Error { description } if description == "payment declined"
        ));

        let event = &span.events.events[0];
        assert_eq!(event.name, "exception");
        let attribute = |key: &str| {
            event
                .attributes
                .iter()
                .find(|kv| kv.key.as_str() == key)
                .map(|kv| kv.value.as_str().into_owned())
        };
        assert_eq!(attribute("exception.message").as_deref(), Some("payment declined"));
        assert_eq!(attribute("log.severity").as_deref(), Some("error"));
        assert!(attribute("exception.stacktrace").is_some());

        let record: Value = serde_json::from_str(&sink.lines()[0]).unwrap();
        assert_eq!(record["trace_id"], json!(span.span_context.trace_id().to_string()));
    }
}
