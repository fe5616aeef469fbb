//! Provides a [`tracing_subscriber::Layer`] ([`LogLayer`]) that writes [`tracing`] events
//! through a [`Logger`].

use std::fmt;

use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use crate::{Caller, Fields, Logger, Severity, SpanLookup, keys};

/// A [`tracing_subscriber::Layer`] that hands every event to a [`Logger`].
///
/// The event's level becomes the record severity, its `message` field the record message and
/// its other fields the record fields; the event target is recorded as `target` unless the
/// event has a field of that name. When the logger's [`SpanLookup`] exposes an ambient
/// context, events are logged within it and are therefore correlated with (and escalated to)
/// the active span.
///
/// Installing the layer in the global subscriber makes the logger the process-wide backend of
/// the `tracing` macros:
///
/// ```
/// use trace_log::{BufferSink, LogLayer, Logger, LoggerConfig};
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let sink = BufferSink::new();
/// let logger = Logger::untraced(LoggerConfig::default().with_sink(sink.clone()))?;
/// let subscriber = tracing_subscriber::registry().with(LogLayer::new(logger.clone()));
///
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::warn!(pct = 5, "disk low");
/// });
/// logger.sync()?;
///
/// assert!(sink.contents_string().contains(r#""msg":"disk low""#));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct LogLayer<L: SpanLookup> {
    logger: Logger<L>,
}

impl<L: SpanLookup> LogLayer<L> {
    /// Creates a layer writing through `logger`.
    pub fn new(logger: Logger<L>) -> Self {
        Self { logger }
    }
}

impl<S, L> Layer<S> for LogLayer<L>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    L: SpanLookup + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let severity = Severity::from(*metadata.level());

        let cx = self.logger.lookup().ambient_context();
        if !self.logger.interested(severity, cx.is_some()) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        if !visitor.fields.contains_key(keys::TARGET) {
            visitor.fields.insert(keys::TARGET, metadata.target());
        }

        let caller = if self.logger.captures_caller() {
            metadata
                .file()
                .zip(metadata.line())
                .map(|(file, line)| Caller { file, line })
        } else {
            None
        };

        let message = visitor.message.unwrap_or_default();
        self.logger
            .dispatch(cx.as_ref(), severity, message, visitor.fields, caller);
    }
}

/// Collects the message and fields of an event.
#[derive(Debug, Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Fields,
}

impl EventVisitor {
    fn record_value(&mut self, field: &Field, value: serde_json::Value) {
        if field.name() == "message" {
            if self.message.is_none() {
                self.message = Some(match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                });
            }
        } else {
            self.fields.insert(field.name(), value);
        }
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string()); // `record_str()` is preferred for `message`
        } else {
            self.record_value(field, serde_json::Value::from(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            // Skip fields which are already handled
            name if name.starts_with("log.") => (),
            "message" => self.record_value(field, serde_json::Value::from(format!("{value:?}"))),
            name => {
                let name = name.strip_prefix("r#").unwrap_or(name);
                self.fields
                    .insert(name, serde_json::Value::from(format!("{value:?}")));
            }
        }
    }
}
