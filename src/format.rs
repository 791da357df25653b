//! JSON event formatter that renders records according to an [`EncoderConfig`].

use std::backtrace::Backtrace;
use std::fmt;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{JsonFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

use crate::encoder::EncoderConfig;
use crate::routing::is_at_least;

/// Renders each event as one JSON object per line.
///
/// Field order: time, level, logger, caller, message, stacktrace, initial
/// fields, fields of the enclosing spans (outermost first), event fields.
/// Span fields are read from the [`JsonFields`] formatter, so the fmt layer
/// must be built with `.fmt_fields(JsonFields::new())`.
#[derive(Debug, Clone)]
pub struct JsonEncoder {
    config: EncoderConfig,
    caller: bool,
    stacktrace_level: Option<Level>,
    initial_fields: Map<String, Value>,
}

impl JsonEncoder {
    /// Encoder with caller annotation on and stacktraces off.
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            caller: true,
            stacktrace_level: None,
            initial_fields: Map::new(),
        }
    }

    /// Enable or disable the caller field.
    pub fn with_caller(mut self, caller: bool) -> Self {
        self.caller = caller;
        self
    }

    /// Attach a captured stacktrace to events at `level` and above.
    pub fn with_stacktrace_level(mut self, level: Option<Level>) -> Self {
        self.stacktrace_level = level;
        self
    }

    /// Fields added to every record.
    pub fn with_initial_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.initial_fields.extend(fields);
        self
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

impl<S> FormatEvent<S, JsonFields> for JsonEncoder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, JsonFields>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let enc = &self.config;
        let mut record = Map::new();

        let stamp = enc.time_encoding.encode_now().map_err(|_| fmt::Error)?;
        put(&mut record, &enc.time_key, Value::String(stamp));
        put(
            &mut record,
            &enc.level_key,
            Value::String(enc.level_encoding.encode(meta.level()).into_owned()),
        );
        put(
            &mut record,
            &enc.name_key,
            Value::String(meta.target().to_string()),
        );
        if self.caller
            && let Some(file) = meta.file()
        {
            put(
                &mut record,
                &enc.caller_key,
                Value::String(enc.caller_encoding.encode(file, meta.line())),
            );
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if let Some(message) = visitor.message {
            put(&mut record, &enc.message_key, Value::String(message));
        }

        if self
            .stacktrace_level
            .is_some_and(|threshold| is_at_least(meta.level(), &threshold))
        {
            put(
                &mut record,
                &enc.stacktrace_key,
                Value::String(Backtrace::force_capture().to_string()),
            );
        }

        record.extend(self.initial_fields.clone());

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<JsonFields>>()
                    && let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&fields.fields)
                {
                    record.extend(fields);
                }
            }
        }

        record.extend(visitor.fields);

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writer.write_str(&line)?;
        writer.write_str(&enc.line_ending)
    }
}

fn put(record: &mut Map<String, Value>, key: &str, value: Value) {
    if !key.is_empty() {
        record.insert(key.to_string(), value);
    }
}

/// Collects event fields, keeping the `message` field apart.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}
