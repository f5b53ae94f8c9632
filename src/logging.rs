use std::fmt;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Installs the subscriber. Everything goes to stderr: in stdio mode the
/// protocol owns stdout.
pub fn init(level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log filter {level:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(JsonEventFormat)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

#[derive(Serialize)]
struct LogEvent<'a> {
    level: &'a str,
    event: &'a str,
    message: &'a str,
    timestamp_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

/// One JSON object per line, with `metadata` kept as a nested object.
pub struct JsonEventFormat;

impl<S, N> FormatEvent<S, N> for JsonEventFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);

        let level = event.metadata().level().to_string().to_ascii_lowercase();
        let metadata = fields
            .metadata
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)));
        let entry = LogEvent {
            level: &level,
            event: fields.event.as_deref().unwrap_or_else(|| event.metadata().name()),
            message: &fields.message,
            timestamp_ms: Utc::now().timestamp_millis(),
            metadata,
        };

        let payload = serde_json::to_string(&entry).map_err(|_| fmt::Error)?;
        writeln!(writer, "{payload}")
    }
}

#[derive(Default)]
struct EventFields {
    event: Option<String>,
    message: String,
    metadata: Option<String>,
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "metadata" => self.metadata = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

fn emit(level: Level, event: &str, message: &str, metadata: Option<Value>) {
    let metadata = metadata.map(|value| value.to_string());
    let metadata = metadata.as_deref();
    match level {
        Level::ERROR => tracing::error!(event, metadata, "{message}"),
        Level::WARN => tracing::warn!(event, metadata, "{message}"),
        Level::DEBUG => tracing::debug!(event, metadata, "{message}"),
        _ => tracing::info!(event, metadata, "{message}"),
    }
}

pub fn info(event: &str, message: &str, metadata: Value) {
    emit(Level::INFO, event, message, Some(metadata));
}

pub fn warn(event: &str, message: &str, metadata: Value) {
    emit(Level::WARN, event, message, Some(metadata));
}

pub fn error(event: &str, message: &str, metadata: Value) {
    emit(Level::ERROR, event, message, Some(metadata));
}

pub fn debug(event: &str, message: &str, metadata: Value) {
    emit(Level::DEBUG, event, message, Some(metadata));
}

pub fn info_simple(event: &str, message: &str) {
    emit(Level::INFO, event, message, None);
}

pub fn warn_simple(event: &str, message: &str) {
    emit(Level::WARN, event, message, None);
}
