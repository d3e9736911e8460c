use std::fmt::{self, Write as _};

use chrono::{SecondsFormat, Utc};
use tracing::{field, Event, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, Layer, MakeWriter},
    layer,
    registry::LookupSpan,
    Layer as _,
};

use super::LoggingConfiguration;

const APP_NAME: &str = "COLLECTOR";

pub fn build_formatting_layer<S, W>(config: &LoggingConfiguration, writer: W) -> Box<dyn layer::Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    if config.log_format_json {
        Layer::new()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed()
    } else {
        Layer::new().event_format(PipeFormatter).with_writer(writer).boxed()
    }
}

/// Writes events as `<time> | COLLECTOR | <level> | (<file>:<line>) | key:value,... | message`.
struct PipeFormatter;

impl<S, N> FormatEvent<S, N> for PipeFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let metadata = event.metadata();

        write!(
            writer,
            "{} | {} | {} | ",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            APP_NAME,
            metadata.level()
        )?;

        match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => write!(writer, "({}:{})", file, line)?,
            _ => write!(writer, "(unknown:0)")?,
        }

        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);
        visitor.write_to(&mut writer)?;

        writeln!(writer)
    }
}

/// Collects structured fields and the message separately, since the message must be written last.
#[derive(Default)]
struct FieldCollector {
    fields: String,
    message: String,
}

impl FieldCollector {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(',');
        }
        let _ = write!(self.fields, "{}:{}", name, value);
    }

    fn write_to(&self, writer: &mut Writer<'_>) -> fmt::Result {
        if !self.fields.is_empty() {
            write!(writer, " | {}", self.fields)?;
        }
        write!(writer, " | {}", self.message)
    }
}

impl field::Visit for FieldCollector {
    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("\"{:?}\"", value));
        }
    }

    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("\"{}\"", value));
        }
    }

    fn record_i64(&mut self, field: &field::Field, value: i64) {
        self.push_field(field.name(), format_args!("{}", value));
    }

    fn record_u64(&mut self, field: &field::Field, value: u64) {
        self.push_field(field.name(), format_args!("{}", value));
    }

    fn record_f64(&mut self, field: &field::Field, value: f64) {
        self.push_field(field.name(), format_args!("{}", value));
    }

    fn record_bool(&mut self, field: &field::Field, value: bool) {
        self.push_field(field.name(), format_args!("{}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_written_after_fields() {
        let mut collector = FieldCollector::default();
        collector.message.push_str("Check run failed.");
        collector.push_field("check.id", format_args!("\"{}\"", "disk:1A2B"));
        collector.push_field("attempt", format_args!("{}", 3));

        let mut out = String::new();
        collector.write_to(&mut Writer::new(&mut out)).unwrap();

        assert_eq!(out, " | check.id:\"disk:1A2B\",attempt:3 | Check run failed.");
    }

    #[test]
    fn fields_are_omitted_when_absent() {
        let collector = FieldCollector {
            fields: String::new(),
            message: "Scheduler started.".to_string(),
        };

        let mut out = String::new();
        collector.write_to(&mut Writer::new(&mut out)).unwrap();

        assert_eq!(out, " | Scheduler started.");
    }
}
