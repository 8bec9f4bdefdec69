use crate::record::{FormattedRecord, LogRecord};
use std::error::Error;
use std::fmt::Write as _;

/// Strategy that turns a [`LogRecord`] into one line of text.
///
/// Implementations must not panic and must always return a line: the log
/// call that produced the record is never aborted by formatting. Plain
/// closures of type `Fn(&LogRecord) -> String` implement this trait too.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

impl<F> RecordFormatter for F
where
    F: Fn(&LogRecord) -> String + Send + Sync,
{
    fn format(&self, record: &LogRecord) -> String {
        self(record)
    }
}

/// Formats records as single-line JSON with a fixed key order:
/// `time, logger, level, message, line` and, when the record carries error
/// context, `exception`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl RecordFormatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut formatted = FormattedRecord::from(record);
        if let Ok(line) = serde_json::to_string(&formatted) {
            return line;
        }

        // Degraded path: emit the base fields without the exception text.
        formatted.exception = None;
        serde_json::to_string(&formatted).unwrap_or_else(|_| fallback_line(&formatted))
    }
}

/// Hand-built line used only if serde_json rejects the record outright.
fn fallback_line(record: &FormattedRecord) -> String {
    format!(
        "{{\"time\":\"{}\",\"logger\":\"{}\",\"level\":\"{}\",\"message\":\"{}\",\"line\":{}}}",
        escape(&record.time),
        escape(&record.logger),
        escape(&record.level),
        escape(&record.message),
        record.line
    )
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Render an error and its `source()` chain as trace text.
///
/// Returns `None` when the error's `Display` implementation fails or
/// renders nothing, so the caller can still emit the record without an
/// `exception` field.
pub fn render_exception(err: &(dyn Error + 'static)) -> Option<String> {
    let mut text = String::new();
    write!(text, "{}", err).ok()?;

    let mut source = err.source();
    while let Some(cause) = source {
        let mut line = String::new();
        if write!(line, "{}", cause).is_ok() {
            text.push_str("\nCaused by: ");
            text.push_str(&line);
        }
        source = cause.source();
    }

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
