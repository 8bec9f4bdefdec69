use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::Level;

/// Timestamp layout used for the `time` field: ISO-8601 local time with
/// microsecond precision and no offset suffix.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Severity of a [`LogRecord`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        if level == Level::ERROR {
            Severity::Error
        } else if level == Level::WARN {
            Severity::Warning
        } else if level == Level::INFO {
            Severity::Info
        } else {
            // TRACE has no counterpart and folds into DEBUG.
            Severity::Debug
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a severity name is not recognised.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" | "FATAL" => Ok(Severity::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

/// A single log event as observed by the layer, before formatting.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub logger_name: String,
    pub level: Severity,
    /// Fully resolved message text.
    pub message: String,
    /// Call-site line, `0` when the callsite did not report one.
    pub source_line: u32,
    /// Rendered error context, present only when logging from an error path.
    pub exception: Option<String>,
}

impl LogRecord {
    /// Build a record stamped with the current local time and no exception.
    pub fn new(
        logger_name: impl Into<String>,
        level: Severity,
        message: impl Into<String>,
        source_line: u32,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            logger_name: logger_name.into(),
            level,
            message: message.into(),
            source_line,
            exception: None,
        }
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}

/// Flat output shape of a formatted record.
///
/// Field declaration order is the serialization order, so the JSON key order
/// is stable: `time, logger, level, message, line[, exception]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedRecord {
    pub time: String,
    pub logger: String,
    pub level: String,
    pub message: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl From<&LogRecord> for FormattedRecord {
    fn from(record: &LogRecord) -> Self {
        FormattedRecord {
            time: record.timestamp.format(TIME_FORMAT).to_string(),
            logger: record.logger_name.clone(),
            level: record.level.as_str().to_string(),
            message: record.message.clone(),
            line: record.source_line,
            exception: record.exception.clone().filter(|e| !e.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_tracing_levels() {
        assert_eq!(Severity::from(Level::TRACE), Severity::Debug);
        assert_eq!(Severity::from(Level::DEBUG), Severity::Debug);
        assert_eq!(Severity::from(Level::INFO), Severity::Info);
        assert_eq!(Severity::from(Level::WARN), Severity::Warning);
        assert_eq!(Severity::from(Level::ERROR), Severity::Error);
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn severity_parses_names() {
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("WARN".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!(" info ".parse::<Severity>(), Ok(Severity::Info));
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn empty_exception_is_dropped() {
        let record = LogRecord::new("json_logger", Severity::Error, "boom", 7).with_exception("");
        let formatted = FormattedRecord::from(&record);
        assert_eq!(formatted.exception, None);
    }
}
