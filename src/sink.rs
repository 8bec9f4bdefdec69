use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogRecord`]s produced by the logging layer.
///
/// Implementations own their [`RecordFormatter`](crate::formatter::RecordFormatter),
/// chosen when the sink is built, and write one formatted line per record.
/// The layer calls `send` from a single background task, so calls never
/// overlap for records coming from the same channel.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write a single log record to the underlying destination.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`] produced by the layer.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was written.
    /// - `Err(..)` if the destination failed (I/O error, rotation failure).
    ///   The layer reports the failure and moves on; records are never
    ///   retried.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered output.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    /// Short label used when reporting sink failures.
    fn name(&self) -> &'static str {
        "sink"
    }
}
