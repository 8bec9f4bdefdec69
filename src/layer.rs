use crate::error::{SetupError, WriterError};
use crate::formatter::render_exception;
use crate::record::{LogRecord, Severity};
use crate::sink::LogSink;
use chrono::Local;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// How records are queued between the logging call and the writer task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Unbounded queue: every accepted record is eventually written.
    #[default]
    Unbounded,
    /// Bounded queue of the given capacity (at least 16); records arriving
    /// while it is full are dropped and counted.
    DropWhenFull(usize),
}

/// Counters kept by [`JsonLogLayer`].
#[derive(Debug, Default)]
pub struct LayerStats {
    /// Total events seen by the layer (before filtering by level).
    pub total_events: AtomicU64,
    /// Dropped because they were below the channel threshold.
    pub filtered_events: AtomicU64,
    /// Successfully enqueued into channel.
    pub enqueued_events: AtomicU64,
    /// Dropped because the queue was full or the writer had stopped.
    pub dropped_events: AtomicU64,
}

/// Point-in-time copy of [`LayerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_events: u64,
    pub filtered_events: u64,
    pub enqueued_events: u64,
    pub dropped_events: u64,
}

impl LayerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_events: self.total_events.load(Ordering::Relaxed),
            filtered_events: self.filtered_events.load(Ordering::Relaxed),
            enqueued_events: self.enqueued_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }
}

enum Message {
    Record(LogRecord),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Clone)]
enum QueueSender {
    Unbounded(mpsc::UnboundedSender<Message>),
    Bounded(mpsc::Sender<Message>),
}

impl QueueSender {
    /// Enqueue without waiting. Fails when a bounded queue is full or the
    /// writer has stopped.
    fn try_push(&self, message: Message) -> bool {
        match self {
            QueueSender::Unbounded(tx) => tx.send(message).is_ok(),
            QueueSender::Bounded(tx) => tx.try_send(message).is_ok(),
        }
    }

    async fn push(&self, message: Message) -> Result<(), WriterError> {
        let sent = match self {
            QueueSender::Unbounded(tx) => tx.send(message).is_ok(),
            QueueSender::Bounded(tx) => tx.send(message).await.is_ok(),
        };
        if sent {
            Ok(())
        } else {
            Err(WriterError::Stopped)
        }
    }
}

enum QueueReceiver {
    Unbounded(mpsc::UnboundedReceiver<Message>),
    Bounded(mpsc::Receiver<Message>),
}

impl QueueReceiver {
    async fn recv(&mut self) -> Option<Message> {
        match self {
            QueueReceiver::Unbounded(rx) => rx.recv().await,
            QueueReceiver::Bounded(rx) => rx.recv().await,
        }
    }

    /// Stop accepting new messages; already queued ones are still received.
    fn close(&mut self) {
        match self {
            QueueReceiver::Unbounded(rx) => rx.close(),
            QueueReceiver::Bounded(rx) => rx.close(),
        }
    }
}

fn queue(policy: QueuePolicy) -> (QueueSender, QueueReceiver) {
    match policy {
        QueuePolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
        }
        QueuePolicy::DropWhenFull(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(16));
            (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
        }
    }
}

/// Flush and shutdown control over a layer's writer task.
///
/// Control messages travel through the same queue as records, so a flush
/// completes only after every record logged before it has been written.
#[derive(Clone)]
pub struct LayerControl {
    sender: QueueSender,
}

impl LayerControl {
    /// Wait until every record queued so far is written and all sinks are
    /// flushed.
    pub async fn flush(&self) -> Result<(), WriterError> {
        let (done, wait) = oneshot::channel();
        self.sender.push(Message::Flush(done)).await?;
        wait.await.map_err(|_| WriterError::Stopped)
    }

    /// Ask the writer to stop accepting records. Records already queued are
    /// still written and the sinks flushed before the task exits.
    pub async fn shutdown(&self) -> Result<(), WriterError> {
        self.sender.push(Message::Shutdown).await
    }
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to the channel's sinks through a queue drained by a
/// background task.
///
/// Events below the channel threshold are discarded in `on_event`. A single
/// writer task sends each record to every sink in attach order, so output
/// lines never interleave. Failed writes are reported on stderr and not
/// retried.
pub struct JsonLogLayer {
    logger_name: String,
    min_level: Severity,
    sender: QueueSender,
    stats: Arc<LayerStats>,
}

impl JsonLogLayer {
    /// Create a new layer and spawn the task that writes queued records to
    /// `sinks` on the current Tokio runtime.
    ///
    /// **Errors**
    /// - [`SetupError::NoRuntime`] when called outside a Tokio runtime.
    ///
    /// The task exits once it receives a shutdown request or every sender
    /// is gone, after draining the queue and flushing every sink.
    pub fn new(
        logger_name: impl Into<String>,
        min_level: Severity,
        sinks: Vec<Arc<dyn LogSink>>,
        policy: QueuePolicy,
    ) -> Result<(Self, JoinHandle<()>), SetupError> {
        let runtime = Handle::try_current()?;
        let (tx, rx) = queue(policy);
        let handle = runtime.spawn(run_writer(sinks, rx));

        Ok((
            Self {
                logger_name: logger_name.into(),
                min_level,
                sender: tx,
                stats: Arc::new(LayerStats::default()),
            },
            handle,
        ))
    }

    pub fn stats(&self) -> Arc<LayerStats> {
        Arc::clone(&self.stats)
    }

    pub fn control(&self) -> LayerControl {
        LayerControl {
            sender: self.sender.clone(),
        }
    }
}

async fn run_writer(sinks: Vec<Arc<dyn LogSink>>, mut rx: QueueReceiver) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Record(record) => {
                for sink in sinks.iter() {
                    if let Err(e) = sink.send(&record).await {
                        eprintln!("{} sink failed to write log record: {}", sink.name(), e);
                    }
                }
            }
            Message::Flush(done) => {
                flush_sinks(&sinks).await;
                let _ = done.send(());
            }
            Message::Shutdown => rx.close(),
        }
    }

    flush_sinks(&sinks).await;
}

async fn flush_sinks(sinks: &[Arc<dyn LogSink>]) {
    for sink in sinks.iter() {
        if let Err(e) = sink.flush().await {
            eprintln!("{} sink failed to flush: {}", sink.name(), e);
        }
    }
}

impl<S> Layer<S> for JsonLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.stats.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        let level = Severity::from(*meta.level());
        if level < self.min_level {
            self.stats.filtered_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut message: Option<String> = None;
        let mut exception: Option<String> = None;
        let mut visitor = RecordVisitor {
            message: &mut message,
            exception: &mut exception,
        };
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Local::now(),
            logger_name: self.logger_name.clone(),
            level,
            message: message.unwrap_or_default(),
            source_line: meta.line().unwrap_or(0),
            exception,
        };

        if self.sender.try_push(Message::Record(record)) {
            self.stats.enqueued_events.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Collects the resolved `message` and any error context from an event.
///
/// Error values recorded through `record_error` become the exception text,
/// as do fields named `exception` or `error`. All other fields are ignored.
pub struct RecordVisitor<'a> {
    pub message: &'a mut Option<String>,
    pub exception: &'a mut Option<String>,
}

fn is_exception_field(field: &Field) -> bool {
    matches!(field.name(), "exception" | "error")
}

impl<'a> Visit for RecordVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else if is_exception_field(field) && !value.is_empty() {
            *self.exception = Some(value.to_string());
        }
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        if let Some(text) = render_exception(value) {
            *self.exception = Some(text);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() != "message" && !is_exception_field(field) {
            return;
        }

        let mut text = String::new();
        if write!(text, "{:?}", value).is_err() {
            return;
        }

        if field.name() == "message" {
            *self.message = Some(text);
        } else if !text.is_empty() {
            *self.exception = Some(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::error::Error;
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Default)]
    struct CaptureSink {
        records: Mutex<Vec<LogRecord>>,
    }

    #[async_trait]
    impl LogSink for CaptureSink {
        async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn send(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("disk unavailable".into())
        }
    }

    #[derive(Debug)]
    struct QueryError;

    impl std::fmt::Display for QueryError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("query timed out")
        }
    }

    impl Error for QueryError {}

    async fn capture<F: FnOnce()>(sinks: Vec<Arc<dyn LogSink>>, emit: F) -> StatsSnapshot {
        let (layer, handle) =
            JsonLogLayer::new("json_logger", Severity::Info, sinks, QueuePolicy::Unbounded).unwrap();
        let stats = layer.stats();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, emit);
        handle.await.unwrap();
        stats.snapshot()
    }

    #[tokio::test]
    async fn records_info_and_drops_debug() {
        let sink = Arc::new(CaptureSink::default());
        let stats = capture(vec![sink.clone()], || {
            tracing::debug!("too chatty");
            tracing::info!(user = 7, "hello {}", "world");
            tracing::warn!("careful");
        })
        .await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "hello world");
        assert_eq!(records[0].level, Severity::Info);
        assert_eq!(records[0].logger_name, "json_logger");
        assert!(records[0].source_line > 0);
        assert_eq!(records[1].level, Severity::Warning);
        assert_eq!(
            stats,
            StatsSnapshot {
                total_events: 3,
                filtered_events: 1,
                enqueued_events: 2,
                dropped_events: 0,
            }
        );
    }

    #[tokio::test]
    async fn captures_error_values_as_exception() {
        let sink = Arc::new(CaptureSink::default());
        capture(vec![sink.clone()], || {
            let err = QueryError;
            tracing::error!(error = &err as &(dyn Error + 'static), "lookup failed");
            tracing::error!(exception = "stack text", "explicit");
            tracing::error!("no context");
        })
        .await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].exception.as_deref(), Some("query timed out"));
        assert_eq!(records[1].exception.as_deref(), Some("stack text"));
        assert_eq!(records[2].exception, None);

        let line = crate::formatter::RecordFormatter::format(&crate::formatter::JsonFormatter, &records[0]);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let sink = Arc::new(CaptureSink::default());
        let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(FailingSink), sink.clone()];
        capture(sinks, || {
            tracing::info!("first");
            tracing::info!("second");
        })
        .await;

        let messages: Vec<_> = sink.records.lock().unwrap().iter().map(|r| r.message.clone()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn timestamps_follow_call_order() {
        let sink = Arc::new(CaptureSink::default());
        capture(vec![sink.clone()], || {
            for i in 0..50 {
                tracing::info!(iteration = i, "tick");
            }
        })
        .await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 50);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn unbounded_queue_keeps_every_record_of_a_burst() {
        let sink = Arc::new(CaptureSink::default());
        let stats = capture(vec![sink.clone()], || {
            for i in 0..5000 {
                tracing::info!("burst {}", i);
            }
        })
        .await;

        assert_eq!(sink.records.lock().unwrap().len(), 5000);
        assert_eq!(stats.dropped_events, 0);
    }

    #[tokio::test]
    async fn bounded_queue_drops_when_full() {
        let sink = Arc::new(CaptureSink::default());
        let sinks: Vec<Arc<dyn LogSink>> = vec![sink.clone()];
        let (layer, handle) =
            JsonLogLayer::new("json_logger", Severity::Info, sinks, QueuePolicy::DropWhenFull(16)).unwrap();
        let stats = layer.stats();

        // The writer cannot run until this test yields, so the queue fills.
        tracing::subscriber::with_default(Registry::default().with(layer), || {
            for i in 0..40 {
                tracing::info!("record {}", i);
            }
        });
        handle.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued_events, 16);
        assert_eq!(snapshot.dropped_events, 24);
        assert_eq!(sink.records.lock().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn shutdown_drains_queue_while_layer_is_alive() {
        let sink = Arc::new(CaptureSink::default());
        let sinks: Vec<Arc<dyn LogSink>> = vec![sink.clone()];
        let (layer, handle) =
            JsonLogLayer::new("json_logger", Severity::Info, sinks, QueuePolicy::Unbounded).unwrap();
        let stats = layer.stats();
        let control = layer.control();

        let dispatch = tracing::Dispatch::new(Registry::default().with(layer));
        let _guard = tracing::dispatcher::set_default(&dispatch);

        for i in 0..500 {
            tracing::info!("before shutdown {}", i);
        }
        control.flush().await.unwrap();
        assert_eq!(sink.records.lock().unwrap().len(), 500);

        tracing::info!("queued before the shutdown request");
        control.shutdown().await.unwrap();
        handle.await.unwrap();

        tracing::info!("after the writer stopped");
        assert_eq!(sink.records.lock().unwrap().len(), 501);
        assert_eq!(stats.snapshot().dropped_events, 1);
        assert!(matches!(control.flush().await, Err(WriterError::Stopped)));
    }

    #[test]
    fn new_outside_runtime_is_an_error() {
        let result = JsonLogLayer::new("json_logger", Severity::Info, Vec::new(), QueuePolicy::Unbounded);
        assert!(matches!(result, Err(SetupError::NoRuntime(_))));
    }
}
