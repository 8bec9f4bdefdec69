use crate::config::LoggerConfig;
use crate::console::ConsoleSink;
use crate::error::SetupError;
use crate::formatter::{JsonFormatter, RecordFormatter};
use crate::layer::{JsonLogLayer, QueuePolicy};
use crate::record::Severity;
use crate::rotating::RotatingFileSink;
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A named logging channel and the destinations attached to it.
///
/// The channel is an ordinary value owned by the caller: it is built
/// explicitly, configured with [`LoggerChannel::setup`] and then turned into
/// a [`JsonLogLayer`]. Whether destinations are already attached is tracked
/// on the value itself, which is what makes `setup` idempotent.
pub struct LoggerChannel {
    name: String,
    min_level: Severity,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl LoggerChannel {
    /// Create an empty channel. The threshold starts at `INFO`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_level: Severity::Info,
            sinks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> Severity {
        self.min_level
    }

    pub fn set_min_level(&mut self, level: Severity) {
        self.min_level = level;
    }

    /// Whether a record of `level` passes the channel threshold.
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.min_level
    }

    /// Attach an additional destination.
    pub fn attach(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn destinations(&self) -> &[Arc<dyn LogSink>] {
        &self.sinks
    }

    pub fn has_destinations(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// Configure the channel with the JSON formatter.
    ///
    /// See [`LoggerChannel::setup_with_formatter`].
    pub fn setup(&mut self, config: &LoggerConfig) -> Result<(), SetupError> {
        self.setup_with_formatter(config, Arc::new(JsonFormatter))
    }

    /// Make sure the log directory exists, attach a rotating file sink and
    /// a console sink sharing `formatter`, and apply the configured
    /// threshold.
    ///
    /// **Errors**
    /// - [`SetupError::CreateLogDir`] if the directory cannot be created.
    ///
    /// **Idempotence**
    ///
    /// The directory step is a no-op when the directory exists. If the
    /// channel already has destinations none are added, so repeated calls
    /// leave exactly one file sink and one console sink.
    pub fn setup_with_formatter(
        &mut self,
        config: &LoggerConfig,
        formatter: Arc<dyn RecordFormatter>,
    ) -> Result<(), SetupError> {
        let target = config.console;
        self.configure(config, formatter, |formatter| ConsoleSink::new(target, formatter))
    }

    fn configure(
        &mut self,
        config: &LoggerConfig,
        formatter: Arc<dyn RecordFormatter>,
        console: impl FnOnce(Arc<dyn RecordFormatter>) -> ConsoleSink,
    ) -> Result<(), SetupError> {
        std::fs::create_dir_all(&config.log_dir).map_err(|source| SetupError::CreateLogDir {
            path: config.log_dir.clone(),
            source,
        })?;

        if !self.has_destinations() {
            let file = RotatingFileSink::new(config.log_path(), config.rotation, Arc::clone(&formatter));
            self.attach(Arc::new(file));
            self.attach(Arc::new(console(formatter)));
        }

        self.min_level = config.min_level;
        Ok(())
    }

    /// Turn the channel into a `tracing` layer and spawn its writer task.
    ///
    /// **Errors**
    /// - [`SetupError::NoRuntime`] when called outside a Tokio runtime.
    pub fn into_layer(self, policy: QueuePolicy) -> Result<(JsonLogLayer, JoinHandle<()>), SetupError> {
        JsonLogLayer::new(self.name, self.min_level, self.sinks, policy)
    }
}
