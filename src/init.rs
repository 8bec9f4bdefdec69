use crate::channel::LoggerChannel;
use crate::config::LoggerConfig;
use crate::error::{SetupError, WriterError};
use crate::layer::{LayerControl, LayerStats, StatsSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Handle returned by [`init_json_logging`].
///
/// The global subscriber owns the layer for the rest of the process, so the
/// writer task only stops through [`LoggerHandle::shutdown`]. Call it before
/// the runtime goes away, or records still queued are lost.
pub struct LoggerHandle {
    log_path: PathBuf,
    stats: Arc<LayerStats>,
    control: LayerControl,
    worker: JoinHandle<()>,
}

impl LoggerHandle {
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait until every record logged so far is written and flushed.
    pub async fn flush(&self) -> Result<(), WriterError> {
        self.control.flush().await
    }

    /// Write out everything still queued, flush the sinks and stop the
    /// writer task. Events logged afterwards are counted as dropped.
    pub async fn shutdown(self) -> Result<(), WriterError> {
        self.control.shutdown().await?;
        self.worker.await?;
        Ok(())
    }
}

/// Set up a JSON logging channel and install it as the global `tracing`
/// subscriber.
///
/// **Parameters**
/// - `config`: [`LoggerConfig`] naming the channel, log directory,
///   rotation policy, threshold, console stream and queue policy.
///
/// **Errors**
/// - [`SetupError::NoRuntime`] when called outside a Tokio runtime. Nothing
///   is created in that case.
/// - [`SetupError::CreateLogDir`] if the log directory cannot be created.
/// - [`SetupError::SubscriberInstalled`] if a global subscriber already
///   exists in this process.
pub fn init_json_logging(config: LoggerConfig) -> Result<LoggerHandle, SetupError> {
    Handle::try_current()?;

    let mut channel = LoggerChannel::new(config.channel_name.clone());
    channel.setup(&config)?;

    let (layer, worker) = channel.into_layer(config.queue)?;
    let stats = layer.stats();
    let control = layer.control();

    tracing_subscriber::registry().with(layer).try_init()?;

    Ok(LoggerHandle {
        log_path: config.log_path(),
        stats,
        control,
        worker,
    })
}

/// Initialize JSON logging with the defaults: `./logs/application.log`,
/// 2 MiB rotation with one backup, `INFO` threshold, console on stderr.
///
/// Equivalent to calling [`init_json_logging`] with
/// [`LoggerConfig::default`].
pub fn init_default_logging() -> Result<LoggerHandle, SetupError> {
    init_json_logging(LoggerConfig::default())
}
