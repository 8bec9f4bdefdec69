use std::io;
use std::path::PathBuf;
use tokio::runtime::TryCurrentError;
use tokio::task::JoinError;
use tracing_subscriber::util::TryInitError;

/// Errors raised while setting up the logging channel.
///
/// All variants are fatal for startup; there is no recovery path.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateLogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the log writer needs a Tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),

    #[error("a global tracing subscriber is already installed: {0}")]
    SubscriberInstalled(#[from] TryInitError),
}

/// Errors returned when flushing or stopping the background writer.
#[derive(thiserror::Error, Debug)]
pub enum WriterError {
    #[error("log writer task has already stopped")]
    Stopped,

    #[error("log writer task failed: {0}")]
    Join(#[from] JoinError),
}
