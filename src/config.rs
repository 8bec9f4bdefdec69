use crate::console::ConsoleTarget;
use crate::env::{
    env_or, env_parse_or, JSON_LOG_BACKUPS_ENV, JSON_LOG_CONSOLE_ENV, JSON_LOG_DIR_ENV,
    JSON_LOG_FILE_ENV, JSON_LOG_LEVEL_ENV, JSON_LOG_MAX_BYTES_ENV,
};
use crate::layer::QueuePolicy;
use crate::record::Severity;
use crate::rotating::RotationPolicy;
use std::path::PathBuf;

pub const DEFAULT_CHANNEL_NAME: &str = "json_logger";
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_LOG_FILE: &str = "application.log";

/// Configuration of the JSON logging channel.
///
/// **Fields**
/// - `channel_name`: value of the `logger` key in every record.
/// - `log_dir`: directory created on setup; holds the active file and its
///   backups.
/// - `file_name`: name of the active log file inside `log_dir`.
/// - `rotation`: size threshold and number of backups.
/// - `min_level`: events below this severity are dropped. Defaults to
///   `INFO`, so DEBUG events never reach a sink.
/// - `console`: stream used by the console sink.
/// - `queue`: how records wait for the background writer. The default
///   queue is unbounded, so no accepted record is dropped.
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub channel_name: String,
    pub log_dir: PathBuf,
    pub file_name: String,
    pub rotation: RotationPolicy,
    pub min_level: Severity,
    pub console: ConsoleTarget,
    pub queue: QueuePolicy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: DEFAULT_LOG_FILE.to_string(),
            rotation: RotationPolicy::default(),
            min_level: Severity::Info,
            console: ConsoleTarget::default(),
            queue: QueuePolicy::default(),
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by the `JSON_LOG_*` environment variables listed
    /// in [`crate::env`]. Unset or unparsable values keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_dir: PathBuf::from(env_or(JSON_LOG_DIR_ENV, DEFAULT_LOG_DIR)),
            file_name: env_or(JSON_LOG_FILE_ENV, DEFAULT_LOG_FILE),
            rotation: RotationPolicy {
                max_bytes: env_parse_or(JSON_LOG_MAX_BYTES_ENV, defaults.rotation.max_bytes),
                backup_count: env_parse_or(JSON_LOG_BACKUPS_ENV, defaults.rotation.backup_count),
            },
            min_level: env_parse_or(JSON_LOG_LEVEL_ENV, defaults.min_level),
            console: env_parse_or(JSON_LOG_CONSOLE_ENV, defaults.console),
            ..defaults
        }
    }

    /// Full path of the active log file.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.file_name)
    }
}
