//! Environment variable names read by [`LoggerConfig::from_env`].
//!
//! These are purely helpers; the channel, sinks and formatter never read
//! the environment themselves.
//!
//! [`LoggerConfig::from_env`]: crate::config::LoggerConfig::from_env

/// Directory holding the active log file and its backups, e.g. `./logs`.
pub const JSON_LOG_DIR_ENV: &str = "JSON_LOG_DIR";

/// File name of the active log file inside the log directory.
pub const JSON_LOG_FILE_ENV: &str = "JSON_LOG_FILE";

/// Rotation threshold in bytes.
pub const JSON_LOG_MAX_BYTES_ENV: &str = "JSON_LOG_MAX_BYTES";

/// Number of rotated generations to keep.
pub const JSON_LOG_BACKUPS_ENV: &str = "JSON_LOG_BACKUPS";

/// Minimum severity, e.g. `INFO` or `WARNING`.
pub const JSON_LOG_LEVEL_ENV: &str = "JSON_LOG_LEVEL";

/// Console stream: `stdout` or `stderr`.
pub const JSON_LOG_CONSOLE_ENV: &str = "JSON_LOG_CONSOLE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an environment variable, falling back to `default` when
/// it is unset or does not parse.
pub fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
