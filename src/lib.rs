pub mod record;
pub mod formatter;
pub mod sink;
pub mod rotating;
pub mod console;
pub mod channel;
pub mod layer;

pub mod config;
pub mod env;
pub mod error;
pub mod init;

pub use channel::LoggerChannel;
pub use config::LoggerConfig;
pub use error::{SetupError, WriterError};
pub use formatter::{JsonFormatter, RecordFormatter};
pub use init::{init_default_logging, init_json_logging, LoggerHandle};
pub use record::{FormattedRecord, LogRecord, Severity};
