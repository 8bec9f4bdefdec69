use crate::formatter::RecordFormatter;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Size threshold at which the active file is rotated (2 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 2 * 1024 * 1024;

/// Number of rotated generations kept next to the active file.
pub const DEFAULT_BACKUP_COUNT: usize = 1;

/// When to rotate and how many old generations to keep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub backup_count: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
        }
    }
}

struct ActiveFile {
    file: File,
    size: u64,
}

/// File destination that rotates the active file once it would grow past
/// [`RotationPolicy::max_bytes`].
///
/// Backups are named `<file>.1` (newest) through `<file>.<backup_count>`.
/// A rotation replaces the oldest slot instead of appending to it, so with
/// the default policy there is exactly one backup file.
pub struct RotatingFileSink {
    path: PathBuf,
    policy: RotationPolicy,
    formatter: Arc<dyn RecordFormatter>,
    state: Mutex<Option<ActiveFile>>,
}

impl RotatingFileSink {
    /// Create a sink for `path`. The file is opened in append mode on the
    /// first write; existing content is kept.
    pub fn new(
        path: impl Into<PathBuf>,
        policy: RotationPolicy,
        formatter: Arc<dyn RecordFormatter>,
    ) -> Self {
        Self {
            path: path.into(),
            policy,
            formatter,
            state: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Path of backup generation `index` (1 is the most recent).
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn should_rollover(&self, current: u64, incoming: u64) -> bool {
        self.policy.max_bytes > 0 && current > 0 && current + incoming >= self.policy.max_bytes
    }

    async fn open_append(&self) -> io::Result<ActiveFile> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let size = file.metadata().await?.len();
        Ok(ActiveFile { file, size })
    }

    async fn open_truncated(&self) -> io::Result<ActiveFile> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .await?;
        Ok(ActiveFile { file, size: 0 })
    }

    /// Shift backups up one slot, move the active file into slot 1 and start
    /// a fresh active file.
    async fn rollover(&self, state: &mut Option<ActiveFile>) -> io::Result<()> {
        if let Some(mut active) = state.take() {
            active.file.flush().await?;
        }

        if self.policy.backup_count > 0 {
            for index in (1..self.policy.backup_count).rev() {
                let from = self.backup_path(index);
                if fs::try_exists(&from).await? {
                    replace(&from, &self.backup_path(index + 1)).await?;
                }
            }
            replace(&self.path, &self.backup_path(1)).await?;
        }

        *state = Some(self.open_truncated().await?);
        Ok(())
    }

    async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.open_append().await?);
        }

        let incoming = line.len() as u64 + 1;
        let current = state.as_ref().map(|a| a.size).unwrap_or(0);
        if self.should_rollover(current, incoming) {
            self.rollover(&mut state).await?;
        }

        let active = match state.as_mut() {
            Some(active) => active,
            None => return Err(io::Error::new(io::ErrorKind::Other, "log file not open")),
        };
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        active.file.write_all(&buf).await?;
        active.file.flush().await?;
        active.size += incoming;
        Ok(())
    }
}

/// Rename `from` over `to`, removing `to` first so the rename also
/// succeeds on platforms that refuse to overwrite.
async fn replace(from: &Path, to: &Path) -> io::Result<()> {
    match fs::remove_file(to).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(from, to).await
}

#[async_trait]
impl LogSink for RotatingFileSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let line = self.formatter.format(record);
        self.write_line(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        if let Some(active) = state.as_mut() {
            active.file.flush().await?;
            active.file.sync_data().await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rotating-file"
    }
}
