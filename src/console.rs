use crate::formatter::RecordFormatter;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Which standard stream a [`ConsoleSink`] writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    #[default]
    Stderr,
}

impl FromStr for ConsoleTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(ConsoleTarget::Stdout),
            "stderr" => Ok(ConsoleTarget::Stderr),
            other => Err(format!("unknown console target: {}", other)),
        }
    }
}

type ConsoleWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Console destination writing one formatted line per record.
pub struct ConsoleSink {
    formatter: Arc<dyn RecordFormatter>,
    // The lock also keeps concurrent sends from interleaving partial lines.
    writer: Mutex<ConsoleWriter>,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget, formatter: Arc<dyn RecordFormatter>) -> Self {
        let writer: ConsoleWriter = match target {
            ConsoleTarget::Stdout => Box::new(tokio::io::stdout()),
            ConsoleTarget::Stderr => Box::new(tokio::io::stderr()),
        };
        Self::with_writer(writer, formatter)
    }

    /// Console sink writing to an arbitrary stream, e.g. a pipe or an
    /// in-memory buffer.
    pub fn with_writer(
        writer: impl AsyncWrite + Send + Unpin + 'static,
        formatter: Arc<dyn RecordFormatter>,
    ) -> Self {
        Self {
            formatter,
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut line = self.formatter.format(record);
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// In-memory writer whose contents stay readable after being handed to a
/// sink.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}
