//! Append-only JSONL output.
//!
//! A single writer task owns the file. Producers enqueue whole lines and wait
//! for the writer to acknowledge them, so lines are written in enqueue order
//! and never interleave.

use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Queue depth between producers and the writer. Producers are already
/// bounded by the scheduler's admission limit.
const QUEUE_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open output {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("output writer closed")]
    Closed,
    #[error("output writer failed: {0}")]
    Join(String),
}

struct WriteRequest {
    line: String,
    ack: oneshot::Sender<Result<(), SinkError>>,
}

/// Cloneable handle for appending lines.
#[derive(Clone)]
pub struct JsonlSink {
    sender: mpsc::Sender<WriteRequest>,
}

/// Owns the writer task. Join after every `JsonlSink` clone is dropped.
pub struct SinkWorker {
    handle: Option<JoinHandle<Result<u64, SinkError>>>,
}

impl SinkWorker {
    /// Wait for the writer to drain and return the number of lines written.
    pub async fn join(mut self) -> Result<u64, SinkError> {
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(SinkError::Join(e.to_string())),
            },
            None => Ok(0),
        }
    }
}

impl JsonlSink {
    /// Create (or truncate) `path` and start the writer.
    pub async fn create(path: impl AsRef<Path>) -> Result<(Self, SinkWorker), SinkError> {
        let path = path.as_ref();
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|source| SinkError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::spawn(file))
    }

    /// Start a writer over any async byte sink.
    pub fn spawn<W>(writer: W) -> (Self, SinkWorker)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        let handle = tokio::spawn(write_loop(writer, receiver));
        (
            Self { sender },
            SinkWorker {
                handle: Some(handle),
            },
        )
    }

    /// Append one line (without trailing newline) and wait until it is written.
    pub async fn append(&self, line: String) -> Result<(), SinkError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(WriteRequest { line, ack })
            .await
            .map_err(|_| SinkError::Closed)?;
        done.await.map_err(|_| SinkError::Closed)?
    }

    /// Serialize `value` as one JSON line and append it.
    pub async fn append_json<T: Serialize>(&self, value: &T) -> Result<(), SinkError> {
        let line = serde_json::to_string(value)?;
        self.append(line).await
    }
}

async fn write_loop<W>(
    writer: W,
    mut receiver: mpsc::Receiver<WriteRequest>,
) -> Result<u64, SinkError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut written = 0u64;

    while let Some(WriteRequest { line, ack }) = receiver.recv().await {
        match write_line(&mut writer, &line).await {
            Ok(()) => {
                written += 1;
                // The producer may have been dropped; the line is written regardless.
                let _ = ack.send(Ok(()));
            }
            Err(e) => {
                tracing::error!(error = %e, "output write failed");
                let _ = ack.send(Err(SinkError::Write(std::io::Error::new(
                    e.kind(),
                    e.to_string(),
                ))));
                return Err(SinkError::Write(e));
            }
        }
    }

    writer.flush().await.map_err(SinkError::Write)?;
    writer.shutdown().await.map_err(SinkError::Write)?;
    Ok(written)
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut BufWriter<W>,
    line: &str,
) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_lines_in_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, "stale contents\n").unwrap();

        let (sink, worker) = JsonlSink::create(&path).await.unwrap();
        sink.append("{\"n\":1}".to_string()).await.unwrap();
        sink.append_json(&serde_json::json!({ "n": 2 })).await.unwrap();
        drop(sink);
        assert_eq!(worker.join().await.unwrap(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "{\"n\":1}\n{\"n\":2}\n");
    }

    #[tokio::test]
    async fn create_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = JsonlSink::create(dir.path().join("missing").join("out.jsonl")).await;
        assert!(matches!(result, Err(SinkError::Open { .. })));
    }
}
