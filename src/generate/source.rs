//! Line-delimited prompt input.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// One non-blank prompt line, in admission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTask {
    /// Position among emitted prompts, starting at 0.
    pub sequence_index: u64,
    /// 1-based raw line number, blank lines included.
    pub line_number: u64,
    /// Trimmed, non-empty prompt text.
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open prompts {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read prompts at line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: std::io::Error,
    },
}

/// A single forward pass over prompts.
///
/// `next` must be cancel safe: the scheduler drops a pending read when an
/// in-flight task finishes first, and calls `next` again afterwards.
#[async_trait]
pub trait PromptSource: Send {
    /// Next prompt, or `None` once the input is exhausted.
    async fn next(&mut self) -> Result<Option<PromptTask>, SourceError>;
}

/// Reads prompts lazily, one line at a time.
pub struct LinePromptSource<R> {
    lines: Lines<R>,
    line_number: u64,
    emitted: u64,
}

impl LinePromptSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> LinePromptSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            emitted: 0,
        }
    }

    /// Raw lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> PromptSource for LinePromptSource<R> {
    async fn next(&mut self) -> Result<Option<PromptTask>, SourceError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|source| SourceError::Read {
                    line: self.line_number + 1,
                    source,
                })?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            let task = PromptTask {
                sequence_index: self.emitted,
                line_number: self.line_number,
                text: text.to_string(),
            };
            self.emitted += 1;
            return Ok(Some(task));
        }
    }
}

/// Count non-blank lines with a separate streaming pass, for progress totals.
pub async fn count_prompts(path: impl AsRef<Path>) -> Result<u64, SourceError> {
    let mut source = LinePromptSource::open(path).await?;
    let mut count = 0;
    while source.next().await?.is_some() {
        count += 1;
    }
    Ok(count)
}
