//! Bounded-concurrency prompt scheduler.
//!
//! Tasks run as futures polled on the caller's task, so counters need no
//! locking. At most `max_concurrent` tasks are in flight; once the set is full
//! the scheduler waits for any one task to settle before reading the next
//! prompt. While a read is pending, tasks that finish are settled right away.
//!
//! Tasks settle in completion order, which is generally not input order. Rows
//! written by a task therefore appear in completion order too.

use std::future::Future;
use std::num::NonZeroUsize;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error};

use crate::gateway::TokenUsage;

use super::cost::CostAccumulator;
use super::sink::SinkError;
use super::source::{PromptSource, PromptTask, SourceError};
use super::stats::{RunStats, StatsReporter, TaskStatus};

/// Fatal run errors. Per-prompt failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What a task reports back once it is done with its prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The row was written.
    Success { usage: Option<TokenUsage> },
    /// Nothing was written.
    Failure { message: String },
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    max_concurrent: NonZeroUsize,
}

impl Scheduler {
    pub fn new(max_concurrent: NonZeroUsize) -> Self {
        Self { max_concurrent }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.get()
    }

    /// Drive every prompt from `source` through `on_task` and return the
    /// final counters after all in-flight tasks have settled.
    ///
    /// `on_task` must absorb its own request failures into
    /// `TaskOutcome::Failure`; an `Err` from it aborts the run.
    pub async fn run<S, F, Fut>(
        &self,
        source: &mut S,
        mut on_task: F,
        cost: &mut CostAccumulator,
        reporter: &mut StatsReporter<'_>,
    ) -> Result<RunStats, PipelineError>
    where
        S: PromptSource + ?Sized,
        F: FnMut(PromptTask) -> Fut,
        Fut: Future<Output = Result<TaskOutcome, PipelineError>>,
    {
        let limit = self.max_concurrent.get();
        let mut in_flight = FuturesUnordered::new();
        let mut admitted = 0u64;

        loop {
            if in_flight.len() >= limit {
                if let Some((line, result)) = in_flight.next().await {
                    settle(line, result, cost, reporter)?;
                }
                continue;
            }

            let next = tokio::select! {
                biased;
                Some((line, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    settle(line, result, cost, reporter)?;
                    continue;
                }
                next = source.next() => next,
            };

            let task = match next {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, in_flight = in_flight.len(), "prompt source failed");
                    return Err(e.into());
                }
            };

            admitted += 1;
            debug!(
                line = task.line_number,
                seq = task.sequence_index,
                in_flight = in_flight.len() + 1,
                "admitting prompt"
            );

            let line = task.line_number;
            let fut = on_task(task);
            in_flight.push(async move { (line, fut.await) });
        }

        debug!(admitted, draining = in_flight.len(), "prompt source exhausted");

        while let Some((line, result)) = in_flight.next().await {
            settle(line, result, cost, reporter)?;
        }

        Ok(reporter.stats())
    }
}

fn settle(
    line: u64,
    result: Result<TaskOutcome, PipelineError>,
    cost: &mut CostAccumulator,
    reporter: &mut StatsReporter<'_>,
) -> Result<(), PipelineError> {
    match result {
        Ok(TaskOutcome::Success { usage }) => {
            let delta = cost.charge(usage);
            debug!(line, cost_usd = delta, "prompt succeeded");
            reporter.record(TaskStatus::Success, delta);
            Ok(())
        }
        Ok(TaskOutcome::Failure { message }) => {
            reporter.warn(&format!("line {line}: {message}"));
            reporter.record(TaskStatus::Failure, None);
            Ok(())
        }
        Err(e) => {
            error!(line, error = %e, "aborting run");
            Err(e)
        }
    }
}
