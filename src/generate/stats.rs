//! Run counters and progress notification.

use serde::Serialize;

/// Aggregate counters for one run. `completed == ok + err` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub completed: u64,
    pub ok: u64,
    pub err: u64,
    /// `None` when cost tracking is disabled for the run.
    pub spend_usd: Option<f64>,
}

/// Immutable view handed to progress observers after every change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: Option<u64>,
    pub ok: u64,
    pub err: u64,
    pub spend_usd: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Failure,
}

/// Receives progress snapshots and warning lines.
///
/// Called inline from the scheduler; implementations must return quickly.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);

    fn on_warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Discards snapshots; warnings still go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _snapshot: ProgressSnapshot) {}
}

/// Single-writer owner of `RunStats`.
pub struct StatsReporter<'a> {
    stats: RunStats,
    total: Option<u64>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> StatsReporter<'a> {
    pub fn new(total: Option<u64>, track_cost: bool, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            stats: RunStats {
                spend_usd: track_cost.then_some(0.0),
                ..RunStats::default()
            },
            total,
            observer,
        }
    }

    pub fn record(&mut self, status: TaskStatus, cost_delta: Option<f64>) {
        self.stats.completed += 1;
        match status {
            TaskStatus::Success => self.stats.ok += 1,
            TaskStatus::Failure => self.stats.err += 1,
        }
        if let (Some(spend), Some(delta)) = (self.stats.spend_usd.as_mut(), cost_delta) {
            *spend += delta;
        }
        self.observer.on_progress(self.snapshot());
    }

    pub fn warn(&self, message: &str) {
        self.observer.on_warning(message);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.stats.completed,
            total: self.total,
            ok: self.stats.ok,
            err: self.stats.err,
            spend_usd: self.stats.spend_usd,
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn finish(self) -> RunStats {
        self.stats
    }
}
