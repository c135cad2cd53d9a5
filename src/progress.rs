//! Progress observers for the CLI.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::generate::{ProgressObserver, ProgressSnapshot, RunStats};

/// Format spend as shown in progress and summary lines.
pub fn format_spend(spend_usd: Option<f64>) -> String {
    match spend_usd {
        Some(usd) => format!("${usd:.4}"),
        None => "n/a".to_string(),
    }
}

pub fn summary_line(stats: &RunStats) -> String {
    format!(
        "{} completed: {} ok, {} failed, spend {}",
        stats.completed,
        stats.ok,
        stats.err,
        format_spend(stats.spend_usd)
    )
}

/// Interactive progress bar on stderr.
pub struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    pub fn new(total: Option<u64>) -> Self {
        let bar = ProgressBar::new(total.unwrap_or(0));
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self, stats: &RunStats) {
        self.bar.finish_with_message(summary_line(stats));
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressObserver for BarObserver {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        if let Some(total) = snapshot.total {
            self.bar.set_length(total.max(snapshot.completed));
        }
        self.bar.set_position(snapshot.completed);
        self.bar.set_message(format!(
            "ok {} err {} {}",
            snapshot.ok,
            snapshot.err,
            format_spend(snapshot.spend_usd)
        ));
    }

    fn on_warning(&self, message: &str) {
        self.bar.println(format!("warning: {message}"));
    }
}

/// Non-interactive observer: snapshots at debug level, warnings at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        tracing::debug!(
            completed = snapshot.completed,
            total = snapshot.total,
            ok = snapshot.ok,
            err = snapshot.err,
            spend_usd = snapshot.spend_usd,
            "progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_formats_spend() {
        let stats = RunStats {
            completed: 3,
            ok: 2,
            err: 1,
            spend_usd: Some(0.012345),
        };
        assert_eq!(
            summary_line(&stats),
            "3 completed: 2 ok, 1 failed, spend $0.0123"
        );
        assert_eq!(format_spend(None), "n/a");
    }

    #[test]
    fn bar_tracks_snapshots() {
        let observer = BarObserver::new(Some(2));
        observer.bar.set_draw_target(ProgressDrawTarget::hidden());
        observer.on_progress(ProgressSnapshot {
            completed: 1,
            total: Some(2),
            ok: 1,
            err: 0,
            spend_usd: None,
        });
        assert_eq!(observer.bar.position(), 1);
        assert_eq!(observer.bar.length(), Some(2));
    }
}
