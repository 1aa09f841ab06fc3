use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Result of one per-file task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Synced,
    Skipped,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The display name carries no identifier. Permanent.
    Identifier,
    /// The metadata source failed after its retries.
    Unavailable,
    /// The metadata source answered with nothing to write.
    Empty,
    /// The unit of work died at the pool boundary.
    Worker,
}

/// Per-pipeline counters. Every recorded outcome bumps `total` and exactly
/// one of the other three.
#[derive(Debug, Default)]
pub struct Statistics {
    total: AtomicU64,
    success: AtomicU64,
    fail: AtomicU64,
    skip: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &TaskOutcome) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TaskOutcome::Synced => &self.success,
            TaskOutcome::Skipped => &self.skip,
            TaskOutcome::Failed(_) => &self.fail,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            fail: self.fail.load(Ordering::Relaxed),
            skip: self.skip.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    pub skip: u64,
}

impl StatsSnapshot {
    pub fn log(&self, pipeline: &str) {
        info!(
            pipeline,
            total = self.total,
            success = self.success,
            fail = self.fail,
            skip = self.skip,
            "pipeline statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_outcome_bumps_total_and_one_counter() {
        let stats = Statistics::new();
        stats.record(&TaskOutcome::Synced);
        stats.record(&TaskOutcome::Skipped);
        stats.record(&TaskOutcome::Failed(FailureKind::Identifier));
        stats.record(&TaskOutcome::Failed(FailureKind::Worker));
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                total: 4,
                success: 1,
                fail: 2,
                skip: 1
            }
        );
    }
}
