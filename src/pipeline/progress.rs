// src/pipeline/progress.rs

//! Lock-free run progress.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunStatus {
    Running = 0,
    Completed = 1,
    Cancelled = 2,
}

impl RunStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Completed,
            2 => Self::Cancelled,
            _ => Self::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub sources_attempted: usize,
    pub sources_total: usize,
    pub sources_completed: usize,
    pub sources_failed: usize,
    pub records_found: usize,
    pub elapsed: Duration,
    pub status: RunStatus,
}

impl ProgressSnapshot {
    /// Completed share of the selected sources, 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        if self.sources_total == 0 {
            return 1.0;
        }
        self.sources_completed as f64 / self.sources_total as f64
    }
}

/// Progress counters shared between the merge loop and observers.
///
/// Only the merge loop writes; counters never decrease and the status
/// leaves `Running` at most once.
#[derive(Debug)]
pub struct Progress {
    started: Instant,
    sources_total: usize,
    sources_attempted: AtomicUsize,
    sources_completed: AtomicUsize,
    sources_failed: AtomicUsize,
    records_found: AtomicUsize,
    status: AtomicU8,
}

impl Progress {
    pub fn new(sources_total: usize) -> Self {
        Self {
            started: Instant::now(),
            sources_total,
            sources_attempted: AtomicUsize::new(0),
            sources_completed: AtomicUsize::new(0),
            sources_failed: AtomicUsize::new(0),
            records_found: AtomicUsize::new(0),
            status: AtomicU8::new(RunStatus::Running as u8),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            sources_attempted: self.sources_attempted.load(Ordering::Acquire),
            sources_total: self.sources_total,
            sources_completed: self.sources_completed.load(Ordering::Acquire),
            sources_failed: self.sources_failed.load(Ordering::Acquire),
            records_found: self.records_found.load(Ordering::Acquire),
            elapsed: self.started.elapsed(),
            status: self.status(),
        }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn source_attempted(&self) {
        self.sources_attempted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn source_completed(&self, failed: bool) {
        if failed {
            self.sources_failed.fetch_add(1, Ordering::AcqRel);
        }
        self.sources_completed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn records_added(&self, count: usize) {
        if count > 0 {
            self.records_found.fetch_add(count, Ordering::AcqRel);
        }
    }

    /// Leave `Running`. Later calls are ignored.
    pub(crate) fn finish(&self, status: RunStatus) {
        let _ = self.status.compare_exchange(
            RunStatus::Running as u8,
            status as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_status() {
        let progress = Progress::new(3);
        progress.source_attempted();
        progress.source_attempted();
        progress.source_completed(false);
        progress.source_completed(true);
        progress.records_added(4);
        progress.records_added(0);

        let snap = progress.snapshot();
        assert_eq!(snap.sources_total, 3);
        assert_eq!(snap.sources_attempted, 2);
        assert_eq!(snap.sources_completed, 2);
        assert_eq!(snap.sources_failed, 1);
        assert_eq!(snap.records_found, 4);
        assert_eq!(snap.status, RunStatus::Running);
        assert!((snap.fraction() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_is_set_once() {
        let progress = Progress::new(1);
        progress.finish(RunStatus::Cancelled);
        progress.finish(RunStatus::Completed);
        assert_eq!(progress.status(), RunStatus::Cancelled);
    }
}
