//! Crawl job bookkeeping.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FetchError, Result};

use super::SourceDescriptor;

/// Inclusive range of publication dates a run is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(AppError::validation(format!(
                "date range start {from} is after its end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Unknown dates are always admitted; they are flagged for review later.
    pub fn admits(&self, date: Option<NaiveDate>) -> bool {
        date.is_none_or(|d| self.contains(d))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

/// One source's crawl within a run.
///
/// Only the orchestrator's merge loop mutates jobs. A terminal status is
/// never overwritten.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub id: usize,
    pub source: Arc<SourceDescriptor>,
    pub date_range: DateRange,
    pub status: JobStatus,
    pub error: Option<FetchError>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub records_found: usize,
}

impl CrawlJob {
    pub fn new(id: usize, source: Arc<SourceDescriptor>, date_range: DateRange) -> Self {
        Self {
            id,
            source,
            date_range,
            status: JobStatus::Pending,
            error: None,
            pages_fetched: 0,
            pages_failed: 0,
            records_found: 0,
        }
    }

    pub fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
    }

    pub fn succeed(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Succeeded;
        }
    }

    /// A timeout of the entry page marks the job `TimedOut`; anything else
    /// marks it `Failed`.
    pub fn fail(&mut self, error: FetchError) {
        if self.status.is_terminal() {
            return;
        }
        self.status = if error == FetchError::Timeout {
            JobStatus::TimedOut
        } else {
            JobStatus::Failed
        };
        self.error = Some(error);
    }

    /// The per-source time budget ran out; records merged so far are kept.
    pub fn time_out(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::TimedOut;
            self.error = Some(FetchError::Timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdministrativeTier;
    use url::Url;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn job() -> CrawlJob {
        let source = SourceDescriptor {
            id: "gw-test".into(),
            name: "Gmina Test".into(),
            tier: AdministrativeTier::RuralMunicipality,
            voivodeship: "lubuskie".into(),
            base_url: Url::parse("https://bip.test.pl").unwrap(),
            structure_hint: None,
            listing_path: None,
        };
        let range = DateRange::new(ymd(2026, 1, 1), ymd(2026, 1, 31)).unwrap();
        CrawlJob::new(0, Arc::new(source), range)
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let range = DateRange::new(ymd(2026, 1, 1), ymd(2026, 1, 31)).unwrap();
        assert!(range.admits(Some(ymd(2026, 1, 1))));
        assert!(range.admits(Some(ymd(2026, 1, 31))));
        assert!(!range.admits(Some(ymd(2025, 12, 31))));
        assert!(!range.admits(Some(ymd(2026, 2, 1))));
        assert!(range.admits(None));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DateRange::new(ymd(2026, 2, 1), ymd(2026, 1, 1)).is_err());
    }

    #[test]
    fn test_status_transitions() {
        let mut job = job();
        job.start();
        assert_eq!(job.status, JobStatus::Running);
        job.fail(FetchError::HttpStatus { code: 503 });
        assert_eq!(job.status, JobStatus::Failed);

        // Terminal states stick.
        job.succeed();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_entry_timeout_marks_timed_out() {
        let mut job = job();
        job.start();
        job.fail(FetchError::Timeout);
        assert_eq!(job.status, JobStatus::TimedOut);
        assert!(job.status.is_failure());
    }
}
