// src/pipeline/aggregate.rs

//! Run-scoped result set with deduplication.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::RunStatus;
use crate::models::{ClassifiedRecord, CrawlJob, DateRange, IndustryCategory, JobStatus, RawRecord};
use crate::utils::text::normalize;

/// Identity of a notice across pages and sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Link plus case signature
    Signed { link: String, signature: String },
    /// Source, date and SHA-256 of the normalized description
    Unsigned {
        source_id: String,
        date: Option<NaiveDate>,
        digest: String,
    },
}

impl DedupKey {
    pub fn of(record: &RawRecord) -> Self {
        let signature = record.signature.trim();
        if signature.is_empty() {
            Self::Unsigned {
                source_id: record.source_id.clone(),
                date: record.publication_date,
                digest: hex::encode(Sha256::digest(normalize(&record.description).as_bytes())),
            }
        } else {
            Self::Signed {
                link: record.link.as_str().to_string(),
                signature: signature.to_string(),
            }
        }
    }
}

/// Collision winner: the smallest (source id, job id, description), then the
/// remaining fields so that arrival order never matters.
fn precedence(a: &ClassifiedRecord, b: &ClassifiedRecord) -> Ordering {
    a.record
        .source_id
        .cmp(&b.record.source_id)
        .then(a.job_id.cmp(&b.job_id))
        .then_with(|| a.record.description.cmp(&b.record.description))
        .then_with(|| a.record.publication_date.cmp(&b.record.publication_date))
        .then_with(|| a.record.link.as_str().cmp(b.record.link.as_str()))
        .then_with(|| a.record.excerpt.cmp(&b.record.excerpt))
}

/// A source whose crawl did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub source_name: String,
    pub status: JobStatus,
    pub error: String,
}

impl SourceFailure {
    pub fn from_job(job: &CrawlJob) -> Self {
        Self {
            source_id: job.source.id.clone(),
            source_name: job.source.name.clone(),
            status: job.status,
            error: job
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Run metadata stored with the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub date_range: DateRange,
    /// Requested categories; empty means all
    pub categories: Vec<IndustryCategory>,
    pub sources_attempted: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    /// Jobs left unfinished by cancellation
    pub sources_abandoned: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// Pages that fell back to heuristic extraction
    pub degraded_pages: usize,
    /// Records dropped by the date or category filter
    pub records_filtered: usize,
    pub status: RunStatus,
}

/// Deduplicated records plus run metadata and the failure manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultAggregate {
    pub metadata: RunMetadata,
    pub records: Vec<ClassifiedRecord>,
    pub failures: Vec<SourceFailure>,
    #[serde(skip)]
    index: HashMap<DedupKey, usize>,
}

impl ResultAggregate {
    pub fn new(date_range: DateRange, categories: Vec<IndustryCategory>) -> Self {
        Self {
            metadata: RunMetadata {
                started_at: Utc::now(),
                finished_at: None,
                date_range,
                categories,
                sources_attempted: 0,
                sources_succeeded: 0,
                sources_failed: 0,
                sources_abandoned: 0,
                pages_fetched: 0,
                pages_failed: 0,
                degraded_pages: 0,
                records_filtered: 0,
                status: RunStatus::Running,
            },
            records: Vec::new(),
            failures: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a record. Returns `true` when its key was not seen before.
    ///
    /// On a key collision the record with precedence is kept.
    pub fn merge(&mut self, record: ClassifiedRecord) -> bool {
        match self.index.entry(DedupKey::of(&record.record)) {
            Entry::Occupied(slot) => {
                let existing = &mut self.records[*slot.get()];
                if precedence(&record, existing) == Ordering::Less {
                    *existing = record;
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    pub fn record_failure(&mut self, job: &CrawlJob) {
        self.failures.push(SourceFailure::from_job(job));
    }

    /// Seal the run: newest first with unknown dates last, failures by source.
    pub fn finalize(&mut self, status: RunStatus) {
        self.records.sort_by(|a, b| {
            match (a.record.publication_date, b.record.publication_date) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| precedence(a, b))
        });
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, r)| (DedupKey::of(&r.record), idx))
            .collect();
        self.failures.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        self.metadata.status = status;
        self.metadata.finished_at = Some(Utc::now());
    }

    pub fn count_by_category(&self) -> Vec<(IndustryCategory, usize)> {
        IndustryCategory::ALL
            .iter()
            .map(|c| (*c, self.records.iter().filter(|r| r.category == *c).count()))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    pub fn needs_review(&self) -> usize {
        self.records.iter().filter(|r| r.needs_review).count()
    }
}
