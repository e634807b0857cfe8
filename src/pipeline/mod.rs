//! Crawl pipeline: run orchestration, progress and the result aggregate.
//!
//! - `Orchestrator`: dispatches one job per selected source
//! - `ResultAggregate`: deduplicated records with the failure manifest
//! - `Progress`: lock-free counters observed through `RunHandle`

mod aggregate;
mod orchestrator;
mod progress;

pub use aggregate::{DedupKey, ResultAggregate, RunMetadata, SourceFailure};
pub use orchestrator::{Orchestrator, RunHandle, RunRequest};
pub use progress::{Progress, ProgressSnapshot, RunStatus};
