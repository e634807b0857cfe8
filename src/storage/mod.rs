//! Storage abstractions for run results.
//!
//! Every finished run is written as an immutable snapshot plus a `latest.json`
//! pointer copy for consumers that only want the newest result:
//!
//! ```text
//! results/
//! ├── latest.json               # Copy of the newest snapshot
//! ├── 20260115T063000Z.json     # One file per run
//! └── 20260116T063000Z.json
//! ```
//!
//! Export formats (CSV, spreadsheets) are produced downstream from these files.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::pipeline::ResultAggregate;

pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Location of the run snapshot
    pub snapshot_location: String,
    /// Location of the latest-result copy
    pub latest_location: String,
    pub record_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Destination for finished run results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist a finalized aggregate as a new snapshot and as the latest result.
    async fn write_result(&self, result: &ResultAggregate) -> Result<WriteMetadata>;

    /// The most recently written result, if any.
    async fn load_latest(&self) -> Result<Option<ResultAggregate>>;

    /// Snapshot names, oldest first.
    async fn list_snapshots(&self) -> Result<Vec<String>>;
}
