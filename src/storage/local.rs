//! Local filesystem storage implementation.
//!
//! Files are written atomically: the JSON goes to a `.tmp` sibling first and
//! is renamed into place, so readers never see a half-written result.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::pipeline::ResultAggregate;
use crate::storage::{ResultSink, WriteMetadata};

const LATEST: &str = "latest.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Snapshot key for a run finished at `at`.
    fn snapshot_key(at: DateTime<Utc>) -> String {
        format!("{}.json", at.format("%Y%m%dT%H%M%SZ"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ResultSink for LocalStorage {
    async fn write_result(&self, result: &ResultAggregate) -> Result<WriteMetadata> {
        let timestamp = result.metadata.finished_at.unwrap_or_else(Utc::now);
        let key = Self::snapshot_key(timestamp);

        self.write_json(&key, result).await?;
        self.write_json(LATEST, result).await?;
        log::info!(
            "Saved {} records to {}",
            result.len(),
            self.path(&key).display()
        );

        Ok(WriteMetadata {
            snapshot_location: self.path(&key).display().to_string(),
            latest_location: self.path(LATEST).display().to_string(),
            record_count: result.len(),
            timestamp,
        })
    }

    async fn load_latest(&self) -> Result<Option<ResultAggregate>> {
        let latest = self.read_json(LATEST).await?;
        if latest.is_none() {
            log::warn!("No {LATEST} found in {}", self.root_dir.display());
        }
        Ok(latest)
    }

    async fn list_snapshots(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && name != LATEST {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AdministrativeTier, ClassifiedRecord, CrawlJob, DateRange, IndustryCategory,
        ProceduralStage, RawRecord, SourceDescriptor,
    };
    use crate::pipeline::RunStatus;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;

    fn aggregate() -> ResultAggregate {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        )
        .unwrap();
        let source = SourceDescriptor {
            id: "rdos-gdansk".into(),
            name: "RDOŚ w Gdańsku".into(),
            tier: AdministrativeTier::Rdos,
            voivodeship: "pomorskie".into(),
            base_url: Url::parse("https://www.gov.pl/web/rdos-gdansk").unwrap(),
            structure_hint: None,
            listing_path: None,
        };
        let job = CrawlJob::new(0, Arc::new(source), range);
        let record = RawRecord {
            source_id: "rdos-gdansk".into(),
            publication_date: None,
            stage: ProceduralStage::Decyzja,
            signature: "RDOŚ-Gd-WOO.420.60.2024.JP.23".into(),
            description: "Decyzja o środowiskowych uwarunkowaniach dla farmy wiatrowej".into(),
            link: Url::parse("https://www.gov.pl/web/rdos-gdansk/o/1").unwrap(),
            excerpt: String::new(),
            location_hint: None,
        };

        let mut aggregate = ResultAggregate::new(range, vec![IndustryCategory::Oze]);
        aggregate.merge(ClassifiedRecord::new(record, IndustryCategory::Oze, &job));
        aggregate.finalize(RunStatus::Completed);
        aggregate
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("missing"));

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_latest().await.unwrap().is_none());
        assert!(storage.list_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("results"));
        let result = aggregate();

        let written = storage.write_result(&result).await.unwrap();
        assert_eq!(written.record_count, 1);
        assert!(written.snapshot_location.ends_with("Z.json"));

        let loaded = storage.load_latest().await.unwrap().unwrap();
        assert_eq!(loaded.records, result.records);
        assert_eq!(loaded.metadata, result.metadata);
        assert!(loaded.records[0].needs_review);

        let snapshots = storage.list_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_ne!(snapshots[0], LATEST);
    }
}
