// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod job;
mod record;
mod source;

// Re-export all public types
pub use config::{
    CategoryRule, ClassificationConfig, Config, CrawlerConfig, ExtractionConfig, ListingPattern,
    LoggingConfig, OutputConfig, RunConfig, StageRule,
};
pub use job::{CrawlJob, DateRange, JobStatus};
pub use record::{ClassifiedRecord, IndustryCategory, ProceduralStage, RawRecord};
pub use source::{AdministrativeTier, SourceDescriptor, SourceRegistry, SourceSelection};
