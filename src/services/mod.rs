//! Service layer for the crawler.
//!
//! This module contains the business logic for:
//! - Page fetching with retry and per-host spacing (`HttpFetcher`)
//! - Listing extraction (`PageExtractor`) and its strategies
//! - Pagination and section discovery (`Navigator`)
//! - Industry classification (`Classifier`)

mod classifier;
mod extractor;
mod fetcher;
mod navigation;
pub mod strategies;
mod throttle;

pub use classifier::Classifier;
pub use extractor::{PageExtractor, PageYield, RecordRules, Records, extract_signature};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher, PageRequest};
pub use navigation::Navigator;
pub use throttle::HostThrottle;
