// src/lib.rs

//! BIP environmental-decision crawler library.
//!
//! Crawls the Public Information Bulletins of Polish public administration
//! for environmental-procedure notices, extracts and classifies them, and
//! produces one deduplicated result set per run.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
