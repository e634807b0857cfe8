// src/utils/log.rs

//! Formatted log blocks on top of the `log` facade.
//!
//! Records go through whatever logger the binary installs (`env_logger` in
//! the CLI); these helpers only shape banner and summary output.

use log::{LevelFilter, info};

/// Parse a configured level name, falling back to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Log a separator line
pub fn separator() {
    info!("{}", "─".repeat(60));
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    info!("{border}");
    info!("  {title}");
    info!("{border}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    info!("[SUMMARY] {title}");
    for (key, value) in items {
        info!("    {key}: {value}");
    }
}
