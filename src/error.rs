// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Only configuration, registry and storage problems surface as `AppError`.
/// Per-source fetch failures are [`FetchError`]s recorded in the run manifest.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Source registry is malformed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Nothing to dispatch: the registry or the source selection is empty
    #[error("No sources selected for crawling")]
    EmptySelection,

    /// The orchestrator task panicked or was aborted
    #[error("Run aborted: {0}")]
    RunAborted(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a registry error.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry(message.into())
    }
}

/// Whether a failed fetch is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

/// Typed failure of a single page fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP status {code}")]
    HttpStatus { code: u16 },

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("cancelled")]
    Cancelled,

    /// The task fetching or extracting the page panicked.
    #[error("page worker crashed: {0}")]
    WorkerCrashed(String),
}

impl FetchError {
    /// Map a non-success status code to an error. Returns `None` for 2xx.
    pub fn from_status(code: u16) -> Option<Self> {
        if (200..300).contains(&code) {
            None
        } else {
            Some(Self::HttpStatus { code })
        }
    }

    /// Classify the failure for the retry policy.
    ///
    /// Timeouts, connection errors, 5xx and 429 are transient. Other 4xx,
    /// redirect loops, malformed URLs, crashed workers and cancellation are
    /// permanent.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout | Self::Connection(_) => FailureClass::Transient,
            Self::HttpStatus { code } if *code == 429 || *code >= 500 => FailureClass::Transient,
            _ => FailureClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                code: status.as_u16(),
            }
        } else {
            Self::Connection(err.to_string())
        }
    }
}
