// src/services/throttle.rs

//! Per-host request spacing.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::FetchError;
use crate::utils::url::host_key;

/// Keeps consecutive requests to one host at least `spacing` apart.
///
/// Shared by every fetch in a run. Different hosts never wait on each other.
pub struct HostThrottle {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    spacing: Duration,
}

impl HostThrottle {
    /// A zero spacing disables throttling.
    pub fn new(spacing: Duration) -> Self {
        let limiter = Quota::with_period(spacing)
            .map(|quota| RateLimiter::keyed(quota.allow_burst(NonZeroU32::MIN)));
        Self { limiter, spacing }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for the host's next slot, or return `Cancelled`.
    pub async fn wait(&self, url: &Url, cancel: &CancellationToken) -> Result<(), FetchError> {
        let Some(limiter) = &self.limiter else {
            return if cancel.is_cancelled() {
                Err(FetchError::Cancelled)
            } else {
                Ok(())
            };
        };
        let key = host_key(url);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = limiter.until_key_ready(&key) => Ok(()),
        }
    }
}
