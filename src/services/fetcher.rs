// src/services/fetcher.rs

//! Bounded page fetching with retry, redirects and per-host throttling.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::HostThrottle;
use crate::error::{FetchError, Result};
use crate::models::{CrawlerConfig, SourceDescriptor};
use crate::utils::http::create_async_client;

/// One page to fetch on behalf of a source.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub source: Arc<SourceDescriptor>,
    pub url: Url,
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Retrieves page content for the orchestrator.
///
/// Implementations must observe `cancel` promptly and report every failure
/// as a [`FetchError`]; they never panic on network conditions.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPage, FetchError>;
}

/// HTTP implementation backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
    throttle: Arc<HostThrottle>,
    backoff: ExponentialBuilder,
    ceiling: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig, throttle: Arc<HostThrottle>) -> Result<Self> {
        let client = create_async_client(config)?;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.retry_min_delay_ms))
            .with_max_delay(Duration::from_millis(config.retry_max_delay_ms))
            .with_max_times(config.max_retries)
            .with_jitter();

        Ok(Self {
            client,
            user_agents: config
                .user_agents
                .iter()
                .filter(|ua| !ua.trim().is_empty())
                .cloned()
                .collect(),
            next_agent: AtomicUsize::new(0),
            throttle,
            backoff,
            ceiling: Duration::from_secs(config.fetch_ceiling_secs),
        })
    }

    fn user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let idx = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        Some(self.user_agents[idx].as_str())
    }

    /// A single throttled attempt.
    async fn attempt(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPage, FetchError> {
        self.throttle.wait(url, cancel).await?;

        let mut request = self.client.get(url.clone());
        if let Some(agent) = self.user_agent() {
            request = request.header(USER_AGENT, agent);
        }
        let response = request.send().await?;

        let status = response.status().as_u16();
        if let Some(error) = FetchError::from_status(status) {
            return Err(error);
        }

        let final_url = response.url().clone();
        // Decodes using the declared charset (ISO-8859-2 and windows-1250 are
        // common on BIP hosts), UTF-8 otherwise.
        let body = response.text().await?;
        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPage, FetchError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(request.url.to_string()));
        }

        let source_id = request.source.id.as_str();
        let url = &request.url;
        let retrying = (|| self.attempt(url, cancel))
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(|err: &FetchError| err.is_transient() && !cancel.is_cancelled())
            .notify(|err: &FetchError, delay: Duration| {
                warn!(
                    "[{source_id}] retrying {url} in {}ms: {err}",
                    delay.as_millis()
                );
            });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = tokio::time::timeout(self.ceiling, retrying) => {
                outcome.unwrap_or(Err(FetchError::Timeout))
            }
        };

        match &result {
            Ok(page) => debug!("[{source_id}] fetched {} ({})", page.url, page.status),
            Err(err) => debug!("[{source_id}] fetch of {url} failed: {err}"),
        }
        result
    }
}
