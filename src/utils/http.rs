// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::CrawlerConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_POLISH: &str = "pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7";

/// Redirect policy that stops after `max` hops or on a loop.
fn redirect_policy(max: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max {
            attempt.error("too many redirects")
        } else if attempt.previous().iter().any(|u| u == attempt.url()) {
            attempt.error("redirect loop")
        } else {
            attempt.follow()
        }
    })
}

/// Create a configured asynchronous HTTP client.
///
/// The user agent is set per request so that it can rotate; the client only
/// carries the per-request timeout, redirect bound and Polish-language
/// default headers.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_POLISH));

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs))
        .redirect(redirect_policy(config.max_redirects))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_default_config() {
        let config = CrawlerConfig::default();
        assert!(create_async_client(&config).is_ok());
    }
}
