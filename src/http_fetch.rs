//! HTTP requests against the stream origin.
//!
//! The locator makes at most two requests per run: a GET for the playlist and
//! an optional HEAD for one segment. Both go through [`fetch_with_retry`]
//! so the attempt policy lives in one place. The default policy is a single
//! attempt; callers opt in to retries through [`RetryConfig`].

use crate::error::{Result, TsIndexError};
use reqwest::{Client, Method, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of fetch attempts (no retry).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Default backoff between attempts in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Configuration for [`fetch_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (minimum 1; 0 is treated as 1).
    pub max_attempts: u32,
    /// Sleep duration between consecutive attempts.
    pub backoff: Duration,
    /// Optional per-request timeout applied to each individual attempt.
    ///
    /// When `None`, the client's own timeout applies.
    pub timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            timeout: None,
        }
    }
}

/// Send a request with `method` to `url`, retrying per `config`.
///
/// Returns the first successful (2xx) [`Response`]. Transport failures and
/// non-2xx statuses from the last attempt are reported as
/// [`TsIndexError::Fetch`].
pub async fn fetch_with_retry(
    client: &Client,
    method: Method,
    url: &str,
    config: &RetryConfig,
) -> Result<Response> {
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..max_attempts {
        match send_once(client, method.clone(), url, config).await {
            Ok(response) if response.status().is_success() => return Ok(response),

            Ok(response) => {
                warn!(
                    "{} {} returned {} (attempt {}/{})",
                    method,
                    url,
                    response.status(),
                    attempt,
                    max_attempts
                );
            }

            Err(e) => {
                warn!(
                    "{} {} failed (attempt {}/{}): {}",
                    method, url, attempt, max_attempts, e
                );
            }
        }

        warn!("Retrying in {}ms...", config.backoff.as_millis());
        tokio::time::sleep(config.backoff).await;
    }

    // Final attempt: errors are returned to the caller as-is
    let response = send_once(client, method.clone(), url, config)
        .await
        .map_err(|e| TsIndexError::fetch(url, e))?;

    debug!("{} {} -> {}", method, url, response.status());

    response
        .error_for_status()
        .map_err(|e| TsIndexError::fetch(url, e))
}

/// GET `url` and return the body as text.
pub async fn get_text(client: &Client, url: &str, config: &RetryConfig) -> Result<String> {
    let response = fetch_with_retry(client, Method::GET, url, config).await?;
    response.text().await.map_err(|e| TsIndexError::fetch(url, e))
}

/// HEAD `url` and return the response (headers only).
pub async fn head(client: &Client, url: &str, config: &RetryConfig) -> Result<Response> {
    fetch_with_retry(client, Method::HEAD, url, config).await
}

async fn send_once(
    client: &Client,
    method: Method,
    url: &str,
    config: &RetryConfig,
) -> std::result::Result<Response, reqwest::Error> {
    let mut request = client.request(method, url);
    if let Some(timeout) = config.timeout {
        request = request.timeout(timeout);
    }
    request.send().await
}
