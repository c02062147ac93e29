//! Transport-level retry shared by the HTTP clients

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

use super::LlmError;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound on a server-requested retry-after wait
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// How many times, and how patiently, to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given retry attempt (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Send a request, retrying network errors, 408, 429 and 5xx
    ///
    /// `build` is called once per attempt since a sent request is consumed.
    /// Returns the first successful response, or the last error once
    /// retries are exhausted. Permanent errors are returned immediately.
    pub async fn send<F>(&self, build: F) -> Result<Response, LlmError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff(attempt);
                let delay = match last_error.as_ref().and_then(LlmError::retry_after) {
                    Some(retry_after) => retry_after.min(MAX_RETRY_AFTER).max(backoff),
                    None => backoff,
                };
                warn!(attempt, delay_ms = delay.as_millis() as u64, "RetryPolicy::send: retrying after transient error");
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "RetryPolicy::send: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            if response.status().is_success() {
                debug!(attempt, "RetryPolicy::send: success");
                return Ok(response);
            }

            let status = response.status().as_u16();
            let err = if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                }
            } else {
                let message = response.text().await.unwrap_or_default();
                LlmError::ApiError { status, message }
            };

            if !err.is_retryable() {
                debug!(%status, "RetryPolicy::send: permanent API error");
                return Err(err);
            }

            debug!(attempt, %status, rate_limited = err.is_rate_limit(), "RetryPolicy::send: retryable error");
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }
}
