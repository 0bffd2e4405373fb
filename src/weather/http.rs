//! Shared HTTP client for the lookup services.
//!
//! One client for the whole process keeps the connection pool small on a
//! Pi Zero. Requests retry with exponential back-off.

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Shared HTTP client for all lookups
///
/// Configured for an embedded device:
/// - 15 second timeout, well inside one panel minute
/// - Single idle connection per host
/// - 30 second idle timeout
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .pool_max_idle_per_host(1)
        .pool_idle_timeout(Duration::from_secs(30))
        .user_agent(concat!("papierek/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
});

/// Lookup transport errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {status}")]
    Status { status: u16 },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No attempts made")]
    NoAttempts,
}

/// Retry settings
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay between attempts (doubled each attempt)
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given zero-based attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.retry_delay * 2u32.saturating_pow(attempt - 1)
        }
    }
}

/// GET `url` with `query` and decode the JSON body
pub async fn get_json<T: DeserializeOwned>(
    url: &str,
    query: &[(&str, String)],
    policy: &RetryPolicy,
) -> Result<T, HttpError> {
    let bytes = get_with_retry(&HTTP_CLIENT, url, query, policy).await?;
    tracing::debug!("Received {} bytes from {}", bytes.len(), url);
    Ok(serde_json::from_slice(&bytes)?)
}

async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    policy: &RetryPolicy,
) -> Result<bytes::Bytes, HttpError> {
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.delay_before(attempt);
            tracing::debug!(
                "Retry attempt {}/{}, waiting {:?}",
                attempt + 1,
                policy.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match client.get(url).query(query).send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    match response.bytes().await {
                        Ok(bytes) => return Ok(bytes),
                        Err(e) => {
                            let e = e.without_url();
                            tracing::warn!("Failed to read response body: {}", e);
                            last_error = Some(HttpError::Request(e));
                        }
                    }
                } else if status.is_client_error() {
                    // Bad key or bad query, retrying will not help
                    tracing::warn!("HTTP error: {} for {}", status, url);
                    return Err(HttpError::Status {
                        status: status.as_u16(),
                    });
                } else {
                    tracing::warn!("HTTP error: {} for {}", status, url);
                    last_error = Some(HttpError::Status {
                        status: status.as_u16(),
                    });
                }
            }
            Err(e) => {
                // The query carries the API key
                let e = e.without_url();
                tracing::warn!("Request failed: {}", e);
                last_error = Some(HttpError::Request(e));
            }
        }
    }

    Err(last_error.unwrap_or(HttpError::NoAttempts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_an_error() {
        let policy = RetryPolicy {
            max_attempts: 0,
            retry_delay: Duration::ZERO,
        };
        let result: Result<serde_json::Value, _> =
            get_json("http://127.0.0.1:9/", &[], &policy).await;
        assert!(matches!(result, Err(HttpError::NoAttempts)));
    }
}
