use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Utc};
use config::RetryConfig;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Server errors retried under the attempt budget.
pub(crate) const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Upper bound on the response body kept in an API error.
pub(crate) const MAX_ERROR_BODY_BYTES: usize = 4096;

const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub rate_limit_fallback: Duration,
    pub max_rate_limit_waits: Option<u32>
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            rate_limit_fallback: Duration::from_millis(config.rate_limit_fallback_ms),
            max_rate_limit_waits: config.max_rate_limit_waits
        }
    }
}

impl RetryPolicy {
    /// Backoff schedule for one call: `base * 2^attempt`, no jitter.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.backoff_base)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(3600))
            .with_max_elapsed_time(None)
            .build()
    }

    /// How long to sleep after a 429.
    ///
    /// Waits until one second past the epoch-seconds reset time when the
    /// header is present and parseable, otherwise the fallback. A reset
    /// time already in the past yields one second.
    pub fn rate_limit_wait(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
        let Some(reset) = headers
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        else {
            return self.rate_limit_fallback;
        };

        let wait = reset - now + chrono::Duration::seconds(1);
        match wait.to_std() {
            Ok(wait) if !wait.is_zero() => wait,
            _ => Duration::from_secs(1)
        }
    }
}

/// Network-level failures worth another attempt.
pub(crate) fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request() || error.is_body()
}

pub(crate) fn truncate_body(body: &[u8]) -> String {
    let end = body.len().min(MAX_ERROR_BODY_BYTES);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::backoff::Backoff;
    use reqwest::header::HeaderValue;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn test_defaults_from_config() {
        let policy = policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_base, Duration::from_secs(1));
        assert_eq!(policy.rate_limit_fallback, Duration::from_secs(60));
        assert!(policy.max_rate_limit_waits.is_none());
    }

    #[test]
    fn test_backoff_doubles() {
        let mut backoff = policy().backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_rate_limit_wait_uses_reset_header() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-RateLimit-Reset",
            HeaderValue::from_static("1700000002")
        );
        assert_eq!(
            policy().rate_limit_wait(&headers, now),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_rate_limit_wait_past_reset_is_one_second() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-RateLimit-Reset",
            HeaderValue::from_static("1699999000")
        );
        assert_eq!(
            policy().rate_limit_wait(&headers, now),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_rate_limit_wait_fallback() {
        let now = Utc::now();
        assert_eq!(
            policy().rate_limit_wait(&HeaderMap::new(), now),
            Duration::from_secs(60)
        );

        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Reset", HeaderValue::from_static("soon"));
        assert_eq!(
            policy().rate_limit_wait(&headers, now),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_truncate_body() {
        let body = vec![b'x'; MAX_ERROR_BODY_BYTES * 2];
        assert_eq!(truncate_body(&body).len(), MAX_ERROR_BODY_BYTES);
        assert_eq!(truncate_body(b"short"), "short");
    }
}
