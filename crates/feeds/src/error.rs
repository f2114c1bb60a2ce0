//! Error types for data-source operations.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Longest wait honoured before the single retry.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Wait after a rate limit reported without a hint. Explorer limits are per second.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

/// Errors that can occur while fetching wallet data.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded(Option<Duration>),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::Http(status.as_u16())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::ConnectionFailed(_)
            | FeedError::Timeout(_)
            | FeedError::RateLimitExceeded(_) => true,
            FeedError::Http(status) => *status >= 500,
            FeedError::ParseError(_) | FeedError::ApiError(_) => false,
        }
    }

    /// Returns a suggested retry delay for this error type, if applicable.
    /// A server-supplied rate-limit hint wins over the defaults.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimitExceeded(Some(hint)) => Some((*hint).min(MAX_RETRY_DELAY)),
            FeedError::RateLimitExceeded(None) => Some(DEFAULT_RATE_LIMIT_DELAY),
            FeedError::ConnectionFailed(_) => Some(Duration::from_secs(5)),
            FeedError::Timeout(_) => Some(Duration::from_secs(2)),
            FeedError::Http(status) if *status >= 500 => Some(Duration::from_secs(5)),
            FeedError::Http(_) | FeedError::ParseError(_) | FeedError::ApiError(_) => None,
        }
    }
}

/// Parse a `Retry-After` header value given in seconds.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success HTTP response to an error.
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let hint = parse_retry_after(
            response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        return Err(FeedError::RateLimitExceeded(hint));
    }
    Err(FeedError::Http(status.as_u16()))
}

/// Run `op`, retrying once after the suggested delay if the first error is transient.
pub async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            let delay = e.suggested_retry_delay().unwrap_or(Duration::from_secs(1));
            warn!(source = label, error = %e, delay_ms = delay.as_millis() as u64, "Retrying request");
            tokio::time::sleep(delay).await;
            op().await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_transient_classification() {
        assert!(FeedError::Timeout("t".into()).is_transient());
        assert!(FeedError::RateLimitExceeded(None).is_transient());
        assert!(FeedError::Http(503).is_transient());
        assert!(!FeedError::Http(404).is_transient());
        assert!(!FeedError::ParseError("bad".into()).is_transient());
        assert!(!FeedError::ApiError("NOTOK".into()).is_transient());
    }

    #[test]
    fn test_rate_limit_hint_is_capped() {
        let err = FeedError::RateLimitExceeded(Some(Duration::from_secs(3)));
        assert_eq!(err.suggested_retry_delay(), Some(Duration::from_secs(3)));
        let err = FeedError::RateLimitExceeded(Some(Duration::from_secs(3600)));
        assert_eq!(err.suggested_retry_delay(), Some(MAX_RETRY_DELAY));
        assert_eq!(FeedError::ApiError("x".into()).suggested_retry_delay(), None);
    }

    #[test]
    fn test_rate_limit_without_hint_waits_briefly() {
        let delay = FeedError::RateLimitExceeded(None).suggested_retry_delay();
        assert_eq!(delay, Some(DEFAULT_RATE_LIMIT_DELAY));
        assert!(DEFAULT_RATE_LIMIT_DELAY <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_rate_limit_retry_is_short() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<u32, FeedError> = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FeedError::RateLimitExceeded(None))
                } else {
                    Ok(1)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), DEFAULT_RATE_LIMIT_DELAY);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("7")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_retries_transient_once() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, FeedError> = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FeedError::Timeout("slow".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up_after_second_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, FeedError> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FeedError::RateLimitExceeded(Some(Duration::from_secs(1)))) }
        })
        .await;
        assert!(matches!(result, Err(FeedError::RateLimitExceeded(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_skips_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, FeedError> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FeedError::ParseError("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
