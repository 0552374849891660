//! Retry tuning for platform calls made on behalf of the live chat.
//!
//! Comment posts and command round trips sit on an operator's reply path, so
//! waits stay short: backoff tops out at [`RETRY_MAX_DELAY`] and a
//! `retry-after` longer than that gives up instead of stalling the relay.
//! Helper shape follows the GitHub issues bridge retry helpers.

use std::time::Duration;

pub(crate) const RETRY_ATTEMPT_HEADER: &str = "x-castline-retry-attempt";
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);
pub(crate) const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Delay before retrying after `attempt` failed, or `None` to give up.
    pub(crate) fn delay_after(&self, attempt: usize, retry_after: Option<Duration>) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        if let Some(requested) = retry_after {
            return (requested <= RETRY_MAX_DELAY).then(|| requested.max(self.base_delay));
        }
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let scaled = self.base_delay.saturating_mul(2_u32.saturating_pow(exponent));
        Some(scaled.min(RETRY_MAX_DELAY))
    }
}

/// Reads a delta-seconds `retry-after`; HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Throttling, request timeouts and gateway failures; other errors are final.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504)
}

pub(crate) fn truncate_for_error(text: &str) -> String {
    if text.chars().count() <= ERROR_BODY_MAX_CHARS {
        return text.to_string();
    }
    let mut truncated = text.chars().take(ERROR_BODY_MAX_CHARS).collect::<String>();
    truncated.push_str("...");
    truncated
}
