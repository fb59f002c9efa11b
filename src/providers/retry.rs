use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How often and how patiently a rate-limited call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    /// Upper bound on time spent in one `generate` call, waits included.
    /// A wait that would cross it is skipped and the rate-limit error returned.
    pub budget: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RATE_LIMIT_MAX_RETRIES,
            base_delay: RATE_LIMIT_BASE_DELAY,
            budget: None,
        }
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Sleeps before the next rate-limited attempt and returns the delay after
/// that. `None` means the wait would overrun the budget.
pub(crate) async fn wait_with_backoff(
    provider: &str,
    attempt: usize,
    policy: &RetryPolicy,
    delay: Duration,
    retry_after: Option<Duration>,
    elapsed: Duration,
) -> Option<Duration> {
    let mut wait = delay;
    if let Some(retry_after) = retry_after
        && retry_after > wait
    {
        wait = retry_after.min(RATE_LIMIT_MAX_DELAY);
    }
    if let Some(budget) = policy.budget
        && elapsed.saturating_add(wait) > budget
    {
        warn!(
            "{} rate limited; giving up after {:.1}s (next wait {:.1}s exceeds {:.1}s budget)",
            provider,
            elapsed.as_secs_f32(),
            wait.as_secs_f32(),
            budget.as_secs_f32()
        );
        return None;
    }
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        provider,
        wait.as_secs_f32(),
        attempt,
        policy.max_attempts
    );
    sleep(wait).await;
    Some(next_delay(delay))
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    current.saturating_mul(2).min(RATE_LIMIT_MAX_DELAY)
}
