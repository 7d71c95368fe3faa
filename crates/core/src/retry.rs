//! Retry policy as a pure decision procedure.
//!
//! Callers own the actual sleeping and re-invocation; this module only answers
//! "given that attempt N ended with this outcome, do we try again, and after
//! how long?". Keeping the decision pure lets retry-count and backoff-shape
//! properties be tested without wall-clock delays.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Default wait applied to rate-limit responses that carry no usable
/// server-supplied delay.
pub const DEFAULT_RATE_LIMIT_DELAY_SECS: u64 = 2;

/// How a single external call ended, as far as retry classification cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    NetworkError,
    Timeout,
    HttpStatus(u16),
    /// A rate-limit response that carried a parsed retry-after hint.
    ServerSuppliedDelay(u64),
}

#[derive(Clone, Copy, Debug)]
pub enum Backoff {
    /// Exact per-attempt delays in milliseconds; the last entry repeats.
    FixedSchedule(&'static [u64]),
    /// `base_ms * 2^(attempt-1)` capped at `cap_ms`, plus uniform jitter in
    /// `0..=jitter_ms`.
    ExponentialJitter { base_ms: u64, cap_ms: u64, jitter_ms: u64 },
}

impl Backoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::FixedSchedule(schedule) => {
                let index = (attempt as usize).min(schedule.len().saturating_sub(1));
                Duration::from_millis(schedule.get(index).copied().unwrap_or(0))
            }
            Self::ExponentialJitter { base_ms, cap_ms, jitter_ms } => {
                let exponent = attempt.saturating_sub(1).min(16);
                let base = base_ms.saturating_mul(1u64 << exponent).min(*cap_ms);
                let jitter = if *jitter_ms == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=*jitter_ms)
                };
                Duration::from_millis(base + jitter)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn stop() -> Self {
        Self { retry: false, delay: Duration::ZERO }
    }

    fn after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }
}

/// Pure retry policy: total attempt budget plus a backoff shape.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

const ERP_SCHEDULE_MS: &[u64] = &[0, 1_000, 2_000];

impl RetryPolicy {
    /// Persistence and directory calls: 3 total attempts on a fixed
    /// 0ms/1s/2s schedule.
    pub fn erp() -> Self {
        Self { max_attempts: 3, backoff: Backoff::FixedSchedule(ERP_SCHEDULE_MS) }
    }

    /// Classification calls: 2 additional attempts with exponential backoff
    /// (base 1s, cap 3s, jitter up to 500ms).
    pub fn classifier() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::ExponentialJitter { base_ms: 1_000, cap_ms: 3_000, jitter_ms: 500 },
        }
    }

    /// Audit writes: one retry, no delay shaping beyond the fixed schedule.
    pub fn audit() -> Self {
        Self { max_attempts: 2, backoff: Backoff::FixedSchedule(ERP_SCHEDULE_MS) }
    }

    /// Decide whether to retry after `attempt` (1-based, counting the call
    /// that just failed) ended with `outcome`.
    pub fn decide(&self, attempt: u32, outcome: &CallOutcome) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::stop();
        }

        match outcome {
            CallOutcome::HttpStatus(401) => RetryDecision::stop(),
            CallOutcome::ServerSuppliedDelay(secs) => {
                RetryDecision::after(Duration::from_secs(*secs))
            }
            CallOutcome::HttpStatus(429) => {
                RetryDecision::after(Duration::from_secs(DEFAULT_RATE_LIMIT_DELAY_SECS))
            }
            CallOutcome::HttpStatus(status) if *status >= 500 => {
                RetryDecision::after(self.backoff.delay_for(attempt))
            }
            CallOutcome::HttpStatus(_) => RetryDecision::stop(),
            CallOutcome::NetworkError | CallOutcome::Timeout => {
                RetryDecision::after(self.backoff.delay_for(attempt))
            }
        }
    }
}

/// Parse a retry-after value: either whole seconds or an HTTP-date, converted
/// to a wait measured from `now`. Unparsable values yield `None` and callers
/// fall back to [`DEFAULT_RATE_LIMIT_DELAY_SECS`].
pub fn parse_retry_after(raw: &str, now: DateTime<Utc>) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(secs);
    }
    let date = DateTime::parse_from_rfc2822(trimmed).ok()?;
    let wait = date.with_timezone(&Utc) - now;
    Some(wait.num_seconds().max(0) as u64)
}
