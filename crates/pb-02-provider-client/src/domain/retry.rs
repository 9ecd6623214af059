//! # Retry Policy
//!
//! Exponential backoff: `base`, doubling per attempt, capped at `max_delay`,
//! plus optional jitter of up to half the computed delay. A `Retry-After`
//! hint from the server replaces the computed delay, capped at
//! `max_retry_after`.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    pub jitter: bool,
    /// Upper bound on honoured `Retry-After` values.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
            jitter: true,
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy without jitter, convenient for deterministic timing.
    pub fn fixed(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: false,
            ..Self::default()
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt`
    /// (1-based).
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = self.multiplier.max(1).saturating_pow(exp);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay to wait after failed attempt `attempt`.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_retry_after);
        }
        let delay = self.base_backoff(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let half = (delay.as_millis() / 2) as u64;
        let jitter = if half == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..half)
        };
        delay + Duration::from_millis(jitter)
    }

    /// Sum of deterministic delays across a full run of failed attempts.
    pub fn total_base_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.base_backoff(a)).sum()
    }
}

/// Parse a `Retry-After` header: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
