//! # Replay Guard
//!
//! Rejects a signed job spec whose `metadata.nonce` was already admitted, or
//! whose `metadata.timestamp` is outside the acceptance window.
//!
//! - Timestamps are accepted from `now - max_age` to `now + max_future_skew`
//! - Nonces are remembered for twice `max_age`, then garbage-collected

use crate::domain::errors::ReplayError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Time-bounded nonce memory.
#[derive(Debug)]
pub struct ReplayGuard {
    /// nonce -> unix seconds it was admitted with.
    seen: HashMap<String, i64>,
    max_age: Duration,
    max_future_skew: Duration,
    last_gc: i64,
    gc_interval_secs: i64,
}

impl ReplayGuard {
    /// Default oldest acceptable spec age.
    pub const DEFAULT_MAX_AGE_SECS: i64 = 600;

    /// Default allowed clock skew into the future.
    pub const DEFAULT_MAX_FUTURE_SKEW_SECS: i64 = 60;

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL_SECS: i64 = 30;

    #[must_use]
    pub fn new() -> Self {
        Self::with_window(
            Duration::seconds(Self::DEFAULT_MAX_AGE_SECS),
            Duration::seconds(Self::DEFAULT_MAX_FUTURE_SKEW_SECS),
        )
    }

    #[must_use]
    pub fn with_window(max_age: Duration, max_future_skew: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            max_age,
            max_future_skew,
            last_gc: Utc::now().timestamp(),
            gc_interval_secs: Self::DEFAULT_GC_INTERVAL_SECS,
        }
    }

    /// Check the window and record the nonce.
    pub fn check_and_record(
        &mut self,
        nonce: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), ReplayError> {
        self.check_and_record_at(nonce, timestamp, Utc::now())
    }

    /// As [`check_and_record`](Self::check_and_record) with an explicit clock.
    pub fn check_and_record_at(
        &mut self,
        nonce: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), ReplayError> {
        let nonce = nonce.filter(|n| !n.is_empty()).ok_or(ReplayError::MissingNonce)?;
        let timestamp = timestamp.ok_or(ReplayError::MissingTimestamp)?;

        // Window check first: it bounds how long any nonce must be remembered.
        let oldest = now - self.max_age;
        let newest = now + self.max_future_skew;
        if timestamp < oldest {
            return Err(ReplayError::TooOld {
                timestamp: timestamp.timestamp(),
                threshold: oldest.timestamp(),
            });
        }
        if timestamp > newest {
            return Err(ReplayError::FromFuture {
                timestamp: timestamp.timestamp(),
                threshold: newest.timestamp(),
            });
        }

        let now_secs = now.timestamp();
        if now_secs - self.last_gc > self.gc_interval_secs {
            self.garbage_collect(now_secs);
            self.last_gc = now_secs;
        }

        if self.seen.contains_key(nonce) {
            return Err(ReplayError::NonceReused {
                nonce: nonce.to_string(),
            });
        }
        self.seen.insert(nonce.to_string(), timestamp.timestamp());
        Ok(())
    }

    fn garbage_collect(&mut self, now_secs: i64) {
        let retention = 2 * self.max_age.num_seconds();
        self.seen.retain(|_, ts| now_secs - *ts <= retention);
    }

    /// Nonces currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}
