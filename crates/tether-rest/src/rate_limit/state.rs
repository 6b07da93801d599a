//! State of a single rate limit

use std::time::{Duration, Instant};

/// A point-in-time view of a rate limit, used for updates and templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub remaining: i64,
    pub limit: i64,
    /// `None` means no known reset; the state never expires on its own
    pub reset_at: Option<Instant>,
}

impl RateLimitSnapshot {
    /// Template form of a bucket: full allowance, no pending reset
    #[must_use]
    pub fn template(limit: i64) -> Self {
        Self {
            remaining: limit,
            limit,
            reset_at: None,
        }
    }
}

/// Live remaining/limit/reset bookkeeping for one rate limit
#[derive(Debug, Clone)]
pub struct RateLimit {
    /// Requests available before triggering the limit
    remaining: i64,
    /// Request cap between resets
    limit: i64,
    /// When `remaining` resets back to `limit`
    reset_at: Option<Instant>,
}

impl RateLimit {
    #[must_use]
    pub fn new(snapshot: RateLimitSnapshot) -> Self {
        Self {
            remaining: snapshot.remaining.min(snapshot.limit),
            limit: snapshot.limit,
            reset_at: snapshot.reset_at,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Whether a request would trigger the limit right now.
    ///
    /// Reset is lazy: if the reset time has passed, this restores
    /// `remaining = limit` as a side effect and reports unlimited.
    pub fn is_limited(&mut self, now: Instant) -> bool {
        if self.reset_expired(now) {
            self.reset();
            return false;
        }
        self.remaining <= 0
    }

    /// How long until the limit resets; zero when already expired or unknown
    #[must_use]
    pub fn reset_after(&self, now: Instant) -> Duration {
        match self.reset_at {
            Some(at) if at > now => at - now,
            _ => Duration::ZERO,
        }
    }

    /// Consume one request's worth of allowance
    pub fn decrement(&mut self) {
        self.remaining -= 1;
    }

    /// Restore the full allowance
    pub fn reset(&mut self) {
        self.remaining = self.limit;
    }

    /// Merge an incoming snapshot, keeping whichever value reduces the
    /// chance of exceeding the real limit: smaller `remaining`, later
    /// `reset_at`, smaller `limit`. Multiple signals (local tracking,
    /// response headers, a remote authority) may race; the cache must never
    /// be more optimistic than the most pessimistic of them.
    pub fn merge_stricter(&mut self, incoming: RateLimitSnapshot) {
        if incoming.remaining < self.remaining {
            self.remaining = incoming.remaining;
        }
        match (self.reset_at, incoming.reset_at) {
            (None, Some(at)) => self.reset_at = Some(at),
            (Some(current), Some(at)) if at > current => self.reset_at = Some(at),
            _ => {}
        }
        if incoming.limit < self.limit {
            self.limit = incoming.limit;
        }
    }

    /// Whether every state this rate limit tracks has gone stale
    #[must_use]
    pub fn expired_longer_than(&self, now: Instant, idle: Duration) -> bool {
        match self.reset_at {
            Some(at) => now.checked_duration_since(at).is_some_and(|d| d > idle),
            None => false,
        }
    }

    fn reset_expired(&self, now: Instant) -> bool {
        self.reset_at.is_some_and(|at| at <= now)
    }
}
