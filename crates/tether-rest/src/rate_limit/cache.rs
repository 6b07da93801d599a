//! Cache of every rate limit this client has observed

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::{RateLimit, RateLimitHeaders, RateLimitSnapshot, RoutePath};

/// Tracks rate limit state across all routes.
///
/// Two lookups resolve a request: bucket key to server-assigned bucket id
/// (where `Some(None)` records a route confirmed to carry no rate limit),
/// then rate limit key to live state. Buckets also keep a template so a
/// resource instance never seen before starts from the bucket's known
/// constraints instead of a blind first request.
#[derive(Debug, Default)]
pub struct RateLimitCache {
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    /// Bucket key to bucket id; `None` means confirmed unlimited
    bucket_by_key: HashMap<String, Option<String>>,
    /// Rate limit key to live state
    states: HashMap<String, RateLimit>,
    /// Bucket id to the constraints new states are seeded from
    templates: HashMap<String, RateLimitSnapshot>,
}

impl RateLimitCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether sending this request now would trigger its rate limit
    pub fn is_rate_limited(&self, route: &RoutePath) -> bool {
        self.inner
            .lock()
            .state_for(route)
            .is_some_and(|state| state.is_limited(Instant::now()))
    }

    /// Checks and consumes allowance in one step, for callers that will
    /// send immediately on approval. Returns `Duration::ZERO` when the
    /// request may proceed, otherwise how long to wait before asking again.
    pub fn authorize(&self, route: &RoutePath) -> Duration {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let Some(state) = inner.state_for(route) else {
            return Duration::ZERO;
        };

        if state.is_limited(now) {
            state.reset_after(now)
        } else {
            state.decrement();
            Duration::ZERO
        }
    }

    /// Consume one request's worth of allowance without a limit check
    pub fn decrement(&self, route: &RoutePath) {
        if let Some(state) = self.inner.lock().state_for(route) {
            state.decrement();
        }
    }

    /// Updates the cache from a response's rate limit headers. `None`
    /// confirms the route is unlimited. Incoming values are merged
    /// strictly so a stale or racing response can never loosen state.
    pub fn update(&self, route: &RoutePath, headers: Option<&RateLimitHeaders>) {
        let mut inner = self.inner.lock();

        let Some(headers) = headers else {
            inner.bucket_by_key.insert(route.bucket_key.clone(), None);
            return;
        };

        let snapshot = headers.snapshot(Instant::now());

        inner
            .bucket_by_key
            .insert(route.bucket_key.clone(), Some(headers.bucket.clone()));

        match inner.states.get_mut(&route.rate_limit_key) {
            Some(state) => state.merge_stricter(snapshot),
            None => {
                inner
                    .states
                    .insert(route.rate_limit_key.clone(), RateLimit::new(snapshot));
            }
        }

        inner
            .templates
            .entry(headers.bucket.clone())
            .or_insert_with(|| RateLimitSnapshot::template(headers.limit));
    }

    /// Drops states whose reset passed longer than `idle` ago. Bucket and
    /// template entries stay; they are small and keep their value forever.
    pub fn sweep(&self, idle: Duration) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let before = inner.states.len();
        inner
            .states
            .retain(|_, state| !state.expired_longer_than(now, idle));
        let dropped = before - inner.states.len();
        if dropped > 0 {
            debug!(dropped, retained = inner.states.len(), "swept rate limit states");
        }
    }
}

impl CacheInner {
    /// Live state for a route, seeding from the bucket template when this
    /// resource instance has not been seen before. `None` when the route
    /// is unknown or confirmed unlimited.
    fn state_for(&mut self, route: &RoutePath) -> Option<&mut RateLimit> {
        let bucket = self.bucket_by_key.get(&route.bucket_key)?.clone()?;

        if !self.states.contains_key(&route.rate_limit_key) {
            let template = *self.templates.get(&bucket)?;
            self.states
                .insert(route.rate_limit_key.clone(), RateLimit::new(template));
        }

        self.states.get_mut(&route.rate_limit_key)
    }
}
