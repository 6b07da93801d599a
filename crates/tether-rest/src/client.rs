//! REST client that routes every request through rate limit handling

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tether_common::config::{QueueConfig, RestConfig};

use crate::error::{ApiError, ApiResult};
use crate::queue::RequestQueue;
use crate::rate_limit::{RateLimitCache, RateLimitHeaders, RoutePath};
use crate::remote::{RemoteRateLimiter, RemoteRequestExecutor};
use crate::request::{ApiRequest, ApiResponse};

/// Fallback wait after a 429 that somehow carried no rate limit headers
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Ensures a raw token carries the `Bot ` authorization prefix exactly once
#[must_use]
pub fn coerce_bot_token(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("Bot ") {
        token.to_owned()
    } else {
        format!("Bot {token}")
    }
}

#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub token: String,
    pub base_url: String,
    pub version: String,
    pub queue_scan_interval: Duration,
    /// How long a request may sit in the queue; `None` waits indefinitely
    pub queue_timeout: Option<Duration>,
    /// Fall back to local handling when a coordination service is unreachable
    pub allow_fallback: bool,
}

impl ApiOptions {
    #[must_use]
    pub fn new(token: &str) -> Self {
        let rest = RestConfig::default();
        let queue = QueueConfig::default();
        Self::from_config(token, &rest, &queue, true)
    }

    #[must_use]
    pub fn from_config(
        token: &str,
        rest: &RestConfig,
        queue: &QueueConfig,
        allow_fallback: bool,
    ) -> Self {
        Self {
            token: coerce_bot_token(token),
            base_url: rest.base_url.clone(),
            version: rest.version.clone(),
            queue_scan_interval: Duration::from_millis(queue.scan_interval_ms),
            queue_timeout: queue.request_timeout_ms.map(Duration::from_millis),
            allow_fallback,
        }
    }
}

/// The REST entry point. Every request is checked against rate limit
/// state before it goes out; requests that would trip a limit wait in
/// the queue until a periodic scan clears them.
pub struct Api {
    http: reqwest::Client,
    options: ApiOptions,
    cache: RateLimitCache,
    queue: RequestQueue,
    remote_limiter: RwLock<Option<Arc<dyn RemoteRateLimiter>>>,
    remote_executor: RwLock<Option<Arc<dyn RemoteRequestExecutor>>>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("base_url", &self.options.base_url)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Api {
    pub fn new(options: ApiOptions) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&options.token)
            .map_err(|_| ApiError::InvalidRequest("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            options,
            cache: RateLimitCache::new(),
            queue: RequestQueue::new(),
            remote_limiter: RwLock::new(None),
            remote_executor: RwLock::new(None),
        })
    }

    /// Delegates rate limit authorization to a shared authority
    pub fn use_remote_rate_limiter(&self, limiter: Arc<dyn RemoteRateLimiter>) {
        *self.remote_limiter.write() = Some(limiter);
    }

    /// Delegates request execution to a shared executor
    pub fn use_remote_request_executor(&self, executor: Arc<dyn RemoteRequestExecutor>) {
        *self.remote_executor.write() = Some(executor);
    }

    #[must_use]
    pub fn rate_limit_cache(&self) -> &RateLimitCache {
        &self.cache
    }

    #[must_use]
    pub fn queued_request_count(&self) -> usize {
        self.queue.len()
    }

    /// Spawns the periodic queue scan. Call once after construction.
    pub fn start_queue(self: &Arc<Self>) -> JoinHandle<()> {
        let api = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(api.options.queue_scan_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                api.process_queue_once();
            }
        })
    }

    /// Sends a request, honoring rate limits and any configured
    /// coordination services. Resolves once a terminal response arrives,
    /// however long rate limits held the request back.
    pub async fn request(self: &Arc<Self>, request: ApiRequest) -> ApiResult<ApiResponse> {
        let executor = if request.local {
            None
        } else {
            self.remote_executor.read().clone()
        };
        if let Some(executor) = executor {
            match executor.execute(&request).await {
                Ok(response) => {
                    self.cache
                        .update(&request.route, response.rate_limit.as_ref());
                    return Ok(response);
                }
                Err(err) if err.is_unavailable() && self.options.allow_fallback => {
                    warn!(%err, "request executor unreachable, handling locally");
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.request_local(request).await
    }

    async fn request_local(self: &Arc<Self>, request: ApiRequest) -> ApiResult<ApiResponse> {
        let wait = self.authorize(&request.route).await?;
        if !wait.is_zero() {
            debug!(
                url = %request.route.url,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limited, request queued"
            );
            let receiver = self.queue.push(request);
            return receiver.await.map_err(|_| ApiError::QueueClosed)?;
        }

        self.send_and_handle(request).await
    }

    /// One authorization decision. A granted local check has already
    /// consumed allowance; callers must send exactly once on grant.
    async fn authorize(&self, route: &RoutePath) -> ApiResult<Duration> {
        let limiter = self.remote_limiter.read().clone();
        if let Some(limiter) = limiter {
            match limiter.authorize(route).await {
                Ok(wait) => return Ok(wait),
                Err(err) if err.is_unavailable() && self.options.allow_fallback => {
                    warn!(%err, "rate limit authority unreachable, checking locally");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(self.cache.authorize(route))
    }

    /// Sends the request and processes the response, retrying after the
    /// advertised wait for as long as the server answers 429.
    async fn send_and_handle(self: &Arc<Self>, request: ApiRequest) -> ApiResult<ApiResponse> {
        loop {
            let response = self.send(&request).await?;

            self.cache
                .update(&request.route, response.rate_limit.as_ref());
            self.report_remote(&request.route, response.rate_limit.as_ref())
                .await;

            if !response.is_rate_limited() {
                return Ok(response);
            }

            let headers = response.rate_limit.as_ref();
            let wait = headers
                .map(|h| Duration::from_secs_f64(h.reset_after.max(0.0)))
                .unwrap_or(DEFAULT_RETRY_WAIT);
            let global = headers.is_some_and(|h| h.global);
            if global {
                // a global hit blocks every route, not just this one
                self.queue.pause_until(Instant::now() + wait);
            }

            warn!(
                url = %request.route.url,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                global,
                "hit rate limit, retrying after wait"
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let url = format!(
            "{}/{}/{}",
            self.options.base_url, self.options.version, request.route.url
        );

        let mut builder = self.http.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let rate_limit = RateLimitHeaders::from_header_map(response.headers());
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        Ok(ApiResponse {
            status,
            rate_limit,
            body,
        })
    }

    /// Best-effort report of observed headers to the shared authority
    async fn report_remote(&self, route: &RoutePath, headers: Option<&RateLimitHeaders>) {
        let limiter = self.remote_limiter.read().clone();
        if let Some(limiter) = limiter {
            if let Err(err) = limiter.update(route, headers).await {
                warn!(%err, "failed to report rate limit state to authority");
            }
        }
    }

    /// One queue scan: expire stale entries, dispatch the ones whose
    /// limits have cleared, keep the rest in order.
    fn process_queue_once(self: &Arc<Self>) {
        self.queue.process(self.options.queue_timeout, |entry| {
            if self.cache.is_rate_limited(&entry.request.route) {
                return Some(entry);
            }

            let api = Arc::clone(self);
            tokio::spawn(async move {
                let result = api.send_queued(entry.request).await;
                let _ = entry.responder.send(result);
            });
            None
        });
    }

    /// Send path for dequeued requests: waits out any remaining
    /// authorization delay instead of going back through the queue.
    async fn send_queued(self: Arc<Self>, request: ApiRequest) -> ApiResult<ApiResponse> {
        loop {
            let wait = self.authorize(&request.route).await?;
            if wait.is_zero() {
                break;
            }
            tokio::time::sleep(wait).await;
        }
        self.send_and_handle(request).await
    }
}
