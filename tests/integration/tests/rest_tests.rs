//! REST pipeline tests against a scripted local API

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::json;

use integration_tests::{CannedResponse, MockApi};
use tether_rest::{
    Api, ApiError, ApiOptions, ApiRequest, RateLimitHeaders, RemoteError, RemoteRateLimiter,
    RoutePath,
};
use tether_rpc::{HttpRateLimiter, HttpRequestExecutor, RateLimitServer};

fn api_against(base_url: &str, scan_interval: Duration) -> Arc<Api> {
    let options = ApiOptions {
        token: "Bot test".to_owned(),
        base_url: base_url.to_owned(),
        version: "v6".to_owned(),
        queue_scan_interval: scan_interval,
        queue_timeout: None,
        allow_fallback: true,
    };
    Arc::new(Api::new(options).expect("api construction"))
}

#[tokio::test]
async fn test_headers_teach_the_cache() {
    let mock = MockApi::new();
    mock.enqueue(CannedResponse::ok(json!({"id": "1"})).with_rate_limit("b1", 5, 4, 2.0));
    let (base_url, _server) = mock.serve().await;

    let api = api_against(&base_url, Duration::from_secs(1));
    let response = api
        .request(ApiRequest::get("channels/1/pins"))
        .await
        .expect("request");
    assert_eq!(response.status, 200);
    assert_eq!(response.rate_limit.as_ref().unwrap().bucket, "b1");

    // remaining=4 leaves headroom, the route is not limited
    let route = RoutePath::new(&Method::GET, "channels/1/pins");
    assert!(!api.rate_limit_cache().is_rate_limited(&route));
}

#[tokio::test]
async fn test_exhausted_bucket_queues_until_reset() {
    let mock = MockApi::new();
    for remaining in (0..5).rev() {
        mock.enqueue(
            CannedResponse::ok(json!({})).with_rate_limit("b1", 5, remaining, 1.0),
        );
    }
    mock.set_default(CannedResponse::ok(json!({})).with_rate_limit("b1", 5, 4, 1.0));
    let (base_url, _server) = mock.serve().await;

    let api = api_against(&base_url, Duration::from_millis(100));
    api.start_queue();

    for _ in 0..5 {
        api.request(ApiRequest::get("channels/1/pins"))
            .await
            .expect("request");
    }
    assert_eq!(mock.hits(), 5);

    // the sixth is predicted over-limit locally and held back
    let queued_at = Instant::now();
    let held = {
        let api = Arc::clone(&api);
        tokio::spawn(async move { api.request(ApiRequest::get("channels/1/pins")).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(api.queued_request_count(), 1);
    assert_eq!(mock.hits(), 5);

    // once the window resets, a queue scan releases it
    let response = held.await.expect("join").expect("queued request");
    assert_eq!(response.status, 200);
    assert!(queued_at.elapsed() >= Duration::from_millis(800));
    assert_eq!(api.queued_request_count(), 0);
}

#[tokio::test]
async fn test_headerless_responses_never_queue() {
    let mock = MockApi::new();
    let (base_url, _server) = mock.serve().await;

    let api = api_against(&base_url, Duration::from_secs(1));
    for _ in 0..20 {
        api.request(ApiRequest::get("users/@me"))
            .await
            .expect("request");
    }
    assert_eq!(mock.hits(), 20);
    assert_eq!(api.queued_request_count(), 0);
}

#[tokio::test]
async fn test_429_is_retried_after_wait() {
    let mock = MockApi::new();
    mock.enqueue(
        CannedResponse::ok(json!({"retry_after": 200}))
            .with_status(429)
            .with_rate_limit("b1", 5, 0, 0.2),
    );
    mock.set_default(CannedResponse::ok(json!({"id": "1"})).with_rate_limit("b1", 5, 4, 1.0));
    let (base_url, _server) = mock.serve().await;

    let api = api_against(&base_url, Duration::from_secs(1));
    let started = Instant::now();
    let response = api
        .request(ApiRequest::post("channels/1/messages", json!({"content": "hi"})))
        .await
        .expect("request");

    assert_eq!(response.status, 200);
    assert!(started.elapsed() >= Duration::from_millis(180));
    assert_eq!(mock.hits(), 2);
}

#[tokio::test]
async fn test_unreachable_authority_without_fallback_fails() {
    let mock = MockApi::new();
    let (base_url, _server) = mock.serve().await;

    let options = ApiOptions {
        token: "Bot test".to_owned(),
        base_url,
        version: "v6".to_owned(),
        queue_scan_interval: Duration::from_secs(1),
        queue_timeout: None,
        allow_fallback: false,
    };
    let api = Arc::new(Api::new(options).expect("api construction"));
    // nothing listens on the discard port
    api.use_remote_rate_limiter(Arc::new(HttpRateLimiter::new("http://127.0.0.1:9")));

    let result = api.request(ApiRequest::get("users/@me")).await;
    assert!(matches!(
        result,
        Err(ApiError::Remote(RemoteError::Unavailable(_)))
    ));
    assert_eq!(mock.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_authority_with_fallback_sends_locally() {
    let mock = MockApi::new();
    let (base_url, _server) = mock.serve().await;

    let api = api_against(&base_url, Duration::from_secs(1));
    api.use_remote_rate_limiter(Arc::new(HttpRateLimiter::new("http://127.0.0.1:9")));

    let response = api
        .request(ApiRequest::get("users/@me"))
        .await
        .expect("request");
    assert_eq!(response.status, 200);
    assert_eq!(mock.hits(), 1);
}

#[tokio::test]
async fn test_local_request_bypasses_remote_executor() {
    let mock = MockApi::new();
    let (base_url, _server) = mock.serve().await;

    let options = ApiOptions {
        token: "Bot test".to_owned(),
        base_url,
        version: "v6".to_owned(),
        queue_scan_interval: Duration::from_secs(1),
        queue_timeout: None,
        allow_fallback: false,
    };
    let api = Arc::new(Api::new(options).expect("api construction"));
    // nothing listens on the discard port, so delegation would fail hard
    api.use_remote_request_executor(Arc::new(HttpRequestExecutor::new("http://127.0.0.1:9")));

    let response = api
        .request(ApiRequest::get("gateway/bot").local())
        .await
        .expect("request");
    assert_eq!(response.status, 200);
    assert_eq!(mock.hits(), 1);
}

#[tokio::test]
async fn test_rate_limit_authority_round_trip() {
    let server = RateLimitServer::new();
    let (addr, _handle) = server
        .serve("127.0.0.1:0".parse().unwrap())
        .await
        .expect("serve");
    let authority = HttpRateLimiter::new(&format!("http://{addr}"));

    let route = RoutePath::new(&Method::GET, "guilds/1/members/2");
    let exhausted = RateLimitHeaders::from_parts(false, Some("b1".to_owned()), 10, 0, 5.0)
        .expect("headers");
    authority
        .update(&route, Some(&exhausted))
        .await
        .expect("update");

    let wait = authority.authorize(&route).await.expect("authorize");
    assert!(wait > Duration::ZERO);

    // an unrelated route is unaffected
    let other = RoutePath::new(&Method::GET, "channels/5/pins");
    let wait = authority.authorize(&other).await.expect("authorize");
    assert_eq!(wait, Duration::ZERO);
}
