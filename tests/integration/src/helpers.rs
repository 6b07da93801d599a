//! In-process stand-ins for the services the client talks to

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// One scripted HTTP response
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl CannedResponse {
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Attaches the rate limit header set a live API would send
    #[must_use]
    pub fn with_rate_limit(
        mut self,
        bucket: &str,
        limit: i64,
        remaining: i64,
        reset_after: f64,
    ) -> Self {
        self.headers.push(("x-ratelimit-bucket", bucket.to_owned()));
        self.headers.push(("x-ratelimit-limit", limit.to_string()));
        self.headers
            .push(("x-ratelimit-remaining", remaining.to_string()));
        self.headers
            .push(("x-ratelimit-reset-after", reset_after.to_string()));
        self
    }
}

/// A scripted HTTP API. Scripted responses are served in order; once
/// they run out, every request gets the default response.
#[derive(Debug, Clone)]
pub struct MockApi {
    scripted: Arc<Mutex<VecDeque<CannedResponse>>>,
    default: Arc<Mutex<CannedResponse>>,
    hits: Arc<AtomicUsize>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            default: Arc::new(Mutex::new(CannedResponse::ok(json!({})))),
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn enqueue(&self, response: CannedResponse) {
        self.scripted.lock().push_back(response);
    }

    pub fn set_default(&self, response: CannedResponse) {
        *self.default.lock() = response;
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Binds an ephemeral port and serves until the handle is dropped.
    /// Returns a base url suitable for `RestConfig::base_url`.
    pub async fn serve(&self) -> (String, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("local addr");

        let router = Router::new().fallback(respond).with_state(self.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        (format!("http://{addr}"), handle)
    }
}

async fn respond(State(api): State<MockApi>) -> Response {
    api.hits.fetch_add(1, Ordering::SeqCst);
    let canned = api
        .scripted
        .lock()
        .pop_front()
        .unwrap_or_else(|| api.default.lock().clone());

    let status = StatusCode::from_u16(canned.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Json(canned.body)).into_response();
    for (name, value) in canned.headers {
        response
            .headers_mut()
            .insert(name, value.parse().expect("header value"));
    }
    response
}

/// A minimal gateway socket: says hello, acknowledges heartbeats, and
/// answers every identify with a Ready listing the configured guilds
/// followed by one guild-create per guild.
#[derive(Debug, Clone)]
pub struct MockGateway {
    guild_ids: Arc<Mutex<Vec<u64>>>,
    identifies: Arc<AtomicUsize>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            guild_ids: Arc::new(Mutex::new(Vec::new())),
            identifies: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn announce_guilds(&self, ids: &[u64]) {
        *self.guild_ids.lock() = ids.to_vec();
    }

    #[must_use]
    pub fn identify_count(&self) -> usize {
        self.identifies.load(Ordering::SeqCst)
    }

    /// Returns a `ws://` url for the socket endpoint
    pub async fn serve(&self) -> (String, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock gateway");
        let addr = listener.local_addr().expect("local addr");

        let router = Router::new()
            .route("/gateway", get(upgrade))
            .with_state(self.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        (format!("ws://{addr}/gateway"), handle)
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(gateway): State<MockGateway>) -> Response {
    ws.on_upgrade(move |socket| drive(socket, gateway))
}

async fn drive(mut socket: WebSocket, gateway: MockGateway) {
    let hello = json!({"op": 10, "d": {"heartbeat_interval": 45_000}});
    if socket.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let frame: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        match frame.get("op").and_then(Value::as_u64) {
            // heartbeat
            Some(1) => {
                let ack = json!({"op": 11});
                if socket.send(Message::Text(ack.to_string())).await.is_err() {
                    return;
                }
            }
            // identify
            Some(2) => {
                gateway.identifies.fetch_add(1, Ordering::SeqCst);
                let ids = gateway.guild_ids.lock().clone();
                let guilds: Vec<Value> = ids
                    .iter()
                    .map(|id| json!({"id": id.to_string(), "unavailable": true}))
                    .collect();
                let ready = json!({
                    "op": 0,
                    "s": 1,
                    "t": "READY",
                    "d": {"session_id": "mock-session", "guilds": guilds},
                });
                if socket.send(Message::Text(ready.to_string())).await.is_err() {
                    return;
                }

                for (index, id) in ids.iter().enumerate() {
                    let create = json!({
                        "op": 0,
                        "s": index + 2,
                        "t": "GUILD_CREATE",
                        "d": {"id": id.to_string(), "name": format!("guild {id}")},
                    });
                    if socket.send(Message::Text(create.to_string())).await.is_err() {
                        return;
                    }
                }
            }
            _ => {}
        }
    }
}
