//! The per-shard gateway connection state machine

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use tether_common::config::{GatewayTuning, IdentityConfig};
use tether_common::error::{AppError, AppResult};
use tether_core::Shard;
use tether_rest::{Api, ApiError, ApiRequest, RemoteError};
use tether_rpc::IdentifyLockChain;

use crate::events::ShardEvent;
use crate::gate::IdentifyGate;
use crate::identity::Identity;
use crate::protocol::{
    CloseDisposition, GatewayCloseCode, GatewayFrame, HelloPayload, OpCode, ReadyPayload,
    RequestGuildMembersPayload, ResumePayload, MISSED_HEARTBEAT_CLOSE_CODE,
};
use crate::send_limiter::SendLimiter;
use crate::session::Session;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug)]
pub struct GatewayOptions {
    /// Bot-prefixed token
    pub token: String,
    pub identity: IdentityConfig,
    pub shard: Option<Shard>,
    pub tuning: GatewayTuning,
    /// Locks to hold before identifying; empty means no coordination
    pub lock_chain: Arc<IdentifyLockChain>,
    /// In-process admission gate shared by every connection
    pub gate: Arc<IdentifyGate>,
}

/// Instructions fed into the socket task from outside it
#[derive(Debug)]
enum Outbound {
    Frame(GatewayFrame),
    /// Tear the connection down with a terminal error
    Abort(AppError),
}

/// How one socket session ended
#[derive(Debug, Clone, Copy)]
struct ClosedOutcome {
    code: u16,
}

/// One shard's connection to the gateway.
///
/// `run` owns the socket lifecycle: it resolves the endpoint, connects,
/// heartbeats, identifies or resumes, and reconnects on every non-fatal
/// close until dropped or a fatal close code arrives.
pub struct GatewayConnection {
    options: GatewayOptions,
    api: Arc<Api>,
    session: Session,
    limiter: SendLimiter,
    events: mpsc::UnboundedSender<ShardEvent>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Outbound>>,
    online: AtomicBool,
}

impl GatewayConnection {
    /// Creates the connection and the channel its events arrive on
    #[must_use]
    pub fn new(
        options: GatewayOptions,
        api: Arc<Api>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ShardEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            options,
            api,
            session: Session::new(),
            limiter: SendLimiter::new(),
            events: events_tx,
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            online: AtomicBool::new(false),
        });
        (connection, events_rx)
    }

    #[must_use]
    pub fn shard(&self) -> Option<Shard> {
        self.options.shard
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Whether this connection can resume instead of identifying
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.session.resumable()
    }

    /// Queues a member-list request onto the socket. Subject to the
    /// outbound frame quota; sent when capacity allows.
    pub fn request_guild_members(&self, payload: &RequestGuildMembersPayload) -> AppResult<()> {
        let data = serde_json::to_value(payload).map_err(AppError::internal)?;
        self.outbound_tx
            .send(Outbound::Frame(GatewayFrame::new(
                OpCode::RequestGuildMembers,
                data,
            )))
            .map_err(|_| AppError::Transport("connection is shut down".to_owned()))
    }

    /// Drives the connection until a fatal condition. Reconnects through
    /// every recoverable close on its own.
    pub async fn run(self: Arc<Self>) -> AppResult<()> {
        loop {
            let url = match self.resolve_endpoint().await {
                Ok(url) => url,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let wait = Duration::from_secs(self.options.tuning.url_retry_wait_secs);
                    warn!(%err, ?wait, "endpoint lookup failed, retrying");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let outcome = match self.connect_once(&url).await {
                Ok(outcome) => outcome,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let wait = Duration::from_secs(self.options.tuning.url_retry_wait_secs);
                    warn!(%err, ?wait, "gateway connection failed, retrying");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            self.online.store(false, Ordering::Release);
            let disposition = crate::protocol::classify_close(outcome.code);
            if let Some(code) = GatewayCloseCode::from_u16(outcome.code) {
                code.log(self.options.shard.map(|s| s.id));
            } else {
                warn!(code = outcome.code, "gateway closed with unrecognized code");
            }

            let _ = self.events.send(ShardEvent::Closed {
                code: outcome.code,
                disposition,
            });

            match disposition {
                CloseDisposition::Reconnect => {}
                CloseDisposition::ReconnectFresh => self.session.clear(),
                CloseDisposition::Fatal => return Err(Self::fatal_close_error(outcome.code)),
            }
        }
    }

    /// Resolves the socket endpoint through the REST pipeline. A 401 is
    /// terminal; other failures are retried by the caller.
    async fn resolve_endpoint(&self) -> AppResult<String> {
        let response = self
            .api
            .request(ApiRequest::get("gateway/bot").local())
            .await
            .map_err(|err| match err {
                ApiError::Remote(RemoteError::Unavailable(msg)) => {
                    AppError::CoordinationUnavailable(msg)
                }
                other => AppError::Transport(other.to_string()),
            })?;

        if response.status == 401 {
            return Err(AppError::AuthenticationFailed);
        }
        if !response.is_success() {
            return Err(AppError::Transport(format!(
                "endpoint lookup answered {}",
                response.status
            )));
        }

        let url = response
            .body
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Transport("endpoint response missing url".to_owned()))?;

        Ok(format!("{url}{}", self.options.tuning.ws_params))
    }

    /// One socket session, from open to close frame
    #[allow(clippy::too_many_lines)]
    async fn connect_once(self: &Arc<Self>, url: &str) -> AppResult<ClosedOutcome> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;
        info!(shard = ?self.options.shard, "gateway socket open");

        let (mut sink, mut stream) = ws.split();
        let mut outbound = self.outbound_rx.lock().await;

        // heartbeat starts on Hello; tasks and timers here die with this
        // socket session
        let mut heartbeat: Option<tokio::time::Interval> = None;
        let mut acked = true;
        let mut last_beat: Option<Instant> = None;
        let mut deferred: VecDeque<GatewayFrame> = VecDeque::new();
        let mut flush = tokio::time::interval(Duration::from_secs(1));
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let outcome = loop {
            tokio::select! {
                _ = async {
                    match heartbeat.as_mut() {
                        Some(ticker) => { ticker.tick().await; }
                        None => std::future::pending().await,
                    }
                } => {
                    if !acked {
                        warn!(shard = ?self.options.shard, "heartbeat not acknowledged, closing");
                        let _ = sink.send(close_message(MISSED_HEARTBEAT_CLOSE_CODE, "missed heartbeat ack")).await;
                        break ClosedOutcome { code: MISSED_HEARTBEAT_CLOSE_CODE };
                    }
                    if self.limiter.try_send(true) {
                        let frame = GatewayFrame::heartbeat(self.session.sequence());
                        if let Err(err) = send_frame(&mut sink, &frame).await {
                            warn!(%err, "heartbeat send failed");
                            break ClosedOutcome { code: 1006 };
                        }
                        acked = false;
                        last_beat = Some(Instant::now());
                    }
                }

                _ = flush.tick() => {
                    while let Some(frame) = deferred.pop_front() {
                        if self.limiter.try_send(frame.op.bypasses_send_quota()) {
                            self.note_sent(&frame);
                            if let Err(err) = send_frame(&mut sink, &frame).await {
                                warn!(%err, "deferred send failed");
                                break;
                            }
                        } else {
                            deferred.push_front(frame);
                            break;
                        }
                    }
                }

                Some(command) = outbound.recv() => {
                    match command {
                        Outbound::Frame(frame) => {
                            if self.limiter.try_send(frame.op.bypasses_send_quota()) {
                                self.note_sent(&frame);
                                if let Err(err) = send_frame(&mut sink, &frame).await {
                                    warn!(%err, "send failed");
                                    break ClosedOutcome { code: 1006 };
                                }
                            } else {
                                debug!(op = ?frame.op, "outbound quota exhausted, frame deferred");
                                deferred.push_back(frame);
                            }
                        }
                        Outbound::Abort(err) => {
                            let _ = sink.send(close_message(1000, "shutting down")).await;
                            abort_all(&mut tasks);
                            return Err(err);
                        }
                    }
                }

                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<GatewayFrame>(&text) {
                                Ok(frame) => {
                                    if let Some(outcome) = self
                                        .handle_frame(frame, &mut sink, &mut heartbeat, &mut acked, last_beat, &mut tasks)
                                        .await
                                    {
                                        break outcome;
                                    }
                                }
                                Err(err) => warn!(%err, "undecodable gateway frame"),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map_or(1006, |f| u16::from(f.code));
                            break ClosedOutcome { code };
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(%err, "gateway socket error");
                            break ClosedOutcome { code: 1006 };
                        }
                        None => break ClosedOutcome { code: 1006 },
                    }
                }
            }
        };

        abort_all(&mut tasks);
        Ok(outcome)
    }

    /// Handles one inbound frame; returns an outcome when the connection
    /// must close
    async fn handle_frame(
        self: &Arc<Self>,
        frame: GatewayFrame,
        sink: &mut WsSink,
        heartbeat: &mut Option<tokio::time::Interval>,
        acked: &mut bool,
        last_beat: Option<Instant>,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Option<ClosedOutcome> {
        match frame.op {
            OpCode::Hello => {
                let Some(hello) = frame
                    .d
                    .and_then(|d| serde_json::from_value::<HelloPayload>(d).ok())
                else {
                    warn!("hello frame missing heartbeat interval");
                    return Some(ClosedOutcome { code: 4002 });
                };

                let period = Duration::from_millis(hello.heartbeat_interval);
                *heartbeat = Some(tokio::time::interval_at(
                    tokio::time::Instant::now() + period,
                    period,
                ));
                *acked = true;
                let _ = self.events.send(ShardEvent::Hello {
                    heartbeat_interval_ms: hello.heartbeat_interval,
                });

                if self.session.resumable() {
                    let resume = ResumePayload {
                        token: self.options.token.clone(),
                        session_id: self.session.session_id().unwrap_or_default(),
                        seq: self.session.sequence(),
                    };
                    match serde_json::to_value(&resume) {
                        Ok(d) => {
                            let frame = GatewayFrame::new(OpCode::Resume, d);
                            // bypass frames go out regardless; the call
                            // only charges the send window
                            let _ = self.limiter.try_send(true);
                            self.note_sent(&frame);
                            if let Err(err) = send_frame(sink, &frame).await {
                                warn!(%err, "resume send failed");
                                return Some(ClosedOutcome { code: 1006 });
                            }
                        }
                        Err(err) => error!(%err, "failed to encode resume payload"),
                    }
                } else {
                    tasks.push(self.begin_identify());
                }
                None
            }

            OpCode::HeartbeatAck => {
                *acked = true;
                let latency_ms = last_beat
                    .map(|at| u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or(0);
                debug!(shard = ?self.options.shard, latency_ms, "heartbeat acknowledged");
                let _ = self.events.send(ShardEvent::HeartbeatAck { latency_ms });
                None
            }

            OpCode::Heartbeat => {
                // server asked for an immediate beat; charge the send
                // window but send regardless
                let _ = self.limiter.try_send(true);
                let frame = GatewayFrame::heartbeat(self.session.sequence());
                if let Err(err) = send_frame(sink, &frame).await {
                    warn!(%err, "requested heartbeat send failed");
                    return Some(ClosedOutcome { code: 1006 });
                }
                None
            }

            OpCode::Dispatch => {
                if let Some(sequence) = frame.s {
                    self.session.update_sequence(sequence);
                }
                self.handle_dispatch(frame);
                None
            }

            OpCode::InvalidSession => {
                let resumable = frame.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                info!(shard = ?self.options.shard, resumable, "session invalidated by server");
                if !resumable {
                    self.session.clear();
                }

                // brief randomized wait so a fleet of shards does not
                // stampede the identify endpoint in lockstep
                let wait = rand::thread_rng().gen_range(1000..=5000);
                tokio::time::sleep(Duration::from_millis(wait)).await;

                let _ = sink.send(close_message(1000, "invalid session")).await;
                Some(ClosedOutcome { code: 1000 })
            }

            OpCode::Reconnect => {
                info!(shard = ?self.options.shard, "server requested reconnect");
                let _ = sink.send(close_message(1000, "reconnect requested")).await;
                Some(ClosedOutcome { code: 1000 })
            }

            OpCode::Identify | OpCode::Resume | OpCode::RequestGuildMembers => {
                warn!(op = ?frame.op, "server sent a client-only op");
                None
            }
        }
    }

    /// Routes a dispatch frame: session-management events are handled
    /// inline, everything else goes up the channel without blocking the
    /// read loop.
    fn handle_dispatch(&self, frame: GatewayFrame) {
        let data = frame.d.unwrap_or(Value::Null);
        match frame.t.as_deref() {
            Some("READY") => match serde_json::from_value::<ReadyPayload>(data) {
                Ok(ready) => {
                    info!(
                        shard = ?self.options.shard,
                        session_id = %ready.session_id,
                        guilds = ready.guilds.len(),
                        "session ready"
                    );
                    self.session.start(ready.session_id.clone());
                    self.online.store(true, Ordering::Release);
                    let _ = self.events.send(ShardEvent::Ready(ready));
                }
                Err(err) => error!(%err, "undecodable ready payload"),
            },
            Some("RESUMED") => {
                info!(shard = ?self.options.shard, "session resumed");
                self.online.store(true, Ordering::Release);
                let _ = self.events.send(ShardEvent::Resumed);
            }
            Some(name) => {
                let _ = self.events.send(ShardEvent::Dispatch {
                    name: name.to_owned(),
                    sequence: frame.s,
                    data,
                });
            }
            None => warn!("dispatch frame without event name"),
        }
    }

    /// Spawns the identify attempt: waits on the lock chain, then feeds
    /// the identify frame back into the socket task. Lock denial retries
    /// on a short fixed cadence; the lock authority paces the fleet.
    fn begin_identify(self: &Arc<Self>) -> JoinHandle<()> {
        let connection = Arc::clone(self);
        tokio::spawn(async move {
            connection.session.clear();
            let retry = Duration::from_millis(connection.options.tuning.identify_retry_wait_ms);
            let buffer = Duration::from_millis(connection.options.tuning.login_gate_buffer_ms);

            connection.options.gate.wait_turn(buffer).await;

            loop {
                match connection.options.lock_chain.acquire_all().await {
                    Ok(true) => break,
                    Ok(false) => {
                        debug!(shard = ?connection.options.shard, ?retry, "identify locks contended, retrying");
                        tokio::time::sleep(retry).await;
                    }
                    Err(err) => {
                        let _ = connection.outbound_tx.send(Outbound::Abort(
                            AppError::CoordinationUnavailable(err.to_string()),
                        ));
                        return;
                    }
                }
            }

            let identity = Identity::new(
                &connection.options.token,
                &connection.options.identity,
                connection.options.shard,
            );
            debug!(shard = ?connection.options.shard, identity = %identity.redacted(), "identify locks held");
            match serde_json::to_value(&identity) {
                Ok(d) => {
                    let _ = connection
                        .outbound_tx
                        .send(Outbound::Frame(GatewayFrame::new(OpCode::Identify, d)));
                }
                Err(err) => error!(%err, "failed to encode identify payload"),
            }
        })
    }

    /// Emits the lifecycle event matching a frame that just went out
    fn note_sent(&self, frame: &GatewayFrame) {
        match frame.op {
            OpCode::Identify => {
                let _ = self.events.send(ShardEvent::Identifying);
            }
            OpCode::Resume => {
                let _ = self.events.send(ShardEvent::Resuming);
            }
            _ => {}
        }
    }

    fn fatal_close_error(code: u16) -> AppError {
        match GatewayCloseCode::from_u16(code) {
            Some(GatewayCloseCode::AuthenticationFailed) => AppError::AuthenticationFailed,
            Some(GatewayCloseCode::InvalidShard | GatewayCloseCode::ShardingRequired) => {
                AppError::InvalidShardConfig(format!("gateway close code {code}"))
            }
            Some(GatewayCloseCode::InvalidIntents | GatewayCloseCode::DisallowedIntents) => {
                AppError::DisallowedIntents(format!("gateway close code {code}"))
            }
            _ => AppError::Transport(format!("gateway closed with code {code}")),
        }
    }
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("shard", &self.options.shard)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

async fn send_frame(sink: &mut WsSink, frame: &GatewayFrame) -> AppResult<()> {
    let text = serde_json::to_string(frame).map_err(AppError::internal)?;
    sink.send(Message::Text(text))
        .await
        .map_err(|err| AppError::Transport(err.to_string()))
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code: code.into(),
        reason: reason.into(),
    }))
}

fn abort_all(tasks: &mut Vec<JoinHandle<()>>) {
    for task in tasks.drain(..) {
        task.abort();
    }
}
