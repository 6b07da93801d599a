//! Events a connection reports to its owner

use serde_json::Value;

use crate::protocol::{CloseDisposition, ReadyPayload};

/// Everything a gateway connection tells the orchestrator, in the order
/// it happened on the socket
#[derive(Debug)]
pub enum ShardEvent {
    /// The server said hello; the heartbeat is running
    Hello { heartbeat_interval_ms: u64 },
    /// An identify frame went out, starting a new session
    Identifying,
    /// A resume frame went out for the stored session
    Resuming,
    /// A new session is live
    Ready(ReadyPayload),
    /// A prior session was reattached; replayed dispatches follow
    Resumed,
    /// Heartbeat acknowledged
    HeartbeatAck { latency_ms: u64 },
    /// An application event, not handled inline by the connection
    Dispatch {
        name: String,
        sequence: Option<u64>,
        data: Value,
    },
    /// The socket closed; a non-fatal disposition means the connection
    /// is already reconnecting on its own
    Closed {
        code: u16,
        disposition: CloseDisposition,
    },
}
