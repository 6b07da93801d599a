//! # tether-gateway
//!
//! One persistent gateway connection per shard: endpoint resolution,
//! heartbeat liveness, the resume-or-identify decision behind a
//! distributed identify lock, close-code classification, and a sliding
//! window on outbound frames. Dispatch events flow upward through a
//! channel; the connection never blocks its socket on downstream work.

pub mod connection;
pub mod events;
pub mod gate;
pub mod identity;
pub mod protocol;
pub mod send_limiter;
pub mod session;

pub use connection::{GatewayConnection, GatewayOptions};
pub use events::ShardEvent;
pub use gate::IdentifyGate;
pub use identity::Identity;
pub use protocol::{
    CloseDisposition, GatewayCloseCode, GatewayFrame, OpCode, ReadyPayload,
    RequestGuildMembersPayload,
};
pub use send_limiter::SendLimiter;
pub use session::Session;
