//! Gateway wire protocol: opcodes, close codes, frame format, payloads

mod close_codes;
mod frames;
mod opcodes;
mod payloads;

pub use close_codes::{classify_close, CloseDisposition, GatewayCloseCode, MISSED_HEARTBEAT_CLOSE_CODE};
pub use frames::GatewayFrame;
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, ReadyPayload, RequestGuildMembersPayload, ResumePayload, UnavailableGuild};
