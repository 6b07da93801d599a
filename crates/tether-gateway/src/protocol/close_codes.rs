//! WebSocket close codes and their reconnect semantics

use tracing::{error, info, warn};

/// Close code the client sends itself when the server stops
/// acknowledging heartbeats
pub const MISSED_HEARTBEAT_CLOSE_CODE: u16 = 4100;

/// Gateway close codes sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum GatewayCloseCode {
    /// Normal closure
    CleanClose = 1000,
    /// Connection dropped without a close frame
    AbnormalClose = 1006,
    /// Unknown error occurred
    UnknownError = 4000,
    /// Invalid opcode sent
    UnknownOpcode = 4001,
    /// Invalid payload encoding
    DecodeError = 4002,
    /// Sent a payload before identifying
    NotAuthenticated = 4003,
    /// Invalid token provided
    AuthenticationFailed = 4004,
    /// Sent Identify twice
    AlreadyAuthenticated = 4005,
    /// Session is no longer valid
    SessionNoLongerValid = 4006,
    /// Invalid sequence number on resume
    InvalidSequence = 4007,
    /// Sending payloads too quickly
    RateLimited = 4008,
    /// Session timed out
    SessionTimeout = 4009,
    /// Invalid shard configuration
    InvalidShard = 4010,
    /// Sharding is required for this many guilds
    ShardingRequired = 4011,
    /// Invalid API version
    InvalidVersion = 4012,
    /// Invalid intent bits
    InvalidIntents = 4013,
    /// Intent not enabled for this token
    DisallowedIntents = 4014,
    /// Local close after a heartbeat went unacknowledged
    MissedHeartbeat = 4100,
}

/// What the connection should do after a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Reconnect, keeping session state for a resume attempt
    Reconnect,
    /// Reconnect with session state cleared, forcing a fresh identify
    ReconnectFresh,
    /// Do not reconnect; surface the condition to the operator
    Fatal,
}

impl GatewayCloseCode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1000 => Some(Self::CleanClose),
            1006 => Some(Self::AbnormalClose),
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4006 => Some(Self::SessionNoLongerValid),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            4100 => Some(Self::MissedHeartbeat),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// How the connection must react to this close code
    #[must_use]
    pub const fn disposition(self) -> CloseDisposition {
        match self {
            Self::CleanClose
            | Self::AbnormalClose
            | Self::UnknownError
            | Self::UnknownOpcode
            | Self::DecodeError
            | Self::NotAuthenticated
            | Self::RateLimited
            | Self::MissedHeartbeat => CloseDisposition::Reconnect,

            Self::SessionNoLongerValid | Self::InvalidSequence | Self::SessionTimeout => {
                CloseDisposition::ReconnectFresh
            }

            Self::AuthenticationFailed
            | Self::AlreadyAuthenticated
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseDisposition::Fatal,
        }
    }

    /// Logs the close at a severity matching how alarming it is
    pub fn log(self, shard_id: Option<u32>) {
        let code = self.as_u16();
        match self.disposition() {
            CloseDisposition::Fatal => {
                error!(code, shard = shard_id, close = ?self, "gateway closed, not reconnecting");
            }
            CloseDisposition::ReconnectFresh => {
                warn!(code, shard = shard_id, close = ?self, "gateway closed, session invalidated");
            }
            CloseDisposition::Reconnect => match self {
                Self::CleanClose | Self::AbnormalClose => {
                    info!(code, shard = shard_id, close = ?self, "gateway closed, reconnecting");
                }
                _ => {
                    warn!(code, shard = shard_id, close = ?self, "gateway closed, reconnecting");
                }
            },
        }
    }
}

/// Classifies a raw close code; codes this client has never seen get the
/// safe treatment of a plain reconnect.
#[must_use]
pub fn classify_close(code: u16) -> CloseDisposition {
    GatewayCloseCode::from_u16(code).map_or(CloseDisposition::Reconnect, GatewayCloseCode::disposition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_is_fatal() {
        assert_eq!(classify_close(4004), CloseDisposition::Fatal);
    }

    #[test]
    fn test_clean_close_reconnects() {
        assert_eq!(classify_close(1000), CloseDisposition::Reconnect);
    }

    #[test]
    fn test_session_timeout_clears_session() {
        assert_eq!(classify_close(4009), CloseDisposition::ReconnectFresh);
        assert_eq!(classify_close(4006), CloseDisposition::ReconnectFresh);
        assert_eq!(classify_close(4007), CloseDisposition::ReconnectFresh);
    }

    #[test]
    fn test_fatal_codes() {
        for code in [4004, 4005, 4010, 4011, 4012, 4013, 4014] {
            assert_eq!(classify_close(code), CloseDisposition::Fatal, "code {code}");
        }
    }

    #[test]
    fn test_reconnect_codes() {
        for code in [1000, 1006, 4000, 4001, 4002, 4003, 4008, 4100] {
            assert_eq!(classify_close(code), CloseDisposition::Reconnect, "code {code}");
        }
    }

    #[test]
    fn test_unknown_code_reconnects() {
        assert_eq!(classify_close(4999), CloseDisposition::Reconnect);
    }
}
