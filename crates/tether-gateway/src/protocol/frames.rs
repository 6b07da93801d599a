//! Gateway frame format
//!
//! Every message on the socket is one JSON frame of this shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OpCode;

/// A gateway frame: `{op, d, s?, t?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Operation code
    pub op: OpCode,

    /// Event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,

    /// Sequence number (only on Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type name (only on Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    #[must_use]
    pub fn new(op: OpCode, data: Value) -> Self {
        Self {
            op,
            d: Some(data),
            s: None,
            t: None,
        }
    }

    /// Heartbeat carrying the last seen sequence, `null` before any
    #[must_use]
    pub fn heartbeat(sequence: u64) -> Self {
        let d = if sequence == 0 {
            Value::Null
        } else {
            Value::from(sequence)
        };
        Self {
            op: OpCode::Heartbeat,
            d: Some(d),
            s: None,
            t: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_frame_parses() {
        let raw = r#"{"op":0,"t":"MESSAGE_CREATE","s":42,"d":{"id":"1"}}"#;
        let frame: GatewayFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.op, OpCode::Dispatch);
        assert_eq!(frame.t.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(frame.s, Some(42));
    }

    #[test]
    fn test_heartbeat_before_first_dispatch_sends_null() {
        let frame = GatewayFrame::heartbeat(0);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["op"], 1);
        assert!(json["d"].is_null());

        let frame = GatewayFrame::heartbeat(17);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["d"], 17);
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let frame = GatewayFrame {
            op: OpCode::HeartbeatAck,
            d: None,
            s: None,
            t: None,
        };
        assert_eq!(serde_json::to_string(&frame).unwrap(), r#"{"op":11}"#);
    }
}
