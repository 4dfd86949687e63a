//! Connection-level control frames.
//!
//! Control frames never reach the inbound processor; the transport consumes
//! them during rendezvous (`HANDSHAKE` / `HANDSHAKE_ACK`) and liveness
//! checking (`HEARTBEAT` / `HEARTBEAT_ACK`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum size of one framed line, in bytes. Oversized outbound messages
/// are dropped with a warning; oversized inbound lines are discarded.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Sent by the listener immediately after accepting a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    #[serde(rename = "type")]
    msg_type: String,
    pub project_path: String,
    pub ide_type: String,
    pub ide_name: String,
    pub port: u16,
}

impl Handshake {
    pub fn new(
        project_path: impl Into<String>,
        ide_type: impl Into<String>,
        ide_name: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            msg_type: "HANDSHAKE".to_string(),
            project_path: project_path.into(),
            ide_type: ide_type.into(),
            ide_name: ide_name.into(),
            port,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Handshake serialization should not fail")
    }
}

/// Sent by the scanner after the project-path test passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeAck {
    #[serde(rename = "type")]
    msg_type: String,
    pub project_path: String,
    pub ide_type: String,
    pub ide_name: String,
}

impl HandshakeAck {
    pub fn new(
        project_path: impl Into<String>,
        ide_type: impl Into<String>,
        ide_name: impl Into<String>,
    ) -> Self {
        Self {
            msg_type: "HANDSHAKE_ACK".to_string(),
            project_path: project_path.into(),
            ide_type: ide_type.into(),
            ide_name: ide_name.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("HandshakeAck serialization should not fail")
    }
}

/// Emitted every heartbeat interval once connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    #[serde(rename = "type")]
    msg_type: String,
    pub timestamp: u64,
    pub project_path: String,
}

impl Heartbeat {
    pub fn new(timestamp: u64, project_path: impl Into<String>) -> Self {
        Self {
            msg_type: "HEARTBEAT".to_string(),
            timestamp,
            project_path: project_path.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Heartbeat serialization should not fail")
    }
}

/// Immediate reply to a received heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatAck {
    #[serde(rename = "type")]
    msg_type: String,
    pub timestamp: u64,
}

impl HeartbeatAck {
    pub fn new(timestamp: u64) -> Self {
        Self {
            msg_type: "HEARTBEAT_ACK".to_string(),
            timestamp,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("HeartbeatAck serialization should not fail")
    }
}

/// A parsed control frame, routed by the `type` field.
///
/// `from_json` returns `None` for anything without a known control `type`,
/// which is how sync wrappers are told apart from control traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    Handshake(Handshake),
    HandshakeAck(HandshakeAck),
    Heartbeat(Heartbeat),
    HeartbeatAck(HeartbeatAck),
}

impl ControlFrame {
    pub fn from_json(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let msg_type = value.get("type")?.as_str()?;

        match msg_type {
            "HANDSHAKE" => serde_json::from_value(value).ok().map(ControlFrame::Handshake),
            "HANDSHAKE_ACK" => serde_json::from_value(value)
                .ok()
                .map(ControlFrame::HandshakeAck),
            "HEARTBEAT" => serde_json::from_value(value).ok().map(ControlFrame::Heartbeat),
            "HEARTBEAT_ACK" => serde_json::from_value(value)
                .ok()
                .map(ControlFrame::HeartbeatAck),
            _ => None,
        }
    }
}
