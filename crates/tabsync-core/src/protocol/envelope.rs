//! The sync message envelope.
//!
//! The wrapper shape predates the TCP transport (an earlier iteration was
//! multicast), which is why every message still carries a sender ID and a
//! globally unique message ID even though only one peer can be connected.

use crate::editor_state::EditorState;
use crate::identity::{InstanceId, MessageIdMint};
use crate::time;
use serde::{Deserialize, Serialize};

/// Envelope around one [`EditorState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWrapper {
    /// `{instance_id}-{sequence}-{epoch_ms}`, unique per instance.
    pub message_id: String,
    pub sender_id: InstanceId,
    /// Epoch milliseconds at wrap time.
    pub timestamp: u64,
    pub payload: EditorState,
}

impl MessageWrapper {
    /// Wrap a payload, minting the next message ID.
    pub fn create(mint: &MessageIdMint, payload: EditorState) -> Self {
        let now = time::epoch_ms();
        Self {
            message_id: mint.next(now),
            sender_id: mint.instance().clone(),
            timestamp: now,
            payload,
        }
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("MessageWrapper serialization should not fail")
    }

    /// Try to parse a received line. Control frames and malformed input
    /// yield `None`.
    pub fn from_json(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }
}
