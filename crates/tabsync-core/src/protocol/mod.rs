//! Wire protocol: the sync envelope and the connection-level control frames.
//!
//! Everything on the wire is one line of UTF-8 JSON. Control frames carry a
//! `type` discriminator (`HANDSHAKE`, `HANDSHAKE_ACK`, `HEARTBEAT`,
//! `HEARTBEAT_ACK`); any other JSON object is a sync [`MessageWrapper`].

pub mod control;
pub mod envelope;

pub use control::{ControlFrame, Handshake, HandshakeAck, Heartbeat, HeartbeatAck, MAX_MESSAGE_SIZE};
pub use envelope::MessageWrapper;
