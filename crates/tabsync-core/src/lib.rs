//! tabsync-core: protocol and policy logic for mirroring the live editing
//! focus of two IDE processes on one host.
//!
//! This crate provides:
//! - The wire types: [`EditorState`], [`MessageWrapper`], control frames
//! - Instance identity and message ID minting
//! - Path normalization and the project-match rule
//! - The dedup, debounce, and send-queue tables
//! - The inbound filter chain and the reconciliation planner
//! - Heartbeat and connection-status state machines
//! - The [`HostAdapter`] seam to the embedding IDE (plus [`MockHost`])
//!
//! Networking and scheduling live in `tabsync-daemon`; everything here is
//! pure or time-parameterized so it tests without a runtime.

pub mod config;
pub mod debounce;
pub mod dedup;
pub mod editor_state;
pub mod heartbeat;
pub mod host;
pub mod identity;
pub mod inbound;
pub mod paths;
pub mod protocol;
pub mod queue;
pub mod reconcile;
pub mod status;
pub mod time;
pub mod window;

pub use config::{HostInfo, Role, SyncConfig, Tuning};
pub use debounce::DebounceTable;
pub use dedup::DedupTable;
pub use editor_state::{Caret, EditorState, IdeFamily, Selection, SyncAction};
pub use heartbeat::HeartbeatState;
pub use host::{EditorSnapshot, HostAdapter, HostError, HostOp, MockHost};
pub use identity::{InstanceId, MessageIdMint};
pub use inbound::Verdict;
pub use paths::PathStyle;
pub use protocol::{ControlFrame, Handshake, HandshakeAck, Heartbeat, HeartbeatAck, MessageWrapper, MAX_MESSAGE_SIZE};
pub use queue::SendQueue;
pub use reconcile::ReconcilePlan;
pub use status::{ConnectionState, StatusTracker};
pub use window::WindowState;
