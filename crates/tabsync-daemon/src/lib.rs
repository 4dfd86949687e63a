//! tabsync-daemon: the tokio side of tabsync.
//!
//! Loopback TCP transport (listener and scanner roles), the outbound queue
//! worker, the inbound processor, the apply executor, event ingest, and
//! the [`SyncEngine`] that wires them to a host adapter. The binary in
//! `main.rs` runs the engine headless against an in-memory host.

pub mod apply;
pub mod connection;
pub mod engine;
pub mod inbound;
pub mod ingest;
pub mod listener;
pub mod outbound;
pub mod scanner;
pub mod transport;
pub mod window;

pub use apply::Applier;
pub use engine::SyncEngine;
pub use ingest::EventIngest;
pub use outbound::OutboundQueue;
pub use transport::{StatusCallback, Transport};
