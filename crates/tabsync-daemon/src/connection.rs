//! One framed loopback connection.
//!
//! Framing is newline-delimited UTF-8 JSON: the buffered reader splits on
//! `\n` and keeps any trailing unterminated segment for the next read.
//! The read task routes control frames apart from sync lines and forwards
//! both to the transport supervisor over a channel; the write half lives
//! in the transport's shared writer slot.

use tabsync_core::protocol::{ControlFrame, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Event from one connection's read task, tagged with the connection
/// generation so events from a replaced connection can be ignored.
#[derive(Debug)]
pub enum ConnEvent {
    /// A parsed control frame (handshake or heartbeat traffic).
    Control(ControlFrame),
    /// A raw sync line (anything without a control `type`).
    Sync(String),
    /// Peer closed or the read failed.
    Closed,
}

/// The read side of an active connection.
pub struct Connection {
    pub generation: u64,
    read_task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Spawn the read task over an already-handshaken stream half.
    ///
    /// The reader is handed over as a `BufReader` so bytes buffered during
    /// the handshake are not lost.
    pub fn spawn(
        reader: BufReader<OwnedReadHalf>,
        generation: u64,
        event_tx: mpsc::UnboundedSender<(u64, ConnEvent)>,
    ) -> Self {
        let read_task = tokio::spawn(async move {
            read_loop(reader, generation, event_tx).await;
        });
        Self {
            generation,
            read_task: Some(read_task),
        }
    }

    pub fn abort(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    generation: u64,
    event_tx: mpsc::UnboundedSender<(u64, ConnEvent)>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(generation, "peer closed the connection");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.len() > MAX_MESSAGE_SIZE {
                    warn!(generation, size = trimmed.len(), "dropping oversized line");
                    continue;
                }
                let event = match ControlFrame::from_json(trimmed) {
                    Some(frame) => ConnEvent::Control(frame),
                    None => ConnEvent::Sync(trimmed.to_string()),
                };
                if event_tx.send((generation, event)).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(generation, error = %e, "read error");
                break;
            }
        }
    }
    let _ = event_tx.send((generation, ConnEvent::Closed));
}

/// Write one framed line (appends the terminating `\n`).
pub async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}
