//! Scanner role: probe the port range, verify the listener's handshake,
//! ack, and supervise the connection.
//!
//! A mismatched or silent port is skipped silently; when no port matches
//! the whole scan is retried after the backoff.

use crate::connection::{write_line, Connection};
use crate::transport::{sleep_cancellable, TransportShared};
use std::sync::Arc;
use tabsync_core::heartbeat::HeartbeatState;
use tabsync_core::paths;
use tabsync_core::protocol::{ControlFrame, HandshakeAck, Heartbeat};
use tabsync_core::status::ConnectionState;
use tabsync_core::time;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) async fn run_scanner(shared: Arc<TransportShared>, cancel: CancellationToken) {
    let mut generation: u64 = 0;
    while !cancel.is_cancelled() {
        shared.set_status(ConnectionState::Connecting);

        let Some((reader, writer, port)) = scan(&shared, &cancel).await else {
            if cancel.is_cancelled() {
                return;
            }
            debug!("no listener found, rescanning after backoff");
            if sleep_cancellable(&cancel, shared.tuning.retry_backoff).await {
                return;
            }
            continue;
        };

        generation += 1;
        info!(port, generation, "connected to listener");
        shared.install_writer(writer).await;
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut conn = Connection::spawn(reader, generation, event_tx);
        shared.set_status(ConnectionState::Connected);

        let mut heartbeat = HeartbeatState::new(
            shared.tuning.heartbeat_interval,
            shared.tuning.heartbeat_timeout,
            time::epoch_ms(),
        );
        let mut ticker = tokio::time::interval(shared.tuning.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    conn.abort();
                    shared.clear_writer().await;
                    return;
                }
                Some((event_generation, event)) = event_rx.recv() => {
                    if event_generation != generation {
                        continue;
                    }
                    if shared.handle_event(event, &mut heartbeat).await {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let now = time::epoch_ms();
                    if heartbeat.timed_out(now) {
                        warn!(silence_ms = heartbeat.silence_ms(now), "heartbeat timeout, dropping peer");
                        break;
                    }
                    let beat = Heartbeat::new(now, &shared.info.project_path);
                    if shared.send_control(&beat.to_json()).await {
                        heartbeat.mark_sent(now);
                    }
                }
            }
        }

        conn.abort();
        shared.clear_writer().await;
        shared.set_status(ConnectionState::Connecting);
        if sleep_cancellable(&cancel, shared.tuning.retry_backoff).await {
            return;
        }
    }
}

/// One pass over the candidate ports: the custom port first when enabled,
/// then the automatic range.
async fn scan(
    shared: &Arc<TransportShared>,
    cancel: &CancellationToken,
) -> Option<(BufReader<OwnedReadHalf>, OwnedWriteHalf, u16)> {
    let custom = shared.config.effective_custom_port();
    let ports = custom
        .into_iter()
        .chain(shared.tuning.scan_ports.clone().filter(move |p| Some(*p) != custom));

    for port in ports {
        if cancel.is_cancelled() {
            return None;
        }
        let connect =
            tokio::time::timeout(shared.tuning.probe_timeout, TcpStream::connect(("127.0.0.1", port)))
                .await;
        let stream = match connect {
            Ok(Ok(stream)) => stream,
            _ => continue,
        };
        if let Some(parts) = probe_listener(stream, shared, port).await {
            return Some(parts);
        }
    }
    None
}

/// Read one line from a freshly connected port, expecting a `HANDSHAKE`
/// for our project. On match, ack and return the stream halves; anything
/// else drops the socket and the scan continues.
async fn probe_listener(
    stream: TcpStream,
    shared: &Arc<TransportShared>,
    port: u16,
) -> Option<(BufReader<OwnedReadHalf>, OwnedWriteHalf, u16)> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let n = tokio::time::timeout(shared.tuning.probe_timeout, reader.read_line(&mut line))
        .await
        .ok()?
        .ok()?;
    if n == 0 {
        return None;
    }

    let frame = ControlFrame::from_json(line.trim_end_matches(['\n', '\r']))?;
    let ControlFrame::Handshake(hello) = frame else {
        debug!(port, "expected HANDSHAKE, skipping port");
        return None;
    };
    if !paths::project_paths_match(&hello.project_path, &shared.info.project_path) {
        debug!(
            port,
            theirs = %hello.project_path,
            ours = %shared.info.project_path,
            "project path mismatch, continuing scan"
        );
        return None;
    }

    let ack = HandshakeAck::new(
        &shared.info.project_path,
        &shared.info.ide_type,
        &shared.info.ide_name,
    );
    write_line(&mut writer, &ack.to_json()).await.ok()?;
    info!(port, ide = %hello.ide_name, "handshake complete");
    Some((reader, writer, port))
}
