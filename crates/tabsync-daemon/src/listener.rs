//! Listener role: bind, accept, handshake, supervise.
//!
//! The listener stays bound across peer drops; a lost connection returns
//! the state to `Connecting` without rebinding. A second completed
//! handshake replaces the active connection atomically.

use crate::connection::{write_line, Connection};
use crate::transport::{sleep_cancellable, TransportShared};
use std::sync::Arc;
use tabsync_core::heartbeat::HeartbeatState;
use tabsync_core::paths;
use tabsync_core::protocol::{ControlFrame, Handshake, Heartbeat};
use tabsync_core::status::ConnectionState;
use tabsync_core::time;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A connection that completed its handshake and awaits promotion.
struct PendingConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    generation: u64,
}

pub(crate) async fn run_listener(shared: Arc<TransportShared>, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        shared.set_status(ConnectionState::Connecting);
        let listener = match bind(&shared).await {
            Some(listener) => listener,
            None => {
                warn!("no listen port available, retrying");
                if sleep_cancellable(&cancel, shared.tuning.retry_backoff).await {
                    return;
                }
                continue;
            }
        };
        let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();
        info!(port, "listener bound");

        supervise(&shared, &cancel, listener, port).await;
        if cancel.is_cancelled() {
            return;
        }
        if sleep_cancellable(&cancel, shared.tuning.retry_backoff).await {
            return;
        }
    }
}

/// Try the custom port when enabled, then scan the automatic range.
async fn bind(shared: &TransportShared) -> Option<TcpListener> {
    if let Some(port) = shared.config.effective_custom_port() {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => return Some(listener),
            Err(e) => {
                warn!(port, error = %e, "custom port bind failed, falling back to scan");
            }
        }
    }
    for port in shared.tuning.scan_ports.clone() {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            return Some(listener);
        }
    }
    None
}

/// Accept loop plus supervision of the single active connection.
/// Returns on cancellation or an accept error (which triggers a rebind).
async fn supervise(
    shared: &Arc<TransportShared>,
    cancel: &CancellationToken,
    listener: TcpListener,
    port: u16,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (promote_tx, mut promote_rx) = mpsc::unbounded_channel();
    let mut next_generation: u64 = 0;
    let mut active: Option<Connection> = None;
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
                if let Some(mut conn) = active.take() {
                    conn.abort();
                }
                shared.clear_writer().await;
                return;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        next_generation += 1;
                        debug!(%addr, generation = next_generation, "accepted connection");
                        tokio::spawn(handshake_accepted(
                            stream,
                            port,
                            Arc::clone(shared),
                            next_generation,
                            promote_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed, rebinding");
                        if let Some(mut conn) = active.take() {
                            conn.abort();
                        }
                        shared.clear_writer().await;
                        return;
                    }
                }
            }

            Some(pending) = promote_rx.recv() => {
                if let Some(mut old) = active.take() {
                    info!(
                        old = old.generation,
                        new = pending.generation,
                        "newer handshake replaces the active connection"
                    );
                    old.abort();
                }
                shared.install_writer(pending.writer).await;
                active = Some(Connection::spawn(
                    pending.reader,
                    pending.generation,
                    event_tx.clone(),
                ));
                heartbeat = HeartbeatState::new(
                    shared.tuning.heartbeat_interval,
                    shared.tuning.heartbeat_timeout,
                    time::epoch_ms(),
                );
                shared.set_status(ConnectionState::Connected);
            }

            Some((generation, event)) = event_rx.recv() => {
                let is_current = active
                    .as_ref()
                    .map(|c| c.generation == generation)
                    .unwrap_or(false);
                if !is_current {
                    continue;
                }
                if shared.handle_event(event, &mut heartbeat).await {
                    if let Some(mut conn) = active.take() {
                        conn.abort();
                    }
                    shared.clear_writer().await;
                    shared.set_status(ConnectionState::Connecting);
                }
            }

            _ = ticker.tick() => {
                if active.is_none() {
                    continue;
                }
                let now = time::epoch_ms();
                if heartbeat.timed_out(now) {
                    warn!(silence_ms = heartbeat.silence_ms(now), "heartbeat timeout, dropping peer");
                    if let Some(mut conn) = active.take() {
                        conn.abort();
                    }
                    shared.clear_writer().await;
                    shared.set_status(ConnectionState::Connecting);
                    continue;
                }
                let beat = Heartbeat::new(now, &shared.info.project_path);
                if shared.send_control(&beat.to_json()).await {
                    heartbeat.mark_sent(now);
                }
            }
        }
    }
}

/// Per-accept handshake: send `HANDSHAKE`, await a matching
/// `HANDSHAKE_ACK`, then hand the stream to the supervisor.
async fn handshake_accepted(
    stream: TcpStream,
    port: u16,
    shared: Arc<TransportShared>,
    generation: u64,
    promote_tx: mpsc::UnboundedSender<PendingConn>,
) {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let hello = Handshake::new(
        &shared.info.project_path,
        &shared.info.ide_type,
        &shared.info.ide_name,
        port,
    );
    if let Err(e) = write_line(&mut writer, &hello.to_json()).await {
        debug!(generation, error = %e, "handshake write failed");
        return;
    }

    let mut line = String::new();
    let read = tokio::time::timeout(shared.tuning.retry_backoff, reader.read_line(&mut line)).await;
    let n = match read {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            debug!(generation, error = %e, "handshake read failed");
            return;
        }
        Err(_) => {
            debug!(generation, "handshake ack timed out");
            return;
        }
    };
    if n == 0 {
        debug!(generation, "peer closed during handshake");
        return;
    }

    match ControlFrame::from_json(line.trim_end_matches(['\n', '\r'])) {
        Some(ControlFrame::HandshakeAck(ack))
            if paths::project_paths_match(&ack.project_path, &shared.info.project_path) =>
        {
            info!(generation, ide = %ack.ide_name, "handshake complete");
            let _ = promote_tx.send(PendingConn {
                reader,
                writer,
                generation,
            });
        }
        Some(ControlFrame::HandshakeAck(ack)) => {
            debug!(
                generation,
                theirs = %ack.project_path,
                ours = %shared.info.project_path,
                "project path mismatch, closing"
            );
        }
        _ => {
            debug!(generation, "expected HANDSHAKE_ACK, closing");
        }
    }
}
