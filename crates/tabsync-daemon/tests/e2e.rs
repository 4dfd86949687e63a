//! End-to-end tests over real loopback sockets.
//!
//! Each test drives one engine role against a hand-rolled peer speaking
//! raw newline-delimited JSON, so the wire format is asserted exactly as
//! the partner IDE would see it. Every test uses its own port range.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tabsync_core::config::{HostInfo, Role, SyncConfig, Tuning};
use tabsync_core::editor_state::{Caret, EditorState, IdeFamily, SyncAction};
use tabsync_core::host::{HostAdapter, HostOp, MockHost};
use tabsync_core::identity::{InstanceId, MessageIdMint};
use tabsync_core::protocol::MessageWrapper;
use tabsync_core::status::ConnectionState;
use tabsync_daemon::SyncEngine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const PROJECT: &str = "/home/u/proj";

fn quick_tuning(ports: RangeInclusive<u16>) -> Tuning {
    Tuning {
        debounce: Duration::from_millis(20),
        heartbeat_interval: Duration::from_millis(100),
        heartbeat_timeout: Duration::from_millis(300),
        retry_backoff: Duration::from_millis(200),
        queue_pause: Duration::from_millis(5),
        probe_timeout: Duration::from_millis(200),
        scan_ports: ports,
        attach_interval: Duration::from_millis(10),
        shutdown_grace: Duration::from_secs(1),
        ..Tuning::default()
    }
}

type Edges = Arc<Mutex<Vec<ConnectionState>>>;

fn start_engine(
    role: Role,
    project: &str,
    ports: RangeInclusive<u16>,
) -> (Arc<SyncEngine>, Arc<MockHost>, Edges) {
    let host = Arc::new(MockHost::new());
    // Family A throughout: these tests run on posix paths either way.
    let info = HostInfo::new(IdeFamily::A, "X", "X 1.0", project).with_role(role);
    let engine = SyncEngine::start(
        Arc::clone(&host) as Arc<dyn HostAdapter>,
        info,
        SyncConfig::default(),
        quick_tuning(ports),
    );
    let edges: Edges = Arc::new(Mutex::new(Vec::new()));
    let edges_clone = Arc::clone(&edges);
    engine.set_status_callback(Arc::new(move |state| {
        edges_clone.lock().unwrap().push(state);
    }));
    engine.enable_sync();
    (engine, host, edges)
}

/// A sync line as the partner IDE would send it.
fn remote_sync_line(action: SyncAction, path: &str, line: u32) -> String {
    let mint = MessageIdMint::new(InstanceId::from_parts("otherhost", PROJECT, 4321));
    let payload = EditorState::new(action, path, Caret::new(line, 0), IdeFamily::B, true);
    let mut wire = MessageWrapper::create(&mint, payload).to_json();
    wire.push('\n');
    wire
}

async fn read_json_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<Value> {
    let mut line = String::new();
    let n = timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .ok()?
        .ok()?;
    if n == 0 {
        return None;
    }
    serde_json::from_str(line.trim_end()).ok()
}

async fn write_json_line(writer: &mut OwnedWriteHalf, value: &Value) {
    let mut line = value.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.expect("write failed");
}

/// Scan a port range the way the partner scanner would: connect, read one
/// line, and return the first port that greets with a `HANDSHAKE`.
async fn scan_for_handshake(
    ports: RangeInclusive<u16>,
) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf, Value) {
    for _attempt in 0..50 {
        for port in ports.clone() {
            let Ok(Ok(stream)) = timeout(
                Duration::from_millis(200),
                TcpStream::connect(("127.0.0.1", port)),
            )
            .await
            else {
                continue;
            };
            let (read_half, writer) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            if let Some(value) = read_json_line(&mut reader).await {
                if value.get("type").and_then(Value::as_str) == Some("HANDSHAKE") {
                    return (reader, writer, value);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no listener greeted with a HANDSHAKE");
}

async fn wait_for_state(edges: &Edges, wanted: ConnectionState) {
    for _ in 0..100 {
        if edges.lock().unwrap().contains(&wanted) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("never reached {:?}, saw {:?}", wanted, edges.lock().unwrap());
}

async fn wait_for_op(host: &MockHost, matches: impl Fn(&HostOp) -> bool) -> HostOp {
    for _ in 0..100 {
        if let Some(op) = host.ops().into_iter().find(|op| matches(op)) {
            return op;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected host op never arrived, saw {:?}", host.ops());
}

// ==================== Listener role ====================

#[tokio::test]
async fn test_listener_handshake_success() {
    let ports = 3460..=3469;
    let (engine, _host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (_reader, mut writer, hello) = scan_for_handshake(ports).await;
    assert_eq!(hello["projectPath"], PROJECT);
    assert_eq!(hello["ideType"], "X");
    assert_eq!(hello["ideName"], "X 1.0");
    assert!(hello["port"].as_u64().is_some());

    write_json_line(
        &mut writer,
        &json!({
            "type": "HANDSHAKE_ACK",
            "projectPath": PROJECT,
            "ideType": "Y",
            "ideName": "Y 1.0",
        }),
    )
    .await;

    wait_for_state(&edges, ConnectionState::Connected).await;
    assert_eq!(engine.connection_state(), ConnectionState::Connected);
    engine.dispose().await;
}

#[tokio::test]
async fn test_listener_rejects_path_mismatch() {
    let ports = 3470..=3479;
    let (engine, _host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (mut reader, mut writer, _hello) = scan_for_handshake(ports).await;
    write_json_line(
        &mut writer,
        &json!({
            "type": "HANDSHAKE_ACK",
            "projectPath": "/home/u/other",
            "ideType": "Y",
            "ideName": "Y 1.0",
        }),
    )
    .await;

    // The listener closes the socket without promoting the connection.
    let next = read_json_line(&mut reader).await;
    assert!(next.is_none(), "expected EOF, got {:?}", next);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!edges.lock().unwrap().contains(&ConnectionState::Connected));
    assert_eq!(engine.connection_state(), ConnectionState::Connecting);
    engine.dispose().await;
}

#[tokio::test]
async fn test_sync_message_applied_by_listener() {
    let ports = 3480..=3489;
    let (engine, host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (_reader, mut writer, _hello) = scan_for_handshake(ports).await;
    write_json_line(
        &mut writer,
        &json!({"type": "HANDSHAKE_ACK", "projectPath": PROJECT, "ideType": "Y", "ideName": "Y 1.0"}),
    )
    .await;
    wait_for_state(&edges, ConnectionState::Connected).await;

    writer
        .write_all(remote_sync_line(SyncAction::Open, "/home/u/proj/a.rs", 3).as_bytes())
        .await
        .unwrap();

    let op = wait_for_op(&host, |op| matches!(op, HostOp::Open { .. })).await;
    assert_eq!(
        op,
        HostOp::Open {
            path: "/home/u/proj/a.rs".into(),
            focus: false
        }
    );
    engine.dispose().await;
}

#[tokio::test]
async fn test_stale_and_observational_messages_dropped() {
    let ports = 3490..=3499;
    let (engine, host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (_reader, mut writer, _hello) = scan_for_handshake(ports).await;
    write_json_line(
        &mut writer,
        &json!({"type": "HANDSHAKE_ACK", "projectPath": PROJECT, "ideType": "Y", "ideName": "Y 1.0"}),
    )
    .await;
    wait_for_state(&edges, ConnectionState::Connected).await;

    let mint = MessageIdMint::new(InstanceId::from_parts("otherhost", PROJECT, 4321));

    // Ten seconds old: stale.
    let mut stale =
        EditorState::new(SyncAction::Open, "/home/u/proj/a.rs", Caret::new(0, 0), IdeFamily::B, true);
    let past = chrono::Local::now() - chrono::Duration::seconds(10);
    stale.timestamp = past.format(tabsync_core::time::TIMESTAMP_FORMAT).to_string();
    let mut line = MessageWrapper::create(&mint, stale).to_json();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.unwrap();

    // Fresh but observational.
    let observational =
        EditorState::new(SyncAction::Open, "/home/u/proj/b.rs", Caret::new(0, 0), IdeFamily::B, false);
    let mut line = MessageWrapper::create(&mint, observational).to_json();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(host.ops().is_empty(), "dropped messages must not mutate the host");
    engine.dispose().await;
}

#[tokio::test]
async fn test_heartbeat_flow_and_ack() {
    let ports = 3500..=3509;
    let (engine, _host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (mut reader, mut writer, _hello) = scan_for_handshake(ports).await;
    write_json_line(
        &mut writer,
        &json!({"type": "HANDSHAKE_ACK", "projectPath": PROJECT, "ideType": "Y", "ideName": "Y 1.0"}),
    )
    .await;
    wait_for_state(&edges, ConnectionState::Connected).await;

    // The listener beats on its interval.
    let mut saw_heartbeat = false;
    for _ in 0..10 {
        let Some(frame) = read_json_line(&mut reader).await else {
            break;
        };
        if frame["type"] == "HEARTBEAT" {
            assert_eq!(frame["projectPath"], PROJECT);
            assert!(frame["timestamp"].as_u64().is_some());
            saw_heartbeat = true;
            break;
        }
    }
    assert!(saw_heartbeat, "no HEARTBEAT within the window");

    // Our own beat gets acked.
    write_json_line(&mut writer, &json!({"type": "HEARTBEAT", "timestamp": 1, "projectPath": PROJECT}))
        .await;
    let mut saw_ack = false;
    for _ in 0..10 {
        let Some(frame) = read_json_line(&mut reader).await else {
            break;
        };
        if frame["type"] == "HEARTBEAT_ACK" {
            saw_ack = true;
            break;
        }
    }
    assert!(saw_ack, "no HEARTBEAT_ACK for our beat");
    engine.dispose().await;
}

#[tokio::test]
async fn test_silent_peer_demoted_on_heartbeat_timeout() {
    let ports = 3510..=3519;
    let (engine, _host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (_reader, mut writer, _hello) = scan_for_handshake(ports).await;
    write_json_line(
        &mut writer,
        &json!({"type": "HANDSHAKE_ACK", "projectPath": PROJECT, "ideType": "Y", "ideName": "Y 1.0"}),
    )
    .await;
    wait_for_state(&edges, ConnectionState::Connected).await;

    // Keep the socket open but never reply to heartbeats. With a 300 ms
    // timeout and 100 ms interval the demotion lands well within a second.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let seen = edges.lock().unwrap().clone();
    let connected_at = seen.iter().position(|s| *s == ConnectionState::Connected);
    let demoted_after = connected_at
        .map(|i| seen[i..].contains(&ConnectionState::Connecting))
        .unwrap_or(false);
    assert!(demoted_after, "expected demotion to Connecting, saw {:?}", seen);
    engine.dispose().await;
}

// ==================== Scanner role ====================

#[tokio::test]
async fn test_scanner_handshake_and_delivery() {
    let ports = 3520..=3529;
    // Stand in for the listener IDE.
    let mut server = None;
    for port in ports.clone() {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            server = Some((listener, port));
            break;
        }
    }
    let (server, port) = server.expect("no free port for the test listener");

    let (engine, host, edges) = start_engine(Role::Scanner, PROJECT, ports);

    let (stream, _addr) = timeout(Duration::from_secs(5), server.accept())
        .await
        .expect("scanner never connected")
        .unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_json_line(
        &mut writer,
        &json!({
            "type": "HANDSHAKE",
            "projectPath": PROJECT,
            "ideType": "X",
            "ideName": "X 1.0",
            "port": port,
        }),
    )
    .await;

    let ack = read_json_line(&mut reader).await.expect("no HANDSHAKE_ACK");
    assert_eq!(ack["type"], "HANDSHAKE_ACK");
    assert_eq!(ack["projectPath"], PROJECT);
    wait_for_state(&edges, ConnectionState::Connected).await;

    writer
        .write_all(remote_sync_line(SyncAction::Navigate, "/home/u/proj/b.rs", 7).as_bytes())
        .await
        .unwrap();

    let op = wait_for_op(&host, |op| matches!(op, HostOp::SetView { .. })).await;
    assert_eq!(
        op,
        HostOp::SetView {
            path: "/home/u/proj/b.rs".into(),
            caret: Caret::new(7, 0),
            selection: None
        }
    );
    engine.dispose().await;
}

#[tokio::test]
async fn test_scanner_skips_foreign_project() {
    let ports = 3530..=3539;
    let mut server = None;
    for port in ports.clone() {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            server = Some((listener, port));
            break;
        }
    }
    let (server, port) = server.expect("no free port for the test listener");

    let (engine, _host, edges) = start_engine(Role::Scanner, PROJECT, ports);

    // Greet with somebody else's project; the scanner must hang up.
    let (stream, _addr) = timeout(Duration::from_secs(5), server.accept())
        .await
        .expect("scanner never probed")
        .unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    write_json_line(
        &mut writer,
        &json!({
            "type": "HANDSHAKE",
            "projectPath": "/home/u/other",
            "ideType": "X",
            "ideName": "X 1.0",
            "port": port,
        }),
    )
    .await;

    let next = read_json_line(&mut reader).await;
    assert!(next.is_none(), "expected the scanner to hang up, got {:?}", next);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!edges.lock().unwrap().contains(&ConnectionState::Connected));
    engine.dispose().await;
}

// ==================== Outbound path ====================

#[tokio::test]
async fn test_local_open_reaches_the_peer() {
    let ports = 3540..=3549;
    let (engine, _host, edges) = start_engine(Role::Listener, PROJECT, ports.clone());

    let (mut reader, mut writer, _hello) = scan_for_handshake(ports).await;
    write_json_line(
        &mut writer,
        &json!({"type": "HANDSHAKE_ACK", "projectPath": PROJECT, "ideType": "Y", "ideName": "Y 1.0"}),
    )
    .await;
    wait_for_state(&edges, ConnectionState::Connected).await;

    engine
        .ingest()
        .file_opened("/home/u/proj/c.rs", Caret::new(2, 4), None);

    let mut wrapper = None;
    for _ in 0..20 {
        let Some(frame) = read_json_line(&mut reader).await else {
            break;
        };
        if frame.get("messageId").is_some() {
            wrapper = Some(frame);
            break;
        }
    }
    let wrapper = wrapper.expect("no sync wrapper arrived");
    assert_eq!(wrapper["senderId"], engine.instance_id().as_str());
    assert_eq!(wrapper["payload"]["action"], "OPEN");
    assert_eq!(wrapper["payload"]["filePath"], "/home/u/proj/c.rs");
    assert_eq!(wrapper["payload"]["line"], 2);
    assert_eq!(wrapper["payload"]["column"], 4);
    assert_eq!(wrapper["payload"]["isActive"], true);
    engine.dispose().await;
}
