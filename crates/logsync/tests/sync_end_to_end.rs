//! Device/server sync scenarios driven through the node facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use logsync::store::{LogStore, MemoryStore, SqliteStore};
use logsync::sync::{
    verify_convergence, ConvergenceResult, LogEndpoint, LoopbackTransport, SyncError,
    Transport,
};
use logsync::{LogNode, NodeConfig, NodeError, SyncConfig, SyncMode};
use logsync_testkit::{events_for, SyncFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn reading(value: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    props.insert("reading".to_string(), value.to_string());
    props
}

#[tokio::test]
async fn device_and_server_converge_with_sqlite_device() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let device = LogNode::new(
        SqliteStore::open(dir.path().join("device.db")).unwrap(),
        NodeConfig {
            sync: SyncConfig::default().with_owner_filter("device-7"),
            ..NodeConfig::default()
        },
    );
    let server = Arc::new(LogNode::new(MemoryStore::new(), NodeConfig::default()));
    let endpoint = Arc::new(server.endpoint());

    for i in 0..5 {
        device
            .append_at("device-7", 1, 1_000 + i, 2, reading(&format!("{}.0", i)))
            .await
            .unwrap();
    }
    // Server-side configuration for the device, plus another device's data.
    server
        .append_at("device-7", 2, 5_000, 9, reading("cfg"))
        .await
        .unwrap();
    server
        .append_at("device-8", 1, 6_000, 2, reading("other"))
        .await
        .unwrap();

    let report = device
        .sync("server", LoopbackTransport::from_endpoint(Arc::clone(&endpoint)))
        .await
        .unwrap();
    assert_eq!(report.pushed, 5);
    assert_eq!(report.pulled, 1);
    assert!(report.failed_logs.is_empty());

    assert_eq!(
        device.descriptor("device-7", 1).await.unwrap(),
        server.descriptor("device-7", 1).await.unwrap()
    );
    assert_eq!(device.log("device-7", 2).await.unwrap().len(), 1);
    assert!(device.descriptor("device-8", 1).await.unwrap().is_none());

    for remote in server.store().get_descriptors_for("device-7").await.unwrap() {
        let result = verify_convergence(device.store().as_ref(), &remote).await.unwrap();
        assert!(result.is_converged(), "{} not converged: {:?}", remote, result);
    }

    // Nothing left to move.
    let again = device
        .sync("server", LoopbackTransport::from_endpoint(endpoint))
        .await
        .unwrap();
    assert_eq!(again.pushed + again.pulled, 0);
}

#[tokio::test]
async fn sparse_logs_fill_only_their_gaps() {
    init_tracing();
    let fixture = SyncFixture::new();
    fixture.seed_device("gw", 1, &[1, 2, 3, 7, 8, 20]).await.unwrap();
    fixture.seed_server("gw", 1, &[2, 3, 4, 5, 20, 21]).await.unwrap();

    let report = fixture.session(SyncConfig::default()).run().await.unwrap();
    assert_eq!(report.pushed, 3);
    assert_eq!(report.pulled, 3);
    assert!(fixture.converged().await.unwrap());

    let descriptor = fixture.device.get_descriptor("gw", 1).await.unwrap().unwrap();
    assert_eq!(descriptor.to_representation(), "gw,1,1-5,7-8,20-21");
}

#[tokio::test]
async fn applying_the_same_stream_twice_is_a_no_op() {
    init_tracing();
    let source = LogEndpoint::new(MemoryStore::new());
    source
        .store()
        .put(&events_for("gw", 4, &[1, 2, 3]))
        .await
        .unwrap();
    let stream = source.handle_get(b"gw,4,1-3\n").await.unwrap();

    let sink = LoopbackTransport::new(MemoryStore::new());
    sink.send(stream.clone()).await.unwrap();
    sink.send(stream).await.unwrap();

    let stored = sink.endpoint().store().get_log("gw", 4).await.unwrap();
    assert_eq!(stored, events_for("gw", 4, &[1, 2, 3]));
}

#[tokio::test]
async fn absent_local_log_pulls_everything() {
    init_tracing();
    let fixture = SyncFixture::new();
    fixture.seed_server("srv", 9, &[10, 11, 500]).await.unwrap();

    let config = SyncConfig::default().with_mode(SyncMode::Pull);
    let report = fixture.session(config).run().await.unwrap();
    assert_eq!(report.pulled, 3);

    let result = verify_convergence(
        fixture.device.as_ref(),
        &fixture.server.get_descriptor("srv", 9).await.unwrap().unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(result, ConvergenceResult::Converged);
}

#[tokio::test]
async fn diverged_event_content_is_never_overwritten() {
    init_tracing();
    let fixture = SyncFixture::new();
    fixture.device.put(&events_for("gw", 1, &[1])).await.unwrap();
    let mut theirs = BTreeMap::new();
    theirs.insert("id".to_string(), "rewritten".to_string());
    fixture
        .server
        .insert(&logsync::LogEvent::new("gw", 1, 1, 1, 1, theirs))
        .await
        .unwrap();
    fixture.seed_server("gw", 1, &[2]).await.unwrap();

    let report = fixture
        .session(SyncConfig::default().with_mode(SyncMode::Pull))
        .run()
        .await
        .unwrap();
    assert_eq!(report.pulled, 1);

    let local = fixture.device.get_log("gw", 1).await.unwrap();
    assert_eq!(local[0], events_for("gw", 1, &[1])[0]);
}

/// Transport whose remote is unreachable.
struct Unreachable;

#[async_trait::async_trait]
impl Transport for Unreachable {
    async fn query(&self, _owner_id: Option<&str>) -> logsync::sync::Result<Bytes> {
        Err(SyncError::Transport("connection refused".into()))
    }

    async fn get(&self, _request: Bytes) -> logsync::sync::Result<Bytes> {
        Err(SyncError::Transport("connection refused".into()))
    }

    async fn send(&self, _stream: Bytes) -> logsync::sync::Result<()> {
        Err(SyncError::Transport("connection refused".into()))
    }
}

#[tokio::test]
async fn unreachable_remote_surfaces_transport_error() {
    init_tracing();
    let node = LogNode::new(MemoryStore::new(), NodeConfig::default());
    node.append("dev", 1, 1, BTreeMap::new()).await.unwrap();

    let err = node.sync("server", Unreachable).await.unwrap_err();
    assert!(matches!(err, NodeError::Sync(SyncError::Transport(_))));
    assert!(!node.is_busy("server"));
}
