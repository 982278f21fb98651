//! End-to-end: a feed server and a mesh node on loopback, the bridge in between.

mod common;

use common::{airborne, eventually, identification, FakeFeed, FakeMeshNode};
use skymesh_bridge::Bridge;
use skymesh_core::BridgeConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

fn config(feed: &FakeFeed, node: &FakeMeshNode) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.feed.host = feed.addr.ip().to_string();
    config.feed.port = feed.addr.port();
    config.mesh.host = node.addr.ip().to_string();
    config.mesh.port = node.addr.port();
    config.mesh.channel_index = 1;
    config.mesh.check_interval_secs = 1;
    config.reconnect.initial_backoff_secs = 0.05;
    config.reconnect.max_backoff_secs = 0.2;
    config.reconnect.max_jitter_secs = 0.0;
    config
}

async fn wait_connected(bridge: &Bridge) -> bool {
    let output = bridge.output();
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if output.is_connected().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_bridge_relays_sightings_to_mesh_node() {
    let node = FakeMeshNode::start().await;
    let feed = FakeFeed::start().await;
    let bridge = Bridge::new(&config(&feed, &node));

    let shutdown = CancellationToken::new();
    let tasks = bridge.spawn(&shutdown);

    assert!(wait_connected(&bridge).await, "bridge never connected to the mesh node");
    assert_eq!(node.connections(), 1);

    feed.push(identification("A00001", "UAL123  "));
    feed.push(airborne("A00001", 36000, 32.12345, 34.56789));

    assert!(eventually(WAIT, || node.texts().len() == 1).await);
    let received = node.texts().remove(0);
    assert_eq!(received.channel, 1);
    assert_eq!(received.hop_limit, 3);
    assert!(received.text.starts_with("✈️ UAL123 • 36,000 ft • 32.12345,34.56789"));
    assert!(received.text.contains("United States"));

    // Below the altitude floor: tracked but never announced
    feed.push(airborne("400001", 50, 51.47, -0.45));
    assert!(eventually(WAIT, || bridge.store().len() == 2).await);
    assert_eq!(node.texts().len(), 1);

    shutdown.cancel();
    for task in tasks {
        task.await.unwrap();
    }
    bridge.close().await;
}

#[tokio::test]
async fn test_bridge_recovers_after_node_drops_link() {
    let node = FakeMeshNode::start().await;
    let feed = FakeFeed::start().await;
    let bridge = Bridge::new(&config(&feed, &node));

    let shutdown = CancellationToken::new();
    let tasks = bridge.spawn(&shutdown);

    assert!(wait_connected(&bridge).await);

    feed.push(airborne("738000", 12000, 32.0, 34.8));
    assert!(eventually(WAIT, || node.texts().len() == 1).await);
    assert!(node.texts()[0].text.starts_with("✈️ AC 738000 • 12,000 ft"));

    node.kick_all();
    assert!(eventually(WAIT, || node.connections() >= 2).await);

    assert!(wait_connected(&bridge).await, "link was not re-established");

    feed.push(airborne("C01234", 31000, 45.5, -73.6));
    assert!(eventually(WAIT, || node.texts().len() == 2).await);
    assert!(node.texts()[1].text.contains("Canada"));

    shutdown.cancel();
    for task in tasks {
        task.await.unwrap();
    }
    bridge.close().await;
}
