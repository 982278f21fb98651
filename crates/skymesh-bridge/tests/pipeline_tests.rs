//! Pipeline behaviour against an in-memory mesh node.

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use skymesh_bridge::{Bridge, LineOutcome};
use skymesh_client::{MeshConnector, MeshLink};
use skymesh_core::BridgeConfig;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const IDENT: &str =
    "MSG,1,111,11111,A00001,111111,2024/01/15,10:30:00.000,2024/01/15,10:30:00.000,UAL123  ,,,,,,,,,,,0";
const AIRBORNE: &str = "MSG,3,111,11111,A00001,111111,2024/01/15,10:30:01.000,2024/01/15,10:30:01.000,,36000,,,32.12345,34.56789,,,0,0,0,0";

fn airborne(icao: &str, alt: u32, lat: f64, lon: f64) -> String {
    format!(
        "MSG,3,111,11111,{},111111,2024/01/15,10:30:01.000,2024/01/15,10:30:01.000,,{},,,{},{},,,0,0,0,0",
        icao, alt, lat, lon
    )
}

#[derive(Default)]
struct MeshLog {
    sent: Mutex<Vec<(u32, String)>>,
    connects: AtomicU32,
    fail_sends: AtomicBool,
    panic_next: AtomicBool,
}

struct RecordingLink(Arc<MeshLog>);

#[async_trait]
impl MeshLink for RecordingLink {
    async fn send_text(&mut self, channel: u32, text: &str) -> anyhow::Result<()> {
        if self.0.panic_next.swap(false, Ordering::SeqCst) {
            panic!("link driver crashed");
        }
        if self.0.fail_sends.load(Ordering::SeqCst) {
            bail!("node rejected packet");
        }
        self.0.sent.lock().push((channel, text.to_string()));
        Ok(())
    }

    async fn heartbeat(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }

    async fn close(&mut self) {}
}

struct RecordingConnector(Arc<MeshLog>);

#[async_trait]
impl MeshConnector for RecordingConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn MeshLink>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingLink(Arc::clone(&self.0))))
    }

    fn endpoint(&self) -> String {
        "recorder".to_string()
    }
}

fn config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.mesh.channel_index = 2;
    config.limits.per_aircraft_period_secs = 30.0;
    config.limits.global_rate_per_min = 30;
    config
}

async fn connected_bridge(config: &BridgeConfig) -> (Bridge, Arc<MeshLog>) {
    let log = Arc::new(MeshLog::default());
    let bridge = Bridge::with_connector(config, Arc::new(RecordingConnector(Arc::clone(&log))));
    bridge.output().establish().await.unwrap();
    (bridge, log)
}

#[tokio::test]
async fn test_identification_then_position_announces() {
    let (bridge, log) = connected_bridge(&config()).await;
    let pipeline = bridge.pipeline();
    let t0 = Instant::now();

    assert_eq!(pipeline.handle_line(IDENT, t0).await, LineOutcome::Merged);
    assert_eq!(
        pipeline.handle_line(AIRBORNE, t0).await,
        LineOutcome::Dispatched { delivered: true }
    );

    let sent = log.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    let (channel, text) = &sent[0];
    assert_eq!(*channel, 2);
    assert!(text.starts_with("✈️ UAL123 • 36,000 ft • 32.12345,34.56789"));
    assert!(text.contains("United States"));

    let track = bridge.store().get("A00001".parse().unwrap()).unwrap();
    assert_eq!(track.last_announced, Some(t0));
}

#[tokio::test]
async fn test_position_without_callsign_uses_fallback_ident() {
    let (bridge, log) = connected_bridge(&config()).await;
    let line = airborne("738000", 12000, 32.0, 34.8);

    bridge.pipeline().handle_line(&line, Instant::now()).await;

    let sent = log.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.starts_with("✈️ AC 738000 • 12,000 ft"));
    assert!(sent[0].1.contains("Israel"));
}

#[tokio::test]
async fn test_low_altitude_never_announces() {
    let (bridge, log) = connected_bridge(&config()).await;
    let line = airborne("400001", 50, 51.47, -0.45);

    assert_eq!(
        bridge.pipeline().handle_line(&line, Instant::now()).await,
        LineOutcome::Merged
    );
    let track = bridge.store().get("400001".parse().unwrap()).unwrap();
    assert_eq!(track.altitude_ft, None);
    assert!(track.position.is_some());
    assert!(log.sent.lock().is_empty());
}

#[tokio::test]
async fn test_cooldown_per_aircraft() {
    let (bridge, log) = connected_bridge(&config()).await;
    let pipeline = bridge.pipeline();
    let t0 = Instant::now();

    assert_eq!(
        pipeline.handle_line(&airborne("A00001", 36000, 32.0, 34.0), t0).await,
        LineOutcome::Dispatched { delivered: true }
    );
    assert_eq!(
        pipeline
            .handle_line(&airborne("A00001", 36100, 32.1, 34.1), t0 + Duration::from_secs(10))
            .await,
        LineOutcome::Rejected
    );
    assert_eq!(
        pipeline
            .handle_line(&airborne("A00001", 36200, 32.2, 34.2), t0 + Duration::from_secs(30))
            .await,
        LineOutcome::Dispatched { delivered: true }
    );
    assert_eq!(log.sent.lock().len(), 2);
}

#[tokio::test]
async fn test_global_cap_limits_dispatches_per_window() {
    let mut config = config();
    config.limits.global_rate_per_min = 2;
    let (bridge, log) = connected_bridge(&config).await;
    let pipeline = bridge.pipeline();
    let t0 = Instant::now();

    let outcomes = [
        pipeline.handle_line(&airborne("A00001", 36000, 32.0, 34.0), t0).await,
        pipeline.handle_line(&airborne("738000", 12000, 32.5, 34.9), t0).await,
        pipeline.handle_line(&airborne("4CA123", 8000, 53.4, -6.2), t0).await,
    ];
    assert_eq!(
        outcomes,
        [
            LineOutcome::Dispatched { delivered: true },
            LineOutcome::Dispatched { delivered: true },
            LineOutcome::Rejected,
        ]
    );
    assert_eq!(log.sent.lock().len(), 2);

    // The third aircraft goes out once the window rolls
    let later = t0 + Duration::from_secs(61);
    assert_eq!(
        pipeline.handle_line(&airborne("4CA123", 8100, 53.5, -6.3), later).await,
        LineOutcome::Dispatched { delivered: true }
    );
    assert!(log.sent.lock()[2].1.contains("Ireland"));
}

#[tokio::test]
async fn test_failed_send_consumes_slot_without_cooldown() {
    let mut config = config();
    config.limits.global_rate_per_min = 2;
    let (bridge, log) = connected_bridge(&config).await;
    let pipeline = bridge.pipeline();
    let t0 = Instant::now();

    log.fail_sends.store(true, Ordering::SeqCst);
    assert_eq!(
        pipeline.handle_line(&airborne("A00001", 36000, 32.0, 34.0), t0).await,
        LineOutcome::Dispatched { delivered: false }
    );
    // The failure dropped the link; the next attempt fails fast
    assert!(!bridge.output().is_connected().await);
    assert_eq!(
        pipeline.handle_line(&airborne("A00001", 36100, 32.1, 34.1), t0).await,
        LineOutcome::Dispatched { delivered: false }
    );
    // Both slots of the window are spent
    assert_eq!(
        pipeline.handle_line(&airborne("738000", 12000, 32.5, 34.9), t0).await,
        LineOutcome::Rejected
    );

    let track = bridge.store().get("A00001".parse().unwrap()).unwrap();
    assert_eq!(track.last_announced, None);
    assert!(!track.dispatch_pending);
    assert_eq!(bridge.metrics().send_failed(), 2);
}

#[tokio::test]
async fn test_malformed_and_foreign_records() {
    let (bridge, log) = connected_bridge(&config()).await;
    let pipeline = bridge.pipeline();
    let now = Instant::now();

    assert_eq!(pipeline.handle_line("MSG,3,1", now).await, LineOutcome::Malformed);
    assert_eq!(pipeline.handle_line("MSG,3,1,1,NOTHEX,1", now).await, LineOutcome::Malformed);
    assert_eq!(pipeline.handle_line("STA,,5,179,400AE7,10103", now).await, LineOutcome::Ignored);
    assert_eq!(pipeline.handle_line("", now).await, LineOutcome::Ignored);

    assert!(bridge.store().is_empty());
    assert!(log.sent.lock().is_empty());
    assert_eq!(bridge.metrics().malformed(), 2);
    assert_eq!(bridge.metrics().lines(), 4);
}

#[tokio::test]
async fn test_panicking_send_releases_reservation() {
    let (bridge, log) = connected_bridge(&config()).await;
    let t0 = Instant::now();
    log.panic_next.store(true, Ordering::SeqCst);

    let crashed = tokio::spawn({
        let pipeline = bridge.pipeline();
        async move { pipeline.handle_line(AIRBORNE, t0).await }
    })
    .await;
    assert!(crashed.unwrap_err().is_panic());

    let track = bridge.store().get("A00001".parse().unwrap()).unwrap();
    assert!(!track.dispatch_pending);
    assert_eq!(track.last_announced, None);

    let retry = airborne("A00001", 36100, 32.1, 34.1);
    assert_eq!(
        bridge.pipeline().handle_line(&retry, t0 + Duration::from_secs(1)).await,
        LineOutcome::Dispatched { delivered: true }
    );
    assert_eq!(log.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_streams_from_feed_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicU32::new(0));

    let feed = tokio::spawn({
        let accepts = Arc::clone(&accepts);
        async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let n = accepts.fetch_add(1, Ordering::SeqCst);
                let payload = if n == 0 {
                    format!("{}\r\n{}\r\n", IDENT, AIRBORNE)
                } else {
                    format!("{}\n", airborne("C01234", 31000, 45.5, -73.6))
                };
                let _ = socket.write_all(payload.as_bytes()).await;
                // Closing ends the session and forces a reconnect
                drop(socket);
            }
        }
    });

    let mut config = config();
    config.feed.host = addr.ip().to_string();
    config.feed.port = addr.port();
    config.reconnect.initial_backoff_secs = 0.05;
    config.reconnect.max_backoff_secs = 0.2;
    config.reconnect.max_jitter_secs = 0.0;
    let (bridge, log) = connected_bridge(&config).await;

    let shutdown = CancellationToken::new();
    let runner = tokio::spawn({
        let pipeline = bridge.pipeline();
        let shutdown = shutdown.clone();
        async move { pipeline.run_until(&shutdown).await }
    });

    let mut delivered = 0;
    for _ in 0..300 {
        delivered = log.sent.lock().len();
        if delivered >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(delivered >= 2);
    assert!(accepts.load(Ordering::SeqCst) >= 2);

    let sent = log.sent.lock().clone();
    assert!(sent[0].1.contains("UAL123"));
    assert!(sent.iter().any(|(_, text)| text.contains("Canada")));

    assert!(bridge.metrics().connection_state("feed").is_some());

    shutdown.cancel();
    runner.await.unwrap();
    feed.abort();
}
