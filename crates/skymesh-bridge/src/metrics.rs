//! Bridge metrics
//!
//! Counters are published through the `metrics` facade, so they reach whatever
//! recorder is installed (the Prometheus exporter when enabled), and mirrored
//! in atomics for logs and tests.

use crate::admission::Rejection;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use parking_lot::RwLock;
use skymesh_client::{ConnectionState, ConnectionStatus};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

/// Send latency buckets, in seconds
const SEND_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

#[derive(Debug)]
pub struct BridgeMetrics {
    lines: AtomicU64,
    malformed: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    sent: AtomicU64,
    send_failed: AtomicU64,
    evicted: AtomicU64,
    reconnects: AtomicU64,
    task_restarts: AtomicU64,
    connections: RwLock<HashMap<&'static str, ConnectionState>>,
}

/// Gauge encoding of a connection state
fn state_value(state: ConnectionState) -> f64 {
    match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Connected => 2.0,
        ConnectionState::Reconnecting => 3.0,
    }
}

impl BridgeMetrics {
    pub fn new() -> Self {
        describe_counter!("skymesh_feed_lines_total", "Lines read from the surveillance feed");
        describe_counter!(
            "skymesh_records_malformed_total",
            "MSG records dropped because they could not be attributed to an aircraft"
        );
        describe_counter!("skymesh_admissions_total", "Announcements admitted for dispatch");
        describe_counter!(
            "skymesh_admission_rejections_total",
            "Announcements rejected, by reason"
        );
        describe_counter!("skymesh_sends_total", "Mesh send attempts, by result");
        describe_counter!("skymesh_tracks_evicted_total", "Tracks removed by the reaper");
        describe_counter!("skymesh_reconnects_total", "Reconnect attempts scheduled, by endpoint");
        describe_counter!("skymesh_task_restarts_total", "Background task restarts after a panic");
        describe_gauge!("skymesh_tracks_active", "Tracks currently held in the store");
        describe_gauge!(
            "skymesh_connection_state",
            "Endpoint state: 0 disconnected, 1 connecting, 2 connected, 3 reconnecting"
        );
        describe_gauge!(
            "skymesh_connection_failed_attempts",
            "Failed attempts since the last successful connection"
        );
        describe_counter!("skymesh_connection_bytes_sent_total", "Bytes written to an endpoint");
        describe_counter!("skymesh_connection_bytes_received_total", "Bytes read from an endpoint");
        describe_counter!("skymesh_connection_frames_received_total", "Lines or frames read from an endpoint");
        describe_counter!("skymesh_connection_errors_total", "Connection failures, by endpoint");
        describe_histogram!("skymesh_send_latency_seconds", "Time to hand one announcement to the mesh node");

        Self {
            lines: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            send_failed: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            task_restarts: AtomicU64::new(0),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
        counter!("skymesh_feed_lines_total").increment(1);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        counter!("skymesh_records_malformed_total").increment(1);
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        counter!("skymesh_admissions_total").increment(1);
    }

    pub fn record_rejected(&self, reason: Rejection) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!("skymesh_admission_rejections_total", "reason" => reason.as_str()).increment(1);
    }

    pub fn record_send(&self, delivered: bool, latency: Duration) {
        if delivered {
            self.sent.fetch_add(1, Ordering::Relaxed);
            counter!("skymesh_sends_total", "result" => "ok").increment(1);
        } else {
            self.send_failed.fetch_add(1, Ordering::Relaxed);
            counter!("skymesh_sends_total", "result" => "failed").increment(1);
        }
        histogram!("skymesh_send_latency_seconds").record(latency.as_secs_f64());
    }

    pub fn record_evicted(&self, count: usize, remaining: usize) {
        self.evicted.fetch_add(count as u64, Ordering::Relaxed);
        counter!("skymesh_tracks_evicted_total").increment(count as u64);
        gauge!("skymesh_tracks_active").set(remaining as f64);
    }

    pub fn record_reconnect(&self, endpoint: &'static str) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        counter!("skymesh_reconnects_total", "endpoint" => endpoint).increment(1);
    }

    pub fn record_task_restart(&self, task: &'static str) {
        self.task_restarts.fetch_add(1, Ordering::Relaxed);
        counter!("skymesh_task_restarts_total", "task" => task).increment(1);
    }

    /// Publishes an endpoint's state and traffic counters.
    pub fn record_connection(&self, endpoint: &'static str, status: &ConnectionStatus) {
        let state = status.state();
        let snapshot = status.metrics().snapshot();
        self.connections.write().insert(endpoint, state);

        gauge!("skymesh_connection_state", "endpoint" => endpoint).set(state_value(state));
        gauge!("skymesh_connection_failed_attempts", "endpoint" => endpoint).set(snapshot.failed_attempts as f64);
        counter!("skymesh_connection_bytes_sent_total", "endpoint" => endpoint).absolute(snapshot.bytes_sent);
        counter!("skymesh_connection_bytes_received_total", "endpoint" => endpoint).absolute(snapshot.bytes_received);
        counter!("skymesh_connection_frames_received_total", "endpoint" => endpoint).absolute(snapshot.frames_received);
        counter!("skymesh_connection_errors_total", "endpoint" => endpoint).absolute(snapshot.errors);
    }

    /// Last published state of `endpoint`
    pub fn connection_state(&self, endpoint: &str) -> Option<ConnectionState> {
        self.connections.read().get(endpoint).copied()
    }

    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn send_failed(&self) -> u64 {
        self.send_failed.load(Ordering::Relaxed)
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn task_restarts(&self) -> u64 {
        self.task_restarts.load(Ordering::Relaxed)
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder with an HTTP scrape endpoint on `listen`.
///
/// Must be called from within a Tokio runtime.
pub fn install_prometheus(listen: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = listen.parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("latency_seconds".to_string()),
            SEND_LATENCY_BUCKETS,
        )?
        .install()?;

    info!(bind_address = %addr, "Prometheus metrics exporter started");
    Ok(())
}
