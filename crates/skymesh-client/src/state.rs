use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Lifecycle of one endpoint connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No connection and no attempt in progress
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Connected and usable
    Connected,
    /// Waiting out a backoff delay after a failure
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// Traffic counters for one endpoint.
///
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    /// Lines (feed) or frames (mesh) written
    frames_sent: Arc<AtomicU64>,
    /// Lines (feed) or frames (mesh) read
    frames_received: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    /// Successful connections, including the first
    connects: Arc<AtomicU64>,
    /// Failed attempts since the last successful connection
    failed_attempts: Arc<AtomicU64>,
    last_activity: Arc<parking_lot::RwLock<SystemTime>>,
    connected_at: Arc<parking_lot::RwLock<Option<SystemTime>>>,
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self {
            bytes_sent: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            frames_sent: Arc::new(AtomicU64::new(0)),
            frames_received: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            connects: Arc::new(AtomicU64::new(0)),
            failed_attempts: Arc::new(AtomicU64::new(0)),
            last_activity: Arc::new(parking_lot::RwLock::new(SystemTime::now())),
            connected_at: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    pub fn record_frame_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_frame_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark connection as established
    pub fn mark_connected(&self) {
        *self.connected_at.write() = Some(SystemTime::now());
        self.connects.fetch_add(1, Ordering::Relaxed);
        self.failed_attempts.store(0, Ordering::Relaxed);
        self.touch();
    }

    pub fn mark_disconnected(&self) {
        *self.connected_at.write() = None;
    }

    fn touch(&self) {
        *self.last_activity.write() = SystemTime::now();
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    pub fn last_activity(&self) -> SystemTime {
        *self.last_activity.read()
    }

    pub fn connected_at(&self) -> Option<SystemTime> {
        *self.connected_at.read()
    }

    /// Time since the last byte moved in either direction
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed().unwrap_or(Duration::ZERO)
    }

    /// Get connection duration (if connected)
    pub fn connection_duration(&self) -> Option<Duration> {
        self.connected_at().and_then(|t| t.elapsed().ok())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
            frames_sent: self.frames_sent(),
            frames_received: self.frames_received(),
            errors: self.errors(),
            connects: self.connects(),
            failed_attempts: self.failed_attempts(),
            connected_for: self.connection_duration(),
        }
    }
}

/// Point-in-time copy of [`ConnectionMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub errors: u64,
    pub connects: u64,
    pub failed_attempts: u64,
    pub connected_for: Option<Duration>,
}

impl MetricsSnapshot {
    /// Received frames per second over the current connection
    pub fn receive_rate(&self) -> Option<f64> {
        self.connected_for.map(|duration| {
            let secs = duration.as_secs_f64();
            if secs > 0.0 {
                self.frames_received as f64 / secs
            } else {
                0.0
            }
        })
    }
}

/// Combined connection state and metrics, shared between a client and its observers
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    state: Arc<parking_lot::RwLock<ConnectionState>>,
    metrics: ConnectionMetrics,
    last_error: Arc<parking_lot::RwLock<Option<String>>>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(parking_lot::RwLock::new(ConnectionState::Disconnected)),
            metrics: ConnectionMetrics::new(),
            last_error: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    /// Records a successful connection.
    pub fn connected(&self) {
        self.set_state(ConnectionState::Connected);
        self.metrics.mark_connected();
        *self.last_error.write() = None;
    }

    /// Records a lost connection or failed attempt, keeping the reason.
    pub fn failed(&self, reason: impl Into<String>) {
        self.set_state(ConnectionState::Reconnecting);
        self.metrics.mark_disconnected();
        self.metrics.record_error();
        *self.last_error.write() = Some(reason.into());
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "Reconnecting");
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ConnectionMetrics::new();

        metrics.record_frame_sent(100);
        metrics.record_frame_received(200);
        metrics.record_frame_received(50);
        metrics.record_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.bytes_sent, 100);
        assert_eq!(snap.bytes_received, 250);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.errors, 1);
        assert!(snap.connected_for.is_none());
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ConnectionMetrics::new();
        let other = metrics.clone();
        other.record_frame_received(10);
        assert_eq!(metrics.frames_received(), 1);
    }

    #[test]
    fn test_connection_status_transitions() {
        let status = ConnectionStatus::new();
        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert!(!status.is_connected());

        status.metrics().record_failed_attempt();
        status.failed("connection refused");
        assert_eq!(status.state(), ConnectionState::Reconnecting);
        assert_eq!(status.last_error().as_deref(), Some("connection refused"));
        assert_eq!(status.metrics().failed_attempts(), 1);

        status.connected();
        assert!(status.is_connected());
        assert_eq!(status.last_error(), None);
        assert_eq!(status.metrics().connects(), 1);
        assert_eq!(status.metrics().failed_attempts(), 0);
        assert!(status.metrics().connected_at().is_some());
    }
}
