//! Output channel manager.
//!
//! Owns the single, possibly-absent link to the mesh node. Senders never
//! connect: [`OutputChannel::send`] fails immediately while the link is
//! absent, and any send failure drops the link so the reconnect loop in
//! [`OutputChannel::run_until`] replaces it.

use crate::metrics::BridgeMetrics;
use crate::shutdown::sleep_or_cancel;
use crate::supervisor::Supervised;
use async_trait::async_trait;
use skymesh_client::{is_transient, Backoff, MeshConnector, MeshLink, ReconnectConfig};
use skymesh_core::BridgeConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing of the reconnect loop
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub reconnect: ReconnectConfig,
    /// Idle period between link checks
    pub check_interval: Duration,
    /// Heartbeat period on an otherwise idle link
    pub heartbeat_interval: Duration,
}

impl OutputSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            reconnect: ReconnectConfig::from(&config.reconnect),
            check_interval: config.mesh.check_interval(),
            heartbeat_interval: config.mesh.heartbeat_interval(),
        }
    }
}

pub struct OutputChannel {
    link: Mutex<Option<Box<dyn MeshLink>>>,
    connector: Arc<dyn MeshConnector>,
    settings: OutputSettings,
    metrics: Arc<BridgeMetrics>,
}

impl OutputChannel {
    pub fn new(connector: Arc<dyn MeshConnector>, settings: OutputSettings, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            link: Mutex::new(None),
            connector,
            settings,
            metrics,
        }
    }

    /// Sends `text` on `channel`. Returns false without waiting if no link is
    /// up; a failed send drops the link.
    pub async fn send(&self, channel: u32, text: &str) -> bool {
        let mut guard = self.link.lock().await;
        let result = match guard.as_mut() {
            Some(link) => link.send_text(channel, text).await,
            None => {
                debug!("No mesh link, dropping announcement");
                return false;
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, endpoint = %self.connector.endpoint(), "Mesh send failed, dropping link");
                *guard = None;
                false
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.is_some()
    }

    /// Drops the current link, if any, so the reconnect loop replaces it.
    pub async fn invalidate(&self) {
        if self.link.lock().await.take().is_some() {
            warn!("Mesh link invalidated");
        }
    }

    /// Closes the current link in an orderly way. Used at shutdown.
    pub async fn close(&self) {
        let link = self.link.lock().await.take();
        if let Some(mut link) = link {
            link.close().await;
            info!("Mesh link closed");
        }
    }

    /// Makes one connection attempt and installs the link on success.
    ///
    /// The connect runs without holding the link lock.
    pub async fn establish(&self) -> anyhow::Result<()> {
        let link = self.connector.connect().await?;
        if let Some(mut previous) = self.link.lock().await.replace(link) {
            previous.close().await;
        }
        Ok(())
    }

    /// Drops a link the node has closed. Returns true if a link remains.
    async fn check_link(&self) -> bool {
        let mut guard = self.link.lock().await;
        let alive = match guard.as_ref() {
            Some(link) => link.is_alive(),
            None => return false,
        };
        if !alive {
            warn!(endpoint = %self.connector.endpoint(), "Mesh link lost");
            *guard = None;
        }
        alive
    }

    async fn heartbeat(&self) {
        let mut guard = self.link.lock().await;
        let failure = match guard.as_mut() {
            Some(link) => link.heartbeat().await.err(),
            None => None,
        };
        if let Some(e) = failure {
            error!(error = %e, "Mesh heartbeat failed, dropping link");
            *guard = None;
        }
    }

    fn publish_status(&self) {
        if let Some(status) = self.connector.connection_status() {
            self.metrics.record_connection("mesh", &status);
        }
    }

    /// Reconnect loop: keeps a link installed until shutdown.
    pub async fn run_until(&self, shutdown: &CancellationToken) {
        let mut backoff = Backoff::new(self.settings.reconnect.clone());
        let mut last_heartbeat = Instant::now();

        while !shutdown.is_cancelled() {
            if !self.check_link().await {
                let attempt = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = self.establish() => result,
                };

                match attempt {
                    Ok(()) => {
                        info!(endpoint = %self.connector.endpoint(), "Mesh link established");
                        backoff.reset();
                        last_heartbeat = Instant::now();
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        error!(
                            endpoint = %self.connector.endpoint(),
                            error = %e,
                            transient = is_transient(&e),
                            attempt = backoff.attempts(),
                            "Mesh connection failed"
                        );
                        self.publish_status();
                        info!(delay_ms = delay.as_millis() as u64, "Reconnecting to mesh node");
                        self.metrics.record_reconnect("mesh");
                        if !sleep_or_cancel(delay, shutdown).await {
                            break;
                        }
                        continue;
                    }
                }
            } else if last_heartbeat.elapsed() >= self.settings.heartbeat_interval {
                self.heartbeat().await;
                last_heartbeat = Instant::now();
            }
            self.publish_status();

            if !sleep_or_cancel(self.settings.check_interval, shutdown).await {
                break;
            }
        }

        debug!("Output channel loop stopped");
    }
}

#[async_trait]
impl Supervised for OutputChannel {
    fn name(&self) -> &'static str {
        "output"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        self.run_until(&shutdown).await;
    }

    async fn on_fault(&self) {
        self.invalidate().await;
    }
}
