//! Feed ingestion pipeline.
//!
//! Keeps a connection to the surveillance feed, merges every record into the
//! track store and dispatches announcements for tracks that clear admission.
//! Store locks are released before any network I/O.

use crate::admission::AdmissionLimits;
use crate::metrics::BridgeMetrics;
use crate::output::OutputChannel;
use crate::shutdown::sleep_or_cancel;
use crate::store::{Track, TrackStore};
use crate::supervisor::Supervised;
use anyhow::Result;
use async_trait::async_trait;
use skymesh_client::{is_transient, Backoff, FeedConnection, ReconnectConfig, SbsFeedClient};
use skymesh_core::types::Position;
use skymesh_core::{format, registry, BridgeConfig};
use skymesh_sbs::parse_line;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Dispatch parameters taken from the configuration at startup
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub channel_index: u32,
    pub limits: AdmissionLimits,
    /// Reference point for the distance annotation
    pub station: Option<Position>,
}

impl DispatchSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            channel_index: config.mesh.channel_index,
            limits: AdmissionLimits::from(&config.limits),
            station: config.station_position(),
        }
    }
}

/// What happened to one feed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Not an aircraft message
    Ignored,
    /// An aircraft message too malformed to attribute
    Malformed,
    /// Merged; no announcement attempted
    Merged,
    /// Merged, but admission refused the announcement
    Rejected,
    /// Announcement admitted and handed to the output channel
    Dispatched { delivered: bool },
}

/// How a streaming session ended
enum SessionEnd {
    Shutdown,
    Closed,
}

pub struct FeedPipeline {
    client: SbsFeedClient,
    store: Arc<TrackStore>,
    output: Arc<OutputChannel>,
    settings: DispatchSettings,
    reconnect: ReconnectConfig,
    metrics: Arc<BridgeMetrics>,
}

impl FeedPipeline {
    pub fn new(
        client: SbsFeedClient,
        store: Arc<TrackStore>,
        output: Arc<OutputChannel>,
        settings: DispatchSettings,
        reconnect: ReconnectConfig,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            client,
            store,
            output,
            settings,
            reconnect,
            metrics,
        }
    }

    /// Connect, stream, back off, repeat, until shutdown.
    pub async fn run_until(&self, shutdown: &CancellationToken) {
        let mut backoff = Backoff::new(self.reconnect.clone());

        while !shutdown.is_cancelled() {
            let attempt = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.client.connect() => result,
            };

            match attempt {
                Ok(mut conn) => {
                    backoff.reset();
                    self.publish_status();
                    let end = self.stream(&mut conn, shutdown).await;
                    self.publish_status();
                    match end {
                        Ok(SessionEnd::Shutdown) => break,
                        Ok(SessionEnd::Closed) => warn!(endpoint = %self.client.endpoint(), "Feed closed by peer"),
                        Err(e) => error!(
                            endpoint = %self.client.endpoint(),
                            error = %e,
                            transient = is_transient(&e),
                            "Feed connection lost"
                        ),
                    }
                }
                Err(e) => {
                    self.publish_status();
                    error!(
                        endpoint = %self.client.endpoint(),
                        error = %e,
                        transient = is_transient(&e),
                        failed_attempts = self.client.status().metrics().failed_attempts(),
                        "Feed connection failed"
                    );
                }
            }

            let delay = backoff.next_delay();
            info!(delay_ms = delay.as_millis() as u64, "Reconnecting to feed");
            self.metrics.record_reconnect("feed");
            if !sleep_or_cancel(delay, shutdown).await {
                break;
            }
        }

        debug!("Feed pipeline stopped");
    }

    async fn stream(&self, conn: &mut FeedConnection, shutdown: &CancellationToken) -> Result<SessionEnd> {
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
                line = conn.next_line() => line?,
            };

            match line {
                Some(line) => {
                    self.handle_line(&line, Instant::now()).await;
                }
                None => return Ok(SessionEnd::Closed),
            }
        }
    }

    /// Parses one feed line, merges it and dispatches if warranted.
    pub async fn handle_line(&self, line: &str, now: Instant) -> LineOutcome {
        self.metrics.record_line();

        let message = match parse_line(line) {
            Ok(Some(message)) => message,
            Ok(None) => return LineOutcome::Ignored,
            Err(e) => {
                debug!(error = %e, "Skipping malformed record");
                self.metrics.record_malformed();
                return LineOutcome::Malformed;
            }
        };

        let (_, announce) = self.store.upsert(message.icao, &message.update, now);
        if !announce {
            return LineOutcome::Merged;
        }

        let reservation = match self.store.reserve(message.icao, now, &self.settings.limits) {
            Ok(reservation) => reservation,
            Err(reason) => {
                trace!(icao = %message.icao, %reason, "Announcement not admitted");
                self.metrics.record_rejected(reason);
                return LineOutcome::Rejected;
            }
        };
        self.metrics.record_admitted();

        let delivered = self.dispatch(reservation.track()).await;
        reservation.complete(delivered);
        LineOutcome::Dispatched { delivered }
    }

    fn publish_status(&self) {
        self.metrics.record_connection("feed", &self.client.status());
    }

    /// Formats and sends the announcement for an admitted track.
    async fn dispatch(&self, track: &Track) -> bool {
        let (Some(position), Some(altitude_ft)) = (track.position, track.altitude_ft) else {
            return false;
        };

        let registration = registry::lookup_address(track.icao);
        let text = format::announcement(
            &track.display_ident(),
            altitude_ft,
            position,
            registration,
            self.settings.station,
        );

        let started = Instant::now();
        let delivered = self.output.send(self.settings.channel_index, &text).await;
        self.metrics.record_send(delivered, started.elapsed());

        if delivered {
            info!(icao = %track.icao, channel = self.settings.channel_index, "Sent: {}", text);
        } else {
            error!(icao = %track.icao, "Announcement not delivered");
        }
        delivered
    }
}

#[async_trait]
impl Supervised for FeedPipeline {
    fn name(&self) -> &'static str {
        "feed"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        self.run_until(&shutdown).await;
    }
}
