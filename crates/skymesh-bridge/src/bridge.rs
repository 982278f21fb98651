use crate::metrics::BridgeMetrics;
use crate::output::{OutputChannel, OutputSettings};
use crate::pipeline::{DispatchSettings, FeedPipeline};
use crate::reaper::Reaper;
use crate::store::TrackStore;
use crate::supervisor::{spawn_supervised, DEFAULT_RESTART_DELAY};
use skymesh_client::{
    FeedClientConfig, MeshConnector, MeshLinkConfig, ReconnectConfig, SbsFeedClient, TcpMeshConnector,
};
use skymesh_core::BridgeConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// All bridge components, wired from one configuration
pub struct Bridge {
    store: Arc<TrackStore>,
    output: Arc<OutputChannel>,
    pipeline: Arc<FeedPipeline>,
    reaper: Arc<Reaper>,
    metrics: Arc<BridgeMetrics>,
    restart_delay: Duration,
}

impl Bridge {
    /// Builds the bridge with TCP clients for both endpoints.
    pub fn new(config: &BridgeConfig) -> Self {
        let connector: Arc<dyn MeshConnector> =
            Arc::new(TcpMeshConnector::new(MeshLinkConfig::from_settings(&config.mesh)));
        Self::with_connector(config, connector)
    }

    /// Builds the bridge around a custom mesh connector.
    pub fn with_connector(config: &BridgeConfig, connector: Arc<dyn MeshConnector>) -> Self {
        let metrics = Arc::new(BridgeMetrics::new());
        let store = Arc::new(TrackStore::new(config.tracking.min_altitude_ft, Instant::now()));
        let output = Arc::new(OutputChannel::new(
            connector,
            OutputSettings::from_config(config),
            Arc::clone(&metrics),
        ));
        let pipeline = Arc::new(FeedPipeline::new(
            SbsFeedClient::new(FeedClientConfig::from_settings(&config.feed)),
            Arc::clone(&store),
            Arc::clone(&output),
            DispatchSettings::from_config(config),
            ReconnectConfig::from(&config.reconnect),
            Arc::clone(&metrics),
        ));
        let reaper = Arc::new(Reaper::new(
            Arc::clone(&store),
            config.tracking.sweep_interval(),
            config.tracking.stale_after(),
            Arc::clone(&metrics),
        ));

        Self {
            store,
            output,
            pipeline,
            reaper,
            metrics,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }

    /// Starts the output manager, the feed pipeline and the reaper under supervision.
    pub fn spawn(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        info!("Starting bridge tasks");
        vec![
            spawn_supervised(
                Arc::clone(&self.output),
                shutdown.clone(),
                self.restart_delay,
                Arc::clone(&self.metrics),
            ),
            spawn_supervised(
                Arc::clone(&self.pipeline),
                shutdown.clone(),
                self.restart_delay,
                Arc::clone(&self.metrics),
            ),
            spawn_supervised(
                Arc::clone(&self.reaper),
                shutdown.clone(),
                self.restart_delay,
                Arc::clone(&self.metrics),
            ),
        ]
    }

    /// Closes the mesh link if one is up. Call after the tasks have been cancelled.
    pub async fn close(&self) {
        self.output.close().await;
    }

    pub fn store(&self) -> Arc<TrackStore> {
        Arc::clone(&self.store)
    }

    pub fn output(&self) -> Arc<OutputChannel> {
        Arc::clone(&self.output)
    }

    pub fn pipeline(&self) -> Arc<FeedPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.metrics)
    }
}
