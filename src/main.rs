use anyhow::{Context, Result};
use clap::Parser;
use skymesh_bridge::{install_prometheus, Bridge};
use skymesh_core::config::{LogFormat, StationConfig};
use skymesh_core::{registry, BridgeConfig};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Addresses printed by `--self-test`
const SELF_TEST_ADDRESSES: [&str; 6] = ["A00001", "738000", "400001", "4CA123", "C01234", "7C0001"];

/// Skymesh - relays ADS-B aircraft sightings from an SBS feed to a mesh radio channel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "SKYMESH_CONFIG")]
    config: Option<PathBuf>,

    /// SBS feed host
    #[arg(long, env = "DUMP1090_HOST")]
    feed_host: Option<String>,

    /// SBS feed port
    #[arg(long, env = "DUMP1090_PORT")]
    feed_port: Option<u16>,

    /// Mesh node host
    #[arg(long, env = "MESHTASTIC_TCP_HOST")]
    mesh_host: Option<String>,

    /// Mesh node TCP API port
    #[arg(long)]
    mesh_port: Option<u16>,

    /// Channel index announcements are sent on
    #[arg(long, env = "MESHTASTIC_CHANNEL_INDEX")]
    channel_index: Option<u32>,

    /// Minimum seconds between announcements of one aircraft
    #[arg(long, env = "AIRCRAFT_PERIOD")]
    aircraft_period: Option<f64>,

    /// Maximum announcements per minute across all aircraft
    #[arg(long, env = "GLOBAL_RATE_PER_MIN")]
    global_rate_per_min: Option<u32>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Station latitude, enables the distance annotation
    #[arg(long, env = "STATION_LAT", requires = "station_lon", allow_hyphen_values = true)]
    station_lat: Option<f64>,

    /// Station longitude
    #[arg(long, env = "STATION_LON", requires = "station_lat", allow_hyphen_values = true)]
    station_lon: Option<f64>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_listen: Option<String>,

    /// Print country lookups for sample addresses and exit
    #[arg(long)]
    self_test: bool,
}

impl Args {
    /// Applies command-line (and legacy environment) overrides on top of the loaded file.
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.feed_host {
            config.feed.host = host.clone();
        }
        if let Some(port) = self.feed_port {
            config.feed.port = port;
        }
        if let Some(host) = &self.mesh_host {
            config.mesh.host = host.clone();
        }
        if let Some(port) = self.mesh_port {
            config.mesh.port = port;
        }
        if let Some(channel) = self.channel_index {
            config.mesh.channel_index = channel;
        }
        if let Some(period) = self.aircraft_period {
            config.limits.per_aircraft_period_secs = period;
        }
        if let Some(rate) = self.global_rate_per_min {
            config.limits.global_rate_per_min = rate;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let (Some(lat), Some(lon)) = (self.station_lat, self.station_lon) {
            config.station = Some(StationConfig { lat, lon });
        }
        if let Some(listen) = &self.metrics_listen {
            config.metrics.enabled = true;
            config.metrics.listen = listen.clone();
        }
    }
}

fn self_test() {
    for addr in SELF_TEST_ADDRESSES {
        let registration = registry::lookup(addr);
        println!(
            "{} -> {} ({})",
            addr,
            registration.country.unwrap_or("unknown"),
            registration.code.unwrap_or("--")
        );
    }
}

fn init_logging(config: &BridgeConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn log_banner(config: &BridgeConfig) {
    info!("Starting Skymesh v{}", env!("CARGO_PKG_VERSION"));
    info!(endpoint = %config.feed.address(), "SBS feed");
    info!(endpoint = %config.mesh.address(), channel = config.mesh.channel_index, "Mesh node");
    info!(
        per_aircraft_secs = config.limits.per_aircraft_period_secs,
        global_per_min = config.limits.global_rate_per_min,
        "Announcement limits"
    );
    match config.station_position() {
        Some(station) => info!(%station, "Station position set, distances enabled"),
        None => info!("No station position, distances disabled"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.self_test {
        self_test();
        return Ok(());
    }

    let mut config = BridgeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config);
    log_banner(&config);

    if config.metrics.enabled {
        install_prometheus(&config.metrics.listen).context("Failed to start metrics exporter")?;
    }

    let bridge = Bridge::new(&config);
    let shutdown = CancellationToken::new();
    let tasks = bridge.spawn(&shutdown);

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal, stopping bridge...");

    shutdown.cancel();
    tokio::time::sleep(config.shutdown_grace()).await;
    bridge.close().await;
    for task in tasks {
        task.abort();
    }

    info!("Shutdown complete");
    Ok(())
}
