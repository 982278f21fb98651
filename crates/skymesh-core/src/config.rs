//! Configuration management for the Skymesh bridge.
//!
//! This module provides the configuration system that supports:
//! - Loading from YAML files
//! - Environment variable overrides (`SKYMESH__SECTION__KEY`)
//! - Validation of all settings
//!
//! Configuration is read once at startup and is immutable for the process
//! lifetime.

use crate::error::{ConfigError, Result};
use crate::types::Position;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Upper bound for every period given in fractional seconds (one day)
pub const MAX_PERIOD_SECS: f64 = 86_400.0;

/// Converts fractional seconds to a `Duration`, saturating instead of panicking.
///
/// Negative and NaN inputs map to zero.
pub fn duration_from_secs(secs: f64) -> Duration {
    if !(secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Main application configuration.
///
/// # Examples
///
/// ```
/// use skymesh_core::config::BridgeConfig;
///
/// let config = BridgeConfig::from_yaml("limits:\n  global_rate_per_min: 10\n").unwrap();
/// assert_eq!(config.limits.global_rate_per_min, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Surveillance (SBS) source endpoint
    #[serde(default)]
    pub feed: FeedConfig,

    /// Mesh node endpoint
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Dispatch rate limits
    #[serde(default)]
    pub limits: RateLimitConfig,

    /// Track lifecycle settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Reconnect backoff policy shared by both endpoints
    #[serde(default)]
    pub reconnect: ReconnectSettings,

    /// Optional station reference position for distance annotation
    #[serde(default)]
    pub station: Option<StationConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Grace period between the shutdown signal and closing the output
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            mesh: MeshConfig::default(),
            limits: RateLimitConfig::default(),
            tracking: TrackingConfig::default(),
            reconnect: ReconnectSettings::default(),
            station: None,
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl BridgeConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate: an optional YAML file
    /// overlaid with `SKYMESH__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::file_not_found(path.display().to_string()).into());
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let source = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<environment>".to_string());

        let config = builder
            .add_source(
                config::Environment::with_prefix("SKYMESH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: source,
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.feed.validate()?;
        self.mesh.validate()?;
        self.limits.validate()?;
        self.tracking.validate()?;
        self.reconnect.validate()?;

        if let Some(ref station) = self.station {
            if station.position().is_none() {
                return Err(ConfigError::invalid_value(
                    "station",
                    format!("({}, {}) is outside valid coordinates", station.lat, station.lon),
                )
                .into());
            }
        }

        self.logging.parse_level()?;

        Ok(())
    }

    /// Station reference position, if configured and valid.
    pub fn station_position(&self) -> Option<Position> {
        self.station.as_ref().and_then(StationConfig::position)
    }

    /// Grace period applied on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn validate_endpoint(section: &str, host: &str, port: u16) -> Result<()> {
    if host.trim().is_empty() {
        return Err(ConfigError::invalid_value(format!("{}.host", section), "Host cannot be empty").into());
    }
    if port == 0 {
        return Err(ConfigError::invalid_value(format!("{}.port", section), "Port cannot be 0").into());
    }
    Ok(())
}

/// Surveillance source (dump1090 BaseStation output) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_feed_port")]
    pub port: u16,

    /// TCP connect timeout in seconds
    #[serde(default = "default_feed_timeout")]
    pub connect_timeout_secs: u64,

    /// A feed silent for this long is treated as a dead connection
    #[serde(default = "default_feed_timeout")]
    pub read_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_feed_port() -> u16 {
    30003
}

fn default_feed_timeout() -> u64 {
    15
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_feed_port(),
            connect_timeout_secs: default_feed_timeout(),
            read_timeout_secs: default_feed_timeout(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        validate_endpoint("feed", &self.host, self.port)
    }

    /// Returns the `host:port` address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Mesh node (TCP API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_mesh_port")]
    pub port: u16,

    /// Logical channel index announcements are sent on
    #[serde(default)]
    pub channel_index: u32,

    /// Idle period of the output reconnect loop
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default = "default_mesh_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_mesh_timeout")]
    pub write_timeout_secs: u64,

    /// Interval between keep-alive heartbeats on an idle link
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Mesh hop limit stamped on outgoing packets
    #[serde(default = "default_hop_limit")]
    pub hop_limit: u32,
}

fn default_mesh_port() -> u16 {
    4403
}

fn default_check_interval() -> u64 {
    5
}

fn default_mesh_timeout() -> u64 {
    10
}

fn default_heartbeat_interval() -> u64 {
    300
}

fn default_hop_limit() -> u32 {
    3
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_mesh_port(),
            channel_index: 0,
            check_interval_secs: default_check_interval(),
            connect_timeout_secs: default_mesh_timeout(),
            write_timeout_secs: default_mesh_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            hop_limit: default_hop_limit(),
        }
    }
}

impl MeshConfig {
    pub fn validate(&self) -> Result<()> {
        validate_endpoint("mesh", &self.host, self.port)?;
        if self.check_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "mesh.check_interval_secs",
                "Check interval must be at least 1s",
            )
            .into());
        }
        if self.hop_limit > 7 {
            return Err(ConfigError::invalid_value("mesh.hop_limit", "Hop limit must be 0-7").into());
        }
        Ok(())
    }

    /// Returns the `host:port` address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Two-tier dispatch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum seconds between two announcements of the same aircraft
    #[serde(default = "default_per_aircraft_period")]
    pub per_aircraft_period_secs: f64,

    /// Maximum announcements per 60-second window across all aircraft
    #[serde(default = "default_global_rate")]
    pub global_rate_per_min: u32,
}

fn default_per_aircraft_period() -> f64 {
    30.0
}

fn default_global_rate() -> u32 {
    30
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_aircraft_period_secs: default_per_aircraft_period(),
            global_rate_per_min: default_global_rate(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.per_aircraft_period_secs.is_finite() || self.per_aircraft_period_secs <= 0.0 {
            return Err(ConfigError::invalid_value(
                "limits.per_aircraft_period_secs",
                "Cooldown must be a positive number of seconds",
            )
            .into());
        }
        if self.per_aircraft_period_secs > MAX_PERIOD_SECS {
            return Err(ConfigError::invalid_value(
                "limits.per_aircraft_period_secs",
                format!("Cooldown must not exceed {}s", MAX_PERIOD_SECS),
            )
            .into());
        }
        if self.global_rate_per_min == 0 {
            return Err(ConfigError::invalid_value(
                "limits.global_rate_per_min",
                "Global rate must be at least 1 per minute",
            )
            .into());
        }
        Ok(())
    }

    /// Per-aircraft cooldown.
    pub fn per_aircraft_period(&self) -> Duration {
        duration_from_secs(self.per_aircraft_period_secs)
    }
}

/// Track lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Tracks silent for longer than this are evicted
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Period of the eviction sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Altitude reports below this are treated as noise
    #[serde(default = "default_min_altitude")]
    pub min_altitude_ft: u32,
}

fn default_stale_after() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_min_altitude() -> u32 {
    100
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
            sweep_interval_secs: default_sweep_interval(),
            min_altitude_ft: default_min_altitude(),
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stale_after_secs == 0 {
            return Err(ConfigError::invalid_value("tracking.stale_after_secs", "Must be at least 1s").into());
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid_value("tracking.sweep_interval_secs", "Must be at least 1s").into());
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Exponential backoff with jitter, applied independently per endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: f64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: f64,

    /// Upper bound of the uniform random delay added to every wait
    #[serde(default = "default_max_jitter")]
    pub max_jitter_secs: f64,
}

fn default_initial_backoff() -> f64 {
    2.0
}

fn default_multiplier() -> f64 {
    1.7
}

fn default_max_backoff() -> f64 {
    30.0
}

fn default_max_jitter() -> f64 {
    1.5
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_backoff_secs: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_secs: default_max_backoff(),
            max_jitter_secs: default_max_jitter(),
        }
    }
}

impl ReconnectSettings {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.initial_backoff_secs,
            self.multiplier,
            self.max_backoff_secs,
            self.max_jitter_secs,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0);
        if !finite {
            return Err(ConfigError::invalid_value("reconnect", "Values must be finite and non-negative").into());
        }
        if self.max_backoff_secs > MAX_PERIOD_SECS || self.max_jitter_secs > MAX_PERIOD_SECS {
            return Err(ConfigError::invalid_value(
                "reconnect",
                format!("Backoff and jitter must not exceed {}s", MAX_PERIOD_SECS),
            )
            .into());
        }
        if self.initial_backoff_secs <= 0.0 {
            return Err(ConfigError::invalid_value(
                "reconnect.initial_backoff_secs",
                "Initial backoff must be positive",
            )
            .into());
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::invalid_value("reconnect.multiplier", "Multiplier must be >= 1").into());
        }
        if self.max_backoff_secs < self.initial_backoff_secs {
            return Err(ConfigError::invalid_value(
                "reconnect.max_backoff_secs",
                "Maximum backoff must not be below the initial backoff",
            )
            .into());
        }
        Ok(())
    }
}

/// Station reference position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StationConfig {
    pub lat: f64,
    pub lon: f64,
}

impl StationConfig {
    pub fn position(&self) -> Option<Position> {
        Position::new(self.lat, self.lon)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is started
    #[serde(default)]
    pub enabled: bool,

    /// Exporter listen address
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

fn default_metrics_listen() -> String {
    "127.0.0.1:9464".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}
