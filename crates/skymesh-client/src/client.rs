use rand::Rng;
use skymesh_core::config::{duration_from_secs, ReconnectSettings};
use skymesh_core::error::ConnectionError;
use std::time::Duration;

/// Reconnect policy shared by the feed and mesh loops
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on the delay, before jitter
    pub max_backoff: Duration,
    /// Growth factor applied after each failed attempt
    pub backoff_multiplier: f64,
    /// Uniform random jitter added to every delay, in [0, max_jitter)
    pub max_jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 1.7,
            max_jitter: Duration::from_millis(1500),
        }
    }
}

impl From<&ReconnectSettings> for ReconnectConfig {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            initial_backoff: duration_from_secs(settings.initial_backoff_secs),
            max_backoff: duration_from_secs(settings.max_backoff_secs),
            backoff_multiplier: settings.multiplier,
            max_jitter: duration_from_secs(settings.max_jitter_secs),
        }
    }
}

/// Endpoint and timeouts for a TCP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote address as `host:port`
    pub server_addr: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read timeout
    pub read_timeout: Duration,
    /// Write timeout
    pub write_timeout: Duration,
    /// Initial capacity of the receive buffer
    pub recv_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(10),
            recv_buffer_size: 8192,
        }
    }
}

/// Exponential backoff for the given zero-based attempt, capped at `max_backoff`.
///
/// Jitter is not included; see [`Backoff::next_delay`].
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let backoff_secs = config.initial_backoff.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    let capped_secs = backoff_secs.min(config.max_backoff.as_secs_f64());
    duration_from_secs(capped_secs)
}

/// Whether a connect or stream error is worth retrying as is.
///
/// Looks for a [`ConnectionError`] anywhere in the chain; errors without one
/// (socket option failures and the like) count as transient.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ConnectionError>())
        .map_or(true, ConnectionError::is_transient)
}

/// Backoff state for one reconnect loop.
///
/// Each loop owns its own instance; a failure on one endpoint never delays the
/// other. The state persists across successful connections until [`reset`]
/// is called.
///
/// [`reset`]: Backoff::reset
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next attempt, then advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = calculate_backoff(self.attempt, &self.config);
        self.attempt = self.attempt.saturating_add(1);
        base.saturating_add(self.jitter())
    }

    /// Delay the next call to [`next_delay`](Self::next_delay) will start from, without jitter.
    pub fn current(&self) -> Duration {
        calculate_backoff(self.attempt, &self.config)
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Returns the schedule to the initial delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn jitter(&self) -> Duration {
        let max = self.config.max_jitter.as_secs_f64();
        if max <= 0.0 {
            return Duration::ZERO;
        }
        duration_from_secs(rand::thread_rng().gen_range(0.0..max))
    }
}
