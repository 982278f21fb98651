//! TCP client for the BaseStation (SBS-1) text feed.
//!
//! The feed is newline-delimited ASCII. [`SbsFeedClient::connect`] performs a
//! single attempt; the caller owns the retry loop.

use crate::client::ClientConfig;
use crate::state::{ConnectionState, ConnectionStatus};
use anyhow::{Context, Result};
use bytes::BytesMut;
use skymesh_core::error::ConnectionError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

/// Frame delimiter for the line protocol
const NEWLINE_DELIMITER: u8 = b'\n';

/// Longest accepted line. SBS records are well under 200 bytes.
const MAX_LINE_SIZE: usize = 64 * 1024;

/// Configuration specific to the feed client
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Base client configuration
    pub base: ClientConfig,
    /// Enable TCP keepalive
    pub keepalive: bool,
    /// TCP keepalive idle time
    pub keepalive_interval: Option<Duration>,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            base: ClientConfig::default(),
            keepalive: true,
            keepalive_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl FeedClientConfig {
    /// Builds the client configuration from the `feed` section.
    pub fn from_settings(feed: &skymesh_core::config::FeedConfig) -> Self {
        let mut config = Self::default();
        config.base.server_addr = feed.address();
        config.base.connect_timeout = feed.connect_timeout();
        config.base.read_timeout = feed.read_timeout();
        config
    }
}

/// Connects to the feed endpoint
pub struct SbsFeedClient {
    config: FeedClientConfig,
    status: Arc<ConnectionStatus>,
}

impl SbsFeedClient {
    pub fn new(config: FeedClientConfig) -> Self {
        Self {
            config,
            status: Arc::new(ConnectionStatus::new()),
        }
    }

    /// Shared status, updated by this client and every connection it opens
    pub fn status(&self) -> Arc<ConnectionStatus> {
        Arc::clone(&self.status)
    }

    pub fn endpoint(&self) -> &str {
        &self.config.base.server_addr
    }

    /// Configure TCP socket options
    fn configure_socket(&self, stream: &TcpStream) -> Result<()> {
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        if self.config.keepalive {
            let keepalive = socket2::TcpKeepalive::new();
            let keepalive = match self.config.keepalive_interval {
                Some(interval) => keepalive.with_time(interval),
                None => keepalive,
            };

            socket2::SockRef::from(stream)
                .set_tcp_keepalive(&keepalive)
                .context("Failed to set TCP keepalive")?;
        }

        Ok(())
    }

    /// Makes one connection attempt, bounded by the connect timeout.
    #[instrument(skip(self), fields(addr = %self.config.base.server_addr))]
    pub async fn connect(&self) -> Result<FeedConnection> {
        self.status.set_state(ConnectionState::Connecting);

        let attempt = timeout(
            self.config.base.connect_timeout,
            TcpStream::connect(&self.config.base.server_addr),
        )
        .await;

        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let err = ConnectionError::from_io(&self.config.base.server_addr, &e);
                self.status.metrics().record_failed_attempt();
                self.status.failed(err.to_string());
                return Err(err).context("Failed to connect to feed");
            }
            Err(_) => {
                let err = ConnectionError::timeout("Feed connect", self.config.base.connect_timeout);
                self.status.metrics().record_failed_attempt();
                self.status.failed(err.to_string());
                return Err(err.into());
            }
        };

        self.configure_socket(&stream)?;
        self.status.connected();

        info!("Connected to feed at {}", self.config.base.server_addr);

        Ok(FeedConnection {
            stream,
            address: self.config.base.server_addr.clone(),
            buffer: BytesMut::with_capacity(self.config.base.recv_buffer_size),
            read_timeout: self.config.base.read_timeout,
            status: Arc::clone(&self.status),
        })
    }
}

/// An open feed connection yielding one record line at a time
pub struct FeedConnection {
    stream: TcpStream,
    address: String,
    buffer: BytesMut,
    read_timeout: Duration,
    status: Arc<ConnectionStatus>,
}

impl FeedConnection {
    /// Next line without its terminator (`\n` or `\r\n`).
    ///
    /// Returns `Ok(None)` on a clean close. A read that stays silent past the
    /// read timeout, or a close mid-line, is an error.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == NEWLINE_DELIMITER) {
                let frame = self.buffer.split_to(pos + 1);
                self.status.metrics().record_frame_received(frame.len());

                let mut line = &frame[..pos];
                if line.last() == Some(&b'\r') {
                    line = &line[..line.len() - 1];
                }
                return Ok(Some(String::from_utf8_lossy(line).into_owned()));
            }

            if self.buffer.len() >= MAX_LINE_SIZE {
                return Err(self.fail(ConnectionError::FrameTooLarge {
                    size: self.buffer.len(),
                    limit: MAX_LINE_SIZE,
                })
                .into());
            }

            let read = match timeout(self.read_timeout, self.stream.read_buf(&mut self.buffer)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    let err = ConnectionError::from_io(&self.address, &e);
                    return Err(self.fail(err)).context("Feed read error");
                }
                Err(_) => {
                    self.status.failed("read timeout");
                    return Err(ConnectionError::timeout("Feed read", self.read_timeout).into());
                }
            };

            if read == 0 {
                if self.buffer.is_empty() {
                    debug!("Feed closed by peer");
                    self.status.failed("closed by peer");
                    return Ok(None);
                }
                return Err(self.fail(ConnectionError::closed("feed ended mid-line")).into());
            }
        }
    }

    fn fail(&self, err: ConnectionError) -> ConnectionError {
        self.status.failed(err.to_string());
        err
    }
}
