//! Link to a mesh radio node over its TCP API.
//!
//! [`MeshConnector`] opens links; [`MeshLink`] is one open link. The output
//! side of the bridge only depends on these traits, so tests can substitute
//! an in-memory node.

use crate::client::ClientConfig;
use crate::codec::{MeshFrameCodec, HEADER_LEN, WAKE_SEQUENCE};
use crate::proto::{from_radio, FromRadio, ToRadio};
use crate::state::{ConnectionState, ConnectionStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use prost::Message;
use skymesh_core::error::ConnectionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, trace, warn};

/// Pause after the wake sequence before the first frame
const WAKE_SETTLE: Duration = Duration::from_millis(100);

/// One open link to a mesh node
#[async_trait]
pub trait MeshLink: Send {
    /// Broadcasts `text` on the given channel index.
    async fn send_text(&mut self, channel: u32, text: &str) -> Result<()>;

    /// Sends a keep-alive so the node does not drop an idle client.
    async fn heartbeat(&mut self) -> Result<()>;

    /// False once the node has closed the link or a read has failed.
    fn is_alive(&self) -> bool;

    /// Best-effort orderly close. Never fails.
    async fn close(&mut self);
}

/// Opens links to a mesh node
#[async_trait]
pub trait MeshConnector: Send + Sync {
    /// Makes one connection attempt.
    async fn connect(&self) -> Result<Box<dyn MeshLink>>;

    /// Human-readable endpoint for logs
    fn endpoint(&self) -> String;

    /// Connection state and traffic counters, for connectors that track them
    fn connection_status(&self) -> Option<Arc<ConnectionStatus>> {
        None
    }
}

/// Configuration for the TCP mesh link
#[derive(Debug, Clone)]
pub struct MeshLinkConfig {
    /// Base client configuration
    pub base: ClientConfig,
    /// Hop limit stamped on outgoing packets
    pub hop_limit: u32,
    /// Enable TCP keepalive
    pub keepalive: bool,
}

impl Default for MeshLinkConfig {
    fn default() -> Self {
        Self {
            base: ClientConfig::default(),
            hop_limit: 3,
            keepalive: true,
        }
    }
}

impl MeshLinkConfig {
    /// Builds the link configuration from the `mesh` section.
    pub fn from_settings(mesh: &skymesh_core::config::MeshConfig) -> Self {
        let mut config = Self::default();
        config.base.server_addr = mesh.address();
        config.base.connect_timeout = mesh.connect_timeout();
        config.base.write_timeout = mesh.write_timeout();
        config.hop_limit = mesh.hop_limit;
        config
    }
}

/// Connects to a node's TCP API (port 4403 by default)
pub struct TcpMeshConnector {
    config: MeshLinkConfig,
    status: Arc<ConnectionStatus>,
}

impl TcpMeshConnector {
    pub fn new(config: MeshLinkConfig) -> Self {
        Self {
            config,
            status: Arc::new(ConnectionStatus::new()),
        }
    }

    pub fn status(&self) -> Arc<ConnectionStatus> {
        Arc::clone(&self.status)
    }

    fn configure_socket(&self, stream: &TcpStream) -> Result<()> {
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;
        if self.config.keepalive {
            socket2::SockRef::from(stream)
                .set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(Duration::from_secs(30)))
                .context("Failed to set TCP keepalive")?;
        }
        Ok(())
    }

    async fn open(&self) -> Result<TcpMeshLink> {
        let addr = &self.config.base.server_addr;
        let stream = timeout(self.config.base.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::timeout("Mesh connect", self.config.base.connect_timeout))?
            .map_err(|e| ConnectionError::from_io(addr, &e))
            .with_context(|| format!("Failed to connect to mesh node at {}", addr))?;
        self.configure_socket(&stream)?;

        let (read_half, write_half) = stream.into_split();
        let mut writer = FramedWrite::new(write_half, MeshFrameCodec);

        let want_config = Bytes::from(ToRadio::want_config(rand::random::<u32>()).encode_to_vec());
        let handshake_size = WAKE_SEQUENCE.len() + HEADER_LEN + want_config.len();
        let handshake = async {
            writer.get_mut().write_all(&WAKE_SEQUENCE).await?;
            tokio::time::sleep(WAKE_SETTLE).await;
            writer.send(want_config).await
        };
        timeout(self.config.base.write_timeout, handshake)
            .await
            .map_err(|_| ConnectionError::timeout("Mesh handshake", self.config.base.write_timeout))?
            .map_err(|e| ConnectionError::from_io(addr, &e))
            .context("Mesh handshake failed")?;
        self.status.metrics().record_frame_sent(handshake_size);

        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(drain_incoming(
            read_half,
            Arc::clone(&alive),
            Arc::clone(&self.status),
        ));

        Ok(TcpMeshLink {
            address: addr.clone(),
            writer,
            reader,
            alive,
            write_timeout: self.config.base.write_timeout,
            hop_limit: self.config.hop_limit,
            next_packet_id: rand::random::<u32>() | 1,
            status: Arc::clone(&self.status),
        })
    }
}

#[async_trait]
impl MeshConnector for TcpMeshConnector {
    #[instrument(skip(self), fields(addr = %self.config.base.server_addr))]
    async fn connect(&self) -> Result<Box<dyn MeshLink>> {
        self.status.set_state(ConnectionState::Connecting);
        match self.open().await {
            Ok(link) => {
                self.status.connected();
                info!("Connected to mesh node at {}", self.config.base.server_addr);
                Ok(Box::new(link))
            }
            Err(e) => {
                self.status.metrics().record_failed_attempt();
                self.status.failed(e.to_string());
                Err(e)
            }
        }
    }

    fn endpoint(&self) -> String {
        self.config.base.server_addr.clone()
    }

    fn connection_status(&self) -> Option<Arc<ConnectionStatus>> {
        Some(self.status())
    }
}

/// Reads and discards everything the node sends, so its transmit buffer never
/// fills. Marks the link dead when the stream ends.
async fn drain_incoming(read_half: OwnedReadHalf, alive: Arc<AtomicBool>, status: Arc<ConnectionStatus>) {
    let mut frames = FramedRead::new(read_half, MeshFrameCodec);

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(payload) => {
                status.metrics().record_frame_received(payload.len() + HEADER_LEN);
                match FromRadio::decode(payload) {
                    Ok(msg) => match msg.payload_variant {
                        Some(from_radio::PayloadVariant::ConfigCompleteId(id)) => {
                            debug!(config_id = id, "Mesh node configuration received");
                        }
                        Some(from_radio::PayloadVariant::Rebooted(_)) => {
                            warn!("Mesh node reported a reboot");
                        }
                        _ => trace!(id = msg.id, "Ignoring mesh frame"),
                    },
                    Err(e) => trace!(error = %e, "Undecodable mesh frame"),
                }
            }
            Err(e) => {
                let err = ConnectionError::from_io("mesh node", &e);
                warn!(error = %err, transient = err.is_transient(), "Mesh link read failed");
                break;
            }
        }
    }

    alive.store(false, Ordering::Release);
    status.failed("link closed by node");
    debug!("Mesh link reader finished");
}

/// An open TCP link to a mesh node
pub struct TcpMeshLink {
    address: String,
    writer: FramedWrite<OwnedWriteHalf, MeshFrameCodec>,
    reader: JoinHandle<()>,
    alive: Arc<AtomicBool>,
    write_timeout: Duration,
    hop_limit: u32,
    next_packet_id: u32,
    status: Arc<ConnectionStatus>,
}

impl TcpMeshLink {
    fn packet_id(&mut self) -> u32 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);
        id
    }

    async fn write(&mut self, msg: ToRadio) -> Result<()> {
        if !self.is_alive() {
            return Err(ConnectionError::closed("mesh link is closed").into());
        }

        let payload = Bytes::from(msg.encode_to_vec());
        let size = payload.len() + HEADER_LEN;

        match timeout(self.write_timeout, self.writer.send(payload)).await {
            Ok(Ok(())) => {
                self.status.metrics().record_frame_sent(size);
                Ok(())
            }
            Ok(Err(e)) => {
                let err = ConnectionError::from_io(&self.address, &e);
                self.alive.store(false, Ordering::Release);
                self.status.failed(err.to_string());
                Err(err).context("Mesh write failed")
            }
            Err(_) => {
                self.alive.store(false, Ordering::Release);
                self.status.failed("write timeout");
                Err(ConnectionError::timeout("Mesh write", self.write_timeout).into())
            }
        }
    }
}

#[async_trait]
impl MeshLink for TcpMeshLink {
    async fn send_text(&mut self, channel: u32, text: &str) -> Result<()> {
        let id = self.packet_id();
        self.write(ToRadio::channel_text(channel, text, self.hop_limit, id))
            .await
    }

    async fn heartbeat(&mut self) -> Result<()> {
        self.write(ToRadio::heartbeat(rand::random())).await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.reader.is_finished()
    }

    async fn close(&mut self) {
        if self.is_alive() {
            let _ = self.write(ToRadio::disconnect()).await;
        }
        let _ = timeout(self.write_timeout, self.writer.close()).await;
        self.reader.abort();
        self.alive.store(false, Ordering::Release);
        self.status.set_state(ConnectionState::Disconnected);
        self.status.metrics().mark_disconnected();
    }
}

impl Drop for TcpMeshLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
