//! # skymesh-client
//!
//! Network clients for the two endpoints of the bridge:
//!
//! - **Feed**: a TCP line reader for the BaseStation (SBS-1) surveillance stream
//! - **Mesh**: a TCP link to a mesh radio node that sends text on a logical channel
//!
//! Both share the reconnect policy in [`client`] (exponential backoff with a cap
//! and random jitter) and the connection status/metrics in [`state`]. Neither
//! client reconnects on its own: the caller owns the retry loop so that every
//! wait can observe shutdown.
//!
//! ## Example
//!
//! ```rust,no_run
//! use skymesh_client::feed::{FeedClientConfig, SbsFeedClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = FeedClientConfig::default();
//!     config.base.server_addr = "127.0.0.1:30003".to_string();
//!
//!     let client = SbsFeedClient::new(config);
//!     let mut conn = client.connect().await?;
//!     while let Some(line) = conn.next_line().await? {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod feed;
pub mod mesh;
pub mod proto;
pub mod state;

// Re-export commonly used types
pub use client::{calculate_backoff, is_transient, Backoff, ClientConfig, ReconnectConfig};
pub use feed::{FeedClientConfig, FeedConnection, SbsFeedClient};
pub use mesh::{MeshConnector, MeshLink, MeshLinkConfig, TcpMeshConnector};
pub use state::{ConnectionMetrics, ConnectionState, ConnectionStatus, MetricsSnapshot};
