//! # skymesh-bridge
//!
//! The stateful core of the bridge: a track store fed by the surveillance
//! pipeline, a two-tier admission controller, the output channel manager that
//! owns the mesh link, and the reaper that evicts silent aircraft.
//!
//! ## Tasks
//!
//! [`Bridge::spawn`] starts three supervised tasks that share one shutdown
//! token:
//!
//! - **output**: keeps the mesh link up, reconnecting with backoff
//! - **feed**: reads the feed, merges records, dispatches announcements
//! - **reaper**: evicts tracks silent for longer than the staleness threshold
//!
//! The track map and the admission window share one lock; the mesh link has
//! its own. Neither is held across network I/O on the other.

pub mod admission;
pub mod bridge;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod reaper;
pub mod shutdown;
pub mod store;
pub mod supervisor;

pub use admission::{AdmissionLimits, RateWindow, Rejection};
pub use bridge::Bridge;
pub use metrics::{install_prometheus, BridgeMetrics};
pub use output::{OutputChannel, OutputSettings};
pub use pipeline::{DispatchSettings, FeedPipeline, LineOutcome};
pub use reaper::Reaper;
pub use shutdown::sleep_or_cancel;
pub use store::{Track, TrackStore};
pub use supervisor::{spawn_supervised, Supervised};
