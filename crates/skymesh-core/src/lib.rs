//! # Skymesh Core
//!
//! Core types, error handling, and configuration for the Skymesh ADS-B to mesh bridge.
//!
//! This crate provides the foundational building blocks shared by the other crates:
//!
//! - **Types**: `IcaoAddress` (24-bit transponder identifier) and `Position`.
//! - **Errors**: error types using `thiserror` for connection, parse and configuration
//!   failures.
//! - **Configuration**: `BridgeConfig`, loaded from YAML with environment overrides
//!   and validated once at startup.
//! - **Registry**: the ICAO 24-bit address allocation table (address → country).
//! - **Format**: rendering of the short announcement text sent over the mesh.
//!
//! ## Example
//!
//! ```
//! use skymesh_core::registry;
//! use skymesh_core::types::IcaoAddress;
//!
//! let addr: IcaoAddress = "A00001".parse().unwrap();
//! let reg = registry::lookup(&addr.to_string());
//! assert_eq!(reg.country, Some("United States"));
//! assert_eq!(reg.code, Some("US"));
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod registry;
pub mod types;

// Re-export commonly used types for convenience
pub use config::BridgeConfig;
pub use error::{Result, SkymeshError};
pub use types::{IcaoAddress, Position};
