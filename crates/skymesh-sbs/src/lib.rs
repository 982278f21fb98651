//! Parser for BaseStation (SBS-1) records as emitted by dump1090 and compatible
//! decoders.
//!
//! The stream is newline-delimited, comma-separated text. Only `MSG` records
//! carry aircraft data; every other record kind (`SEL`, `ID`, `AIR`, `STA`,
//! `CLK`) is ignored.
//!
//! Parsing is deliberately lenient at the field level: a numeric field that
//! fails to parse is dropped on its own while the rest of the record is kept.
//! Only structural problems (too few fields, bad message type, bad address)
//! reject a whole record.
//!
//! # Example
//!
//! ```rust
//! use skymesh_sbs::parse_line;
//!
//! let line = "MSG,3,1,1,A00001,1,2024/01/15,10:30:00.000,2024/01/15,10:30:00.000,,36000,,,32.12345,34.56789,,,0,0,0,0";
//! let msg = parse_line(line).unwrap().expect("MSG record");
//! assert_eq!(msg.icao.to_string(), "A00001");
//! assert_eq!(msg.update.altitude_ft, Some(36000));
//! assert_eq!(msg.update.lat_lon, Some((32.12345, 34.56789)));
//! ```

pub mod parser;
pub mod record;
pub mod validate;

pub use parser::{parse_line, RecordError};
pub use record::{SbsMessage, TrackUpdate, TransmissionType};
pub use validate::{normalize_callsign, plausible_altitude, valid_position};
