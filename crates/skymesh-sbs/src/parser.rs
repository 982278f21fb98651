//! Line parser for SBS-1 `MSG` records.

use crate::record::{SbsMessage, TrackUpdate, TransmissionType};
use skymesh_core::types::IcaoAddress;
use thiserror::Error;

/// Record marker for aircraft messages.
const MSG_MARKER: &str = "MSG";

/// Field offsets within a `MSG` record.
const FIELD_TYPE: usize = 1;
const FIELD_ICAO: usize = 4;
const FIELD_CALLSIGN: usize = 10;
const FIELD_ALTITUDE: usize = 11;
const FIELD_LATITUDE: usize = 14;
const FIELD_LONGITUDE: usize = 15;

#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("Record has {0} fields, too few to carry an address")]
    TooFewFields(usize),

    #[error("Invalid transmission type: {0:?}")]
    InvalidTransmissionType(String),

    #[error("Invalid ICAO address: {0:?}")]
    InvalidIcao(String),
}

/// Parses one line of the SBS stream.
///
/// Returns `Ok(None)` for records that are not aircraft messages, and an error
/// for `MSG` records too malformed to attribute to an aircraft.
pub fn parse_line(line: &str) -> Result<Option<SbsMessage>, RecordError> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').map(str::trim).collect();

    if fields.first() != Some(&MSG_MARKER) {
        return Ok(None);
    }
    if fields.len() <= FIELD_ICAO {
        return Err(RecordError::TooFewFields(fields.len()));
    }

    let transmission = fields[FIELD_TYPE]
        .parse::<u8>()
        .ok()
        .and_then(TransmissionType::from_code)
        .ok_or_else(|| RecordError::InvalidTransmissionType(fields[FIELD_TYPE].to_string()))?;

    let icao: IcaoAddress = fields[FIELD_ICAO]
        .parse()
        .map_err(|_| RecordError::InvalidIcao(fields[FIELD_ICAO].to_string()))?;

    let mut update = TrackUpdate::default();

    if transmission.carries_callsign() && fields.len() > FIELD_CALLSIGN {
        let callsign = fields[FIELD_CALLSIGN];
        if !callsign.is_empty() {
            update.callsign = Some(callsign.to_string());
        }
    }

    if transmission.carries_position() && fields.len() > FIELD_LONGITUDE {
        update.altitude_ft = parse_altitude(fields[FIELD_ALTITUDE]);
        update.lat_lon = parse_f64(fields[FIELD_LATITUDE]).zip(parse_f64(fields[FIELD_LONGITUDE]));
    }

    Ok(Some(SbsMessage {
        transmission,
        icao,
        update,
    }))
}

/// Altitude arrives as an integer or decimal string; fractional feet are dropped.
fn parse_altitude(field: &str) -> Option<i64> {
    parse_f64(field).map(|ft| ft.trunc() as i64)
}

fn parse_f64(field: &str) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}
