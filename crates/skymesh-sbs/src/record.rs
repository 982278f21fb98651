//! Record types produced by the parser.

use skymesh_core::types::IcaoAddress;
use std::fmt;

/// SBS transmission (message) type, field 1 of a `MSG` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransmissionType {
    /// ES identification and category (callsign)
    Identification,
    /// ES surface position
    SurfacePosition,
    /// ES airborne position
    AirbornePosition,
    /// ES airborne velocity
    AirborneVelocity,
    /// Surveillance altitude reply
    SurveillanceAltitude,
    /// Surveillance identity (squawk) reply
    SurveillanceId,
    /// Air-to-air message
    AirToAir,
    /// All-call reply
    AllCallReply,
}

impl TransmissionType {
    /// Maps the numeric SBS code (1-8).
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Identification,
            2 => Self::SurfacePosition,
            3 => Self::AirbornePosition,
            4 => Self::AirborneVelocity,
            5 => Self::SurveillanceAltitude,
            6 => Self::SurveillanceId,
            7 => Self::AirToAir,
            8 => Self::AllCallReply,
            _ => return None,
        })
    }

    /// Numeric SBS code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Identification => 1,
            Self::SurfacePosition => 2,
            Self::AirbornePosition => 3,
            Self::AirborneVelocity => 4,
            Self::SurveillanceAltitude => 5,
            Self::SurveillanceId => 6,
            Self::AirToAir => 7,
            Self::AllCallReply => 8,
        }
    }

    /// Types whose callsign field is consulted (1-4).
    pub fn carries_callsign(&self) -> bool {
        self.code() <= 4
    }

    /// Types whose altitude and position fields are consulted (2-3).
    pub fn carries_position(&self) -> bool {
        matches!(self, Self::SurfacePosition | Self::AirbornePosition)
    }
}

impl fmt::Display for TransmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSG,{}", self.code())
    }
}

/// A partial update for one aircraft.
///
/// Values are as received; range checks are applied when the update is merged
/// into a track. Absent fields leave the track untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackUpdate {
    /// Trimmed callsign text
    pub callsign: Option<String>,
    /// Barometric altitude in feet, truncated toward zero
    pub altitude_ft: Option<i64>,
    /// Raw latitude/longitude pair
    pub lat_lon: Option<(f64, f64)>,
}

impl TrackUpdate {
    /// True when no field is present (the record only refreshes liveness).
    pub fn is_empty(&self) -> bool {
        self.callsign.is_none() && self.altitude_ft.is_none() && self.lat_lon.is_none()
    }
}

/// One parsed `MSG` record.
#[derive(Debug, Clone, PartialEq)]
pub struct SbsMessage {
    pub transmission: TransmissionType,
    pub icao: IcaoAddress,
    pub update: TrackUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmission_codes_round_trip() {
        for code in 1..=8u8 {
            let t = TransmissionType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(TransmissionType::from_code(0).is_none());
        assert!(TransmissionType::from_code(9).is_none());
    }

    #[test]
    fn test_field_groups() {
        assert!(TransmissionType::Identification.carries_callsign());
        assert!(TransmissionType::AirborneVelocity.carries_callsign());
        assert!(!TransmissionType::SurveillanceAltitude.carries_callsign());

        assert!(TransmissionType::AirbornePosition.carries_position());
        assert!(TransmissionType::SurfacePosition.carries_position());
        assert!(!TransmissionType::Identification.carries_position());
        assert!(!TransmissionType::SurveillanceAltitude.carries_position());
    }

    #[test]
    fn test_empty_update() {
        assert!(TrackUpdate::default().is_empty());
        let update = TrackUpdate {
            altitude_ft: Some(1200),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
