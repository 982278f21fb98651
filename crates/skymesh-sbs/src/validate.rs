//! Field acceptance rules applied when merging an update into a track.

use skymesh_core::types::Position;

/// Shortest accepted callsign.
pub const MIN_CALLSIGN_LEN: usize = 2;
/// Longest accepted callsign (the ADS-B identification field is 8 characters).
pub const MAX_CALLSIGN_LEN: usize = 8;

/// Trims and upper-cases a callsign, rejecting lengths outside 2-8.
pub fn normalize_callsign(raw: &str) -> Option<String> {
    let callsign = raw.trim().to_ascii_uppercase();
    let len = callsign.chars().count();
    (MIN_CALLSIGN_LEN..=MAX_CALLSIGN_LEN)
        .contains(&len)
        .then_some(callsign)
}

/// Accepts altitudes at or above `min_ft`; lower reports are ground clutter.
pub fn plausible_altitude(feet: i64, min_ft: u32) -> Option<u32> {
    if feet < i64::from(min_ft) {
        return None;
    }
    u32::try_from(feet).ok()
}

/// Accepts a coordinate pair inside [-90,90]×[-180,180].
pub fn valid_position(lat: f64, lon: f64) -> Option<Position> {
    Position::new(lat, lon)
}
