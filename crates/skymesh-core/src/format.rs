//! Announcement text rendering.
//!
//! Produces the compact single-line text sent over the mesh, e.g.
//! `✈️ ELY32A • 36,000 ft • 32.12345,34.56789 • 🇮🇱 Israel • 18.4 km`.
//! Pure and infallible: degenerate input renders degraded text, never an error.

use crate::registry::Registration;
use crate::types::Position;

const SEPARATOR: &str = "•";
const AIRCRAFT: &str = "✈️";

/// Renders an announcement for one aircraft.
///
/// `distance_from` is the optional station reference position; when present
/// the great-circle distance to the aircraft is appended.
pub fn announcement(
    ident: &str,
    altitude_ft: u32,
    position: Position,
    registration: Registration,
    distance_from: Option<Position>,
) -> String {
    let mut parts: Vec<String> = vec![
        AIRCRAFT.to_string(),
        ident.trim().to_string(),
        SEPARATOR.to_string(),
        human_altitude(altitude_ft),
        SEPARATOR.to_string(),
        position.to_string(),
    ];

    if let Some(country) = registration.country {
        let flag = registration.code.and_then(flag_emoji).unwrap_or_default();
        parts.push(SEPARATOR.to_string());
        parts.push(format!("{} {}", flag, country).trim().to_string());
    }

    if let Some(station) = distance_from {
        let km = station.distance_km(&position);
        if km.is_finite() {
            parts.push(SEPARATOR.to_string());
            parts.push(format!("{:.1} km", km));
        }
    }

    parts.join(" ")
}

/// Formats feet with thousands separators: `36000` → `36,000 ft`.
pub fn human_altitude(feet: u32) -> String {
    let digits = feet.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{} ft", grouped)
}

/// Regional-indicator flag for an ISO alpha-2 code, `None` for anything else.
pub fn flag_emoji(code: &str) -> Option<String> {
    const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;

    let mut chars = code.chars();
    let (a, b) = (chars.next()?, chars.next()?);
    if chars.next().is_some() || !a.is_ascii_alphabetic() || !b.is_ascii_alphabetic() {
        return None;
    }

    [a, b]
        .iter()
        .map(|c| char::from_u32(REGIONAL_INDICATOR_A + (c.to_ascii_uppercase() as u32 - 'A' as u32)))
        .collect()
}
