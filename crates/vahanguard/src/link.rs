//! Emergency-access deep links.
//!
//! A vehicle's QR code encodes `<origin>/emergency-access/<vehicle id>`. The
//! format is the only contract shared across devices and must not change.

/// Path segment that introduces the vehicle id.
pub const EMERGENCY_ACCESS_PATH: &str = "/emergency-access/";

/// Build the deep link for a vehicle.
///
/// A trailing slash on `origin` is not doubled.
#[must_use]
pub fn deep_link(origin: &str, vehicle_id: &str) -> String {
    format!(
        "{}{EMERGENCY_ACCESS_PATH}{vehicle_id}",
        origin.trim_end_matches('/')
    )
}

/// Extract the vehicle id from a deep link.
///
/// Returns `None` if the link has no emergency-access segment or the id is empty.
#[must_use]
pub fn vehicle_id_from_link(link: &str) -> Option<&str> {
    let start = link.rfind(EMERGENCY_ACCESS_PATH)? + EMERGENCY_ACCESS_PATH.len();
    let rest = &link[start..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}
