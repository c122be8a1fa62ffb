//! Single marker data.

use super::Location;

/// A single (uncalibrated) marker.
///
/// Markers are reported as an unordered list per frame; the id is assigned
/// by the controller and is typically 1-based. Unlike the calibrated entity
/// kinds, the marker list index carries no meaning across frames.
#[derive(Debug, Clone)]
pub struct Marker {
    /// Marker id as reported by the controller.
    pub id: i32,
    /// Tracking confidence in `0..=1`.
    pub quality: f64,
    /// Location in mm.
    pub loc: Location,
}
