//! Measurement reference data.

use super::{Location, Rotation};

/// A measurement reference: a tracked base frame for relative measurements.
#[derive(Debug, Clone)]
pub struct MeasurementReference {
    /// Id, 0-based.
    pub id: usize,
    /// Tracking confidence in `0..=1`; `-1.0` when not tracked.
    pub quality: f64,
    /// Location in mm.
    pub loc: Location,
    /// Rotation matrix.
    pub rot: Rotation,
}

impl MeasurementReference {
    pub(crate) fn untracked(id: usize) -> Self {
        Self { id, quality: -1.0, loc: [0.0; 3], rot: [[0.0; 3]; 3] }
    }

    /// Whether the reference was tracked in the last frame.
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub(crate) fn set_untracked(&mut self) {
        self.quality = -1.0;
    }
}
