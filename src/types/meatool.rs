//! Measurement tool data.

use super::{Covariance3, Location, Rotation};

/// A measurement tool: a tracked probe with a calibrated tip.
#[derive(Debug, Clone)]
pub struct MeasurementTool {
    /// Id, 0-based.
    pub id: usize,
    /// Tracking confidence in `0..=1`; `-1.0` when not tracked.
    pub quality: f64,
    /// Radius of the probe tip in mm, if available (0 otherwise).
    pub tip_radius: f64,
    /// Pressed state per button.
    pub buttons: Vec<bool>,
    /// Location of the tip in mm.
    pub loc: Location,
    /// Rotation matrix.
    pub rot: Rotation,
    /// 3x3 covariance of the tip location.
    pub cov: Covariance3,
}

impl MeasurementTool {
    pub(crate) fn untracked(id: usize) -> Self {
        Self {
            id,
            quality: -1.0,
            tip_radius: 0.0,
            buttons: Vec::new(),
            loc: [0.0; 3],
            rot: [[0.0; 3]; 3],
            cov: [[0.0; 3]; 3],
        }
    }

    /// Whether the tool was tracked in the last frame.
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub(crate) fn set_untracked(&mut self) {
        self.quality = -1.0;
    }
}
