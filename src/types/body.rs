//! Standard body data.

use super::{Covariance6, Location, Rotation};

/// A calibrated standard body (rigid 6DOF target).
#[derive(Debug, Clone)]
pub struct Body {
    /// Id, 0-based.
    pub id: usize,
    /// Tracking confidence in `0..=1`; `-1.0` when not tracked.
    pub quality: f64,
    /// Location in mm.
    pub loc: Location,
    /// Rotation matrix.
    pub rot: Rotation,
    /// 6x6 pose covariance (location and orientation).
    pub cov: Covariance6,
    /// Reference point of the covariance, in mm.
    pub cov_ref: Location,
}

impl Body {
    /// New body in the "not tracked" state.
    pub(crate) fn untracked(id: usize) -> Self {
        Self {
            id,
            quality: -1.0,
            loc: [0.0; 3],
            rot: [[0.0; 3]; 3],
            cov: [[0.0; 6]; 6],
            cov_ref: [0.0; 3],
        }
    }

    /// Whether the body was tracked in the last frame.
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub(crate) fn set_untracked(&mut self) {
        self.quality = -1.0;
    }
}
