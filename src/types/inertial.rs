//! Hybrid (optical-inertial) body data.

use super::{Location, Rotation};

/// A hybrid body tracked by a combination of optical and inertial sensors.
#[derive(Debug, Clone)]
pub struct InertialBody {
    /// Id, 0-based.
    pub id: usize,
    /// Drift state: 0 = not tracked, 1 = inertial only (drifting),
    /// 2 = optically supported.
    pub state: i32,
    /// Drift error estimate in degrees.
    pub error: f64,
    /// Location in mm.
    pub loc: Location,
    /// Rotation matrix.
    pub rot: Rotation,
}

impl InertialBody {
    pub(crate) fn untracked(id: usize) -> Self {
        Self { id, state: 0, error: 0.0, loc: [0.0; 3], rot: [[0.0; 3]; 3] }
    }

    /// Whether the body was tracked (inertially or optically) last frame.
    pub fn is_tracked(&self) -> bool {
        self.state != 0
    }
}
