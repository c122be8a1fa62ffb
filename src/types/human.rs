//! Human model (body-tracking) data.

use super::{Location, Rotation};

/// One joint of a tracked human model.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Joint id as reported by the controller.
    pub id: i32,
    /// Tracking confidence in `0..=1`; `-1.0` when not tracked.
    pub quality: f64,
    /// Location in mm.
    pub loc: Location,
    /// Rotation matrix.
    pub rot: Rotation,
}

/// A tracked human model made up of joints.
///
/// A model with no joints was not tracked in the last frame.
#[derive(Debug, Clone)]
pub struct HumanModel {
    /// Id, 0-based.
    pub id: usize,
    /// Joints of the model; empty when not tracked.
    pub joints: Vec<Joint>,
}

impl HumanModel {
    pub(crate) fn untracked(id: usize) -> Self {
        Self { id, joints: Vec::new() }
    }

    /// Whether the model was tracked in the last frame.
    pub fn is_tracked(&self) -> bool {
        !self.joints.is_empty()
    }

    pub(crate) fn set_untracked(&mut self) {
        self.joints.clear();
    }
}
