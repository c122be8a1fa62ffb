//! Flystick (interaction device) data.

use super::{Location, Rotation};

/// A Flystick: a tracked interaction device with buttons and joystick axes.
///
/// Button and joystick counts depend on the device generation and on the
/// wire format the controller sends (`6df` fixes them at 8/2, `6df2`
/// declares them per device).
#[derive(Debug, Clone)]
pub struct Flystick {
    /// Id, 0-based.
    pub id: usize,
    /// Tracking confidence in `0..=1`; `-1.0` when not tracked.
    pub quality: f64,
    /// Pressed state per button.
    pub buttons: Vec<bool>,
    /// Joystick deflection per axis, each in `-1..=1`.
    pub joysticks: Vec<f64>,
    /// Location in mm.
    pub loc: Location,
    /// Rotation matrix.
    pub rot: Rotation,
}

impl Flystick {
    pub(crate) fn untracked(id: usize) -> Self {
        Self {
            id,
            quality: -1.0,
            buttons: Vec::new(),
            joysticks: Vec::new(),
            loc: [0.0; 3],
            rot: [[0.0; 3]; 3],
        }
    }

    /// Whether the Flystick body was tracked in the last frame.
    ///
    /// Button and joystick state stays valid while the device is in reach
    /// of its radio link, even when the optical target is occluded.
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub(crate) fn set_untracked(&mut self) {
        self.quality = -1.0;
    }
}
