//! Finger-tracking hand data.

use super::{Location, Rotation};

/// Which hand a finger-tracking target is worn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    /// Decode the wire representation (0 = left, anything else = right).
    pub(crate) fn from_code(code: i32) -> Self {
        if code == 0 { HandSide::Left } else { HandSide::Right }
    }
}

/// A tracked hand with per-finger pose and geometry.
#[derive(Debug, Clone)]
pub struct Hand {
    /// Id, 0-based.
    pub id: usize,
    /// Left or right hand.
    pub side: HandSide,
    /// Tracking confidence in `0..=1`; `-1.0` when not tracked.
    pub quality: f64,
    /// Location of the back of the hand in mm.
    pub loc: Location,
    /// Rotation matrix of the back of the hand.
    pub rot: Rotation,
    /// Finger data, ordered thumb first.
    pub fingers: Vec<Finger>,
}

impl Hand {
    pub(crate) fn untracked(id: usize) -> Self {
        Self {
            id,
            side: HandSide::Left,
            quality: -1.0,
            loc: [0.0; 3],
            rot: [[0.0; 3]; 3],
            fingers: Vec::new(),
        }
    }

    /// Whether the hand was tracked in the last frame.
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub(crate) fn set_untracked(&mut self) {
        self.quality = -1.0;
    }
}

/// One finger of a tracked hand.
///
/// The pose refers to the fingertip; phalanx lengths and the angles between
/// consecutive phalanxes describe the finger geometry from the outermost
/// phalanx inwards.
#[derive(Debug, Clone)]
pub struct Finger {
    /// Radius of the fingertip in mm.
    pub tip_radius: f64,
    /// Fingertip location in mm.
    pub loc: Location,
    /// Fingertip rotation matrix.
    pub rot: Rotation,
    /// Length of the outermost, middle and innermost phalanx in mm.
    pub phalanx_lengths: [f64; 3],
    /// Angle between outermost/middle and middle/innermost phalanx in deg.
    pub phalanx_angles: [f64; 2],
}
