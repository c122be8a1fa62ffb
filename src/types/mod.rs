//! Core types for tracking data representation.
//!
//! This module provides the data structures filled in by the frame decoder:
//! one snapshot type holding the latest known state of every entity kind,
//! and one plain data type per entity kind.
//!
//! ## Conventions
//!
//! - Ids are 0-based and dense; an entity keeps its id (and list slot)
//!   across frames.
//! - `quality` is a confidence scalar in `0..=1`; the sentinel `-1.0` means
//!   "not currently tracked". Pose fields of an untracked entity are stale
//!   and must not be consumed as valid.
//! - Locations are millimetres; rotation matrices are 3x3 with the body
//!   axes as columns.

mod body;
mod flystick;
mod frame;
mod hand;
mod human;
mod inertial;
mod marker;
mod meatool;
mod mearef;

pub use body::Body;
pub use flystick::Flystick;
pub use frame::FrameSnapshot;
pub use hand::{Finger, Hand, HandSide};
pub use human::{HumanModel, Joint};
pub use inertial::InertialBody;
pub use marker::Marker;
pub use meatool::MeasurementTool;
pub use mearef::MeasurementReference;

/// Location in mm.
pub type Location = [f64; 3];

/// 3x3 rotation matrix.
pub type Rotation = [[f64; 3]; 3];

/// 6x6 pose covariance matrix.
pub type Covariance6 = [[f64; 6]; 6];

/// 3x3 position covariance matrix.
pub type Covariance3 = [[f64; 3]; 3];
