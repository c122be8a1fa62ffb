//! Frame snapshot: the latest known state of every entity kind.

use super::{
    Body, Flystick, Hand, HumanModel, InertialBody, Marker, MeasurementReference, MeasurementTool,
};

/// Snapshot of the most recently decoded tracking frame.
///
/// Entity lists persist across frames at stable ids: an entity that was not
/// reported this frame keeps its slot and is marked not tracked instead of
/// being removed. The authoritative length of the body and hand lists is
/// set once per completed frame by the decoder's reconciliation step, from
/// the calibration counts the controller sends.
///
/// The snapshot has exactly one writer: the session that owns it. Entities
/// are read through the id accessors or by iterating the list fields.
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    /// Frame counter. Non-authoritative ordering: may repeat or jump.
    pub frame_counter: u32,
    /// Timestamp in seconds since midnight UTC; `-1.0` if not available.
    pub timestamp: f64,
    /// Standard bodies, id-indexed.
    pub bodies: Vec<Body>,
    /// Flysticks, id-indexed.
    pub flysticks: Vec<Flystick>,
    /// Measurement tools, id-indexed.
    pub tools: Vec<MeasurementTool>,
    /// Measurement references, id-indexed.
    pub references: Vec<MeasurementReference>,
    /// Finger-tracking hands, id-indexed.
    pub hands: Vec<Hand>,
    /// Human models, id-indexed.
    pub humans: Vec<HumanModel>,
    /// Hybrid bodies, id-indexed.
    pub inertials: Vec<InertialBody>,
    /// Single markers of the last frame; unordered, not id-indexed.
    pub markers: Vec<Marker>,
}

impl FrameSnapshot {
    pub fn new() -> Self {
        Self { timestamp: -1.0, ..Self::default() }
    }

    /// Standard body by id.
    pub fn body(&self, id: usize) -> Option<&Body> {
        self.bodies.get(id)
    }

    /// Flystick by id.
    pub fn flystick(&self, id: usize) -> Option<&Flystick> {
        self.flysticks.get(id)
    }

    /// Measurement tool by id.
    pub fn tool(&self, id: usize) -> Option<&MeasurementTool> {
        self.tools.get(id)
    }

    /// Measurement reference by id.
    pub fn reference(&self, id: usize) -> Option<&MeasurementReference> {
        self.references.get(id)
    }

    /// Hand by id.
    pub fn hand(&self, id: usize) -> Option<&Hand> {
        self.hands.get(id)
    }

    /// Human model by id.
    pub fn human(&self, id: usize) -> Option<&HumanModel> {
        self.humans.get(id)
    }

    /// Hybrid body by id.
    pub fn inertial(&self, id: usize) -> Option<&InertialBody> {
        self.inertials.get(id)
    }

    /// Single marker by list index (not by marker id).
    pub fn marker(&self, index: usize) -> Option<&Marker> {
        self.markers.get(index)
    }
}
