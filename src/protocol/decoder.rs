//! Label-dispatch decoder turning one datagram into a frame snapshot.
//!
//! Each recognized line label has a dedicated decoder that reads a declared
//! count followed by that many fixed-shape blocks, then updates the snapshot
//! in place. Unrecognized labels are skipped with a diagnostic and count as
//! successfully consumed; future controller firmware adds labels and the
//! decoder must keep working.
//!
//! Two protocol generations coexist on the wire. The legacy Flystick and
//! measurement-tool lines (`6df`, `6dmt`) infer a fixed button layout from
//! one packed integer and feed the end-of-frame reconciliation through a
//! hidden legacy count; the newer lines (`6df2`, `6dmt2`) declare explicit
//! button/joystick counts and pack buttons across as many 32-bit words as
//! needed.

use tracing::warn;

use super::scanner::{Block, ScanError, Scanner};
use crate::error::{Result, TrackError};
use crate::types::{
    Body, Finger, Flystick, FrameSnapshot, Hand, HandSide, HumanModel, InertialBody, Joint,
    Location, Marker, MeasurementReference, MeasurementTool, Rotation,
};

const D3: &str = "ddd";
const D6: &str = "dddddd";
const D9: &str = "ddddddddd";
const D21: &str = "ddddddddddddddddddddd";

/// Expand an upper-triangular reduced covariance vector of length
/// `D*(D+1)/2` into the full symmetric matrix.
///
/// The controller's packing is row-wise over the upper triangle with the
/// diagonal interleaved: for row `i`, with `k = i*(i-1)/2`, the diagonal
/// element sits at `i*D - k` and element `(i, j)` at `i*(D-1) - k + j`.
fn expand_covariance<const D: usize>(reduced: &[f64]) -> [[f64; D]; D] {
    let mut full = [[0.0; D]; D];
    for i in 0..D {
        let k = (i * i - i) / 2;
        full[i][i] = reduced[i * D - k];
        for j in (i + 1)..D {
            let v = reduced[i * (D - 1) - k + j];
            full[i][j] = v;
            full[j][i] = v;
        }
    }
    full
}

/// Rotation arrives as 9 doubles in column-major order.
fn rotation_from_wire(r9: &[f64]) -> Rotation {
    let mut rot = [[0.0; 3]; 3];
    for (i, row) in rot.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = r9[i + j * 3];
        }
    }
    rot
}

fn location_from_wire(d3: &[f64]) -> Location {
    [d3[0], d3[1], d3[2]]
}

/// Unpack `count` button states from 32-bit groups, LSB-first.
fn unpack_buttons(words: &[i64], count: usize) -> Vec<bool> {
    let mut buttons = Vec::with_capacity(count);
    for index in 0..count {
        let word = words[index / 32] as u64;
        buttons.push((word >> (index % 32)) & 0x01 != 0);
    }
    buttons
}

/// Resize an entity list to the declared count, truncating extra ids or
/// appending newly-untracked entities as needed.
fn resize_entities<T>(list: &mut Vec<T>, count: usize, untracked: impl Fn(usize) -> T) {
    if count < list.len() {
        list.truncate(count);
    } else {
        while list.len() < count {
            list.push(untracked(list.len()));
        }
    }
}

/// Grow an entity list so that `id` is a valid slot.
fn grow_to_fit<T>(list: &mut Vec<T>, id: usize, untracked: impl Fn(usize) -> T) {
    while list.len() <= id {
        list.push(untracked(list.len()));
    }
}

/// Stateful decoder: owns the snapshot plus the per-packet reconciliation
/// hints that the legacy calibration-count lines set.
#[derive(Debug, Default)]
pub(crate) struct FrameDecoder {
    snapshot: FrameSnapshot,

    /// Calibrated standard-body count (includes legacy Flysticks/tools).
    cal_bodies: Option<i64>,
    /// Calibrated hand count.
    cal_hands: Option<i64>,
    /// Flystick count seen in a legacy `6df` line this packet.
    legacy_flysticks: i64,
    /// Tool count seen in a legacy `6dmt` line this packet.
    legacy_tools: i64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { snapshot: FrameSnapshot::new(), ..Self::default() }
    }

    pub fn snapshot(&self) -> &FrameSnapshot {
        &self.snapshot
    }

    /// Decode one datagram into the snapshot.
    ///
    /// Runs decode-start, dispatches every line, and finalizes with the
    /// reconciliation step. A failing line aborts the remainder of the
    /// packet; lines processed before the failure (and any partial mutation
    /// of the failing line) remain applied, and entities from the previous
    /// completed frame persist since decoding mutates in place.
    pub fn decode_packet(&mut self, text: &str) -> Result<()> {
        self.begin_frame();

        let mut scan = Scanner::new(text);
        loop {
            self.decode_line(&mut scan)?;
            if !scan.next_line() {
                break;
            }
        }

        self.end_frame();
        Ok(())
    }

    /// Reset per-packet state. Entity lists are kept; they carry the
    /// previous frame's entities at stable ids.
    fn begin_frame(&mut self) {
        self.snapshot.frame_counter = 0;
        self.snapshot.timestamp = -1.0;
        self.cal_bodies = None;
        self.cal_hands = None;
        self.legacy_flysticks = 0;
        self.legacy_tools = 0;
    }

    /// End-of-frame reconciliation: the only place the body and hand list
    /// lengths change outside their own data lines.
    ///
    /// The calibrated body count the controller sends includes devices that
    /// legacy Flystick/tool lines report separately, so those are deducted.
    fn end_frame(&mut self) {
        if let Some(cal) = self.cal_bodies {
            let n = (cal - self.legacy_flysticks - self.legacy_tools).max(0) as usize;
            if n != self.snapshot.bodies.len() {
                resize_entities(&mut self.snapshot.bodies, n, Body::untracked);
            }
        }

        if let Some(cal) = self.cal_hands {
            let n = cal.max(0) as usize;
            if n != self.snapshot.hands.len() {
                resize_entities(&mut self.snapshot.hands, n, Hand::untracked);
            }
        }
    }

    fn decode_line(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        let label = scan
            .next_word()
            .map_err(|e| TrackError::parse("packet", format!("no label: {e}")))?;

        match label {
            "fr" => self.decode_fr(scan),
            "ts" => self.decode_ts(scan),
            "6d" => self.decode_6d(scan),
            "6dcal" => self.decode_6dcal(scan),
            "6dcov" => self.decode_6dcov(scan),
            "6df" => self.decode_6df(scan),
            "6df2" => self.decode_6df2(scan),
            "6dmt" => self.decode_6dmt(scan),
            "6dmt2" => self.decode_6dmt2(scan),
            "6dmtr" => self.decode_6dmtr(scan),
            "glcal" => self.decode_glcal(scan),
            "gl" => self.decode_gl(scan),
            "6dj" => self.decode_6dj(scan),
            "6di" => self.decode_6di(scan),
            "3d" => self.decode_3d(scan),
            _ => {
                warn!(label, "skipped unsupported label");
                Ok(())
            }
        }
    }

    fn decode_fr(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        let value = next_count("fr", scan)?;
        self.snapshot.frame_counter = value.min(u32::MAX as i64) as u32;
        Ok(())
    }

    fn decode_ts(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        self.snapshot.timestamp =
            scan.next_double().map_err(|e| line_error("ts", e))?;
        Ok(())
    }

    /// `6d`: standard bodies reported tracked this frame.
    fn decode_6d(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6d";

        for body in &mut self.snapshot.bodies {
            body.set_untracked();
        }

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "id")?;
            let id = unbounded_id(LABEL, head.int(0))?;
            grow_to_fit(&mut self.snapshot.bodies, id, Body::untracked);

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let slot = &mut self.snapshot.bodies[id];
            slot.quality = head.float(0);
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
            // Covariance belongs to the accompanying `6dcov` line; a fresh
            // pose invalidates the previous one.
            slot.cov = [[0.0; 6]; 6];
            slot.cov_ref = [0.0; 3];
        }

        Ok(())
    }

    fn decode_6dcal(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        self.cal_bodies = Some(next_count("6dcal", scan)?);
        Ok(())
    }

    /// `6dcov`: pose covariance for standard bodies. Tracking state is
    /// owned by `6d`; this line only fills covariance fields.
    fn decode_6dcov(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6dcov";

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "iddd")?;
            let id = unbounded_id(LABEL, head.int(0))?;
            grow_to_fit(&mut self.snapshot.bodies, id, Body::untracked);

            let reduced = block(LABEL, scan, D21)?;

            let slot = &mut self.snapshot.bodies[id];
            slot.cov = expand_covariance::<6>(reduced.floats());
            slot.cov_ref = location_from_wire(head.floats());
        }

        Ok(())
    }

    /// `6df`: legacy Flystick line with a fixed 8-button/2-axis layout
    /// packed into a single integer. Also records the legacy count used by
    /// reconciliation.
    fn decode_6df(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6df";

        let declared = next_count(LABEL, scan)?;
        self.legacy_flysticks = declared;
        resize_entities(&mut self.snapshot.flysticks, declared as usize, Flystick::untracked);

        for _ in 0..declared {
            let head = block(LABEL, scan, "idi")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;
            let packed = [head.int(1)];

            let buttons = unpack_buttons(&packed, 8);
            // The legacy hat switch doubles as the joystick: buttons 5/7
            // deflect x, buttons 4/6 deflect y.
            let joy_x = if buttons[5] {
                -1.0
            } else if buttons[7] {
                1.0
            } else {
                0.0
            };
            let joy_y = if buttons[4] {
                -1.0
            } else if buttons[6] {
                1.0
            } else {
                0.0
            };

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let slot = &mut self.snapshot.flysticks[id];
            slot.quality = head.float(0);
            slot.buttons = buttons;
            slot.joysticks = vec![joy_x, joy_y];
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
        }

        Ok(())
    }

    /// `6df2`: Flystick line with explicit button/joystick counts.
    fn decode_6df2(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6df2";

        let declared = next_count(LABEL, scan)?;
        resize_entities(&mut self.snapshot.flysticks, declared as usize, Flystick::untracked);
        for flystick in &mut self.snapshot.flysticks {
            flystick.set_untracked();
        }

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "idii")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;
            let num_buttons = next_len(LABEL, head.int(1))?;
            let num_joysticks = next_len(LABEL, head.int(2))?;

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let data = block(LABEL, scan, &packed_format(num_buttons, num_joysticks))?;

            let slot = &mut self.snapshot.flysticks[id];
            slot.quality = head.float(0);
            slot.buttons = unpack_buttons(data.ints(), num_buttons);
            slot.joysticks = data.floats().to_vec();
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
        }

        Ok(())
    }

    /// `6dmt`: legacy measurement-tool line with 4 fixed buttons. Records
    /// the legacy count used by reconciliation.
    fn decode_6dmt(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6dmt";

        let declared = next_count(LABEL, scan)?;
        self.legacy_tools = declared;
        resize_entities(&mut self.snapshot.tools, declared as usize, MeasurementTool::untracked);

        for _ in 0..declared {
            let head = block(LABEL, scan, "idi")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;
            let packed = [head.int(1)];

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let slot = &mut self.snapshot.tools[id];
            slot.quality = head.float(0);
            slot.tip_radius = 0.0;
            slot.buttons = unpack_buttons(&packed, 4);
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
            slot.cov = [[0.0; 3]; 3];
        }

        Ok(())
    }

    /// `6dmt2`: measurement-tool line with explicit button count, tip
    /// radius and position covariance.
    fn decode_6dmt2(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6dmt2";

        let declared = next_count(LABEL, scan)?;
        resize_entities(&mut self.snapshot.tools, declared as usize, MeasurementTool::untracked);
        for tool in &mut self.snapshot.tools {
            tool.set_untracked();
        }

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "idid")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;
            let num_buttons = next_len(LABEL, head.int(1))?;

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;
            let packed = block(LABEL, scan, &packed_format(num_buttons, 0))?;
            let reduced = block(LABEL, scan, D6)?;

            let slot = &mut self.snapshot.tools[id];
            slot.quality = head.float(0);
            slot.tip_radius = head.float(1);
            slot.buttons = unpack_buttons(packed.ints(), num_buttons);
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
            slot.cov = expand_covariance::<3>(reduced.floats());
        }

        Ok(())
    }

    /// `6dmtr`: measurement references.
    fn decode_6dmtr(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6dmtr";

        let declared = next_count(LABEL, scan)?;
        resize_entities(
            &mut self.snapshot.references,
            declared as usize,
            MeasurementReference::untracked,
        );
        for reference in &mut self.snapshot.references {
            reference.set_untracked();
        }

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "id")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let slot = &mut self.snapshot.references[id];
            slot.quality = head.float(0);
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
        }

        Ok(())
    }

    fn decode_glcal(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        self.cal_hands = Some(next_count("glcal", scan)?);
        Ok(())
    }

    /// `gl`: finger-tracking hands with per-finger pose and geometry.
    fn decode_gl(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "gl";

        for hand in &mut self.snapshot.hands {
            hand.set_untracked();
        }

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "idii")?;
            let id = unbounded_id(LABEL, head.int(0))?;
            let side = HandSide::from_code(head.int(1) as i32);
            let num_fingers = next_len(LABEL, head.int(2))?;
            grow_to_fit(&mut self.snapshot.hands, id, Hand::untracked);

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let mut fingers = Vec::with_capacity(num_fingers);
            for _ in 0..num_fingers {
                fingers.push(Self::decode_finger(scan)?);
            }

            let slot = &mut self.snapshot.hands[id];
            slot.side = side;
            slot.quality = head.float(0);
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
            slot.fingers = fingers;
        }

        Ok(())
    }

    fn decode_finger(scan: &mut Scanner<'_>) -> Result<Finger> {
        const LABEL: &str = "gl";

        let loc = block(LABEL, scan, D3)?;
        let rot = block(LABEL, scan, D9)?;

        // Geometry block interleaves tip radius, phalanx lengths and the
        // angles between consecutive phalanxes.
        let geometry = block(LABEL, scan, D6)?;

        Ok(Finger {
            tip_radius: geometry.float(0),
            loc: location_from_wire(loc.floats()),
            rot: rotation_from_wire(rot.floats()),
            phalanx_lengths: [geometry.float(1), geometry.float(3), geometry.float(5)],
            phalanx_angles: [geometry.float(2), geometry.float(4)],
        })
    }

    /// `6dj`: human models with joint lists.
    fn decode_6dj(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6dj";

        let declared = next_count(LABEL, scan)?;
        resize_entities(&mut self.snapshot.humans, declared as usize, HumanModel::untracked);
        for human in &mut self.snapshot.humans {
            human.set_untracked();
        }

        let reported = next_count(LABEL, scan)?;
        for _ in 0..reported {
            let head = block(LABEL, scan, "ii")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;
            let num_joints = next_len(LABEL, head.int(1))?;

            let mut joints = Vec::with_capacity(num_joints);
            for _ in 0..num_joints {
                let joint_head = block(LABEL, scan, "id")?;
                let loc = block(LABEL, scan, D3)?;
                let rot = block(LABEL, scan, D9)?;
                joints.push(Joint {
                    id: joint_head.int(0) as i32,
                    quality: joint_head.float(0),
                    loc: location_from_wire(loc.floats()),
                    rot: rotation_from_wire(rot.floats()),
                });
            }

            self.snapshot.humans[id].joints = joints;
        }

        Ok(())
    }

    /// `6di`: hybrid (optical-inertial) bodies.
    fn decode_6di(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "6di";

        let declared = next_count(LABEL, scan)?;
        resize_entities(&mut self.snapshot.inertials, declared as usize, InertialBody::untracked);

        for _ in 0..declared {
            let head = block(LABEL, scan, "iid")?;
            let id = bounded_id(LABEL, head.int(0), declared)?;

            let loc = block(LABEL, scan, D3)?;
            let rot = block(LABEL, scan, D9)?;

            let slot = &mut self.snapshot.inertials[id];
            slot.state = head.int(1) as i32;
            slot.error = head.float(0);
            slot.loc = location_from_wire(loc.floats());
            slot.rot = rotation_from_wire(rot.floats());
        }

        Ok(())
    }

    /// `3d`: single markers. The list is rebuilt by index every frame; the
    /// marker id carries no positional meaning.
    fn decode_3d(&mut self, scan: &mut Scanner<'_>) -> Result<()> {
        const LABEL: &str = "3d";

        let reported = next_count(LABEL, scan)?;
        let reported = reported as usize;
        if reported < self.snapshot.markers.len() {
            self.snapshot.markers.truncate(reported);
        }

        for index in 0..reported {
            let head = block(LABEL, scan, "id")?;
            let loc = block(LABEL, scan, D3)?;

            let marker = Marker {
                id: head.int(0) as i32,
                quality: head.float(0),
                loc: location_from_wire(loc.floats()),
            };

            if index < self.snapshot.markers.len() {
                self.snapshot.markers[index] = marker;
            } else {
                self.snapshot.markers.push(marker);
            }
        }

        Ok(())
    }
}

/// Format string for a packed button/joystick block: one `i` per 32-bit
/// button group, one `d` per joystick axis.
fn packed_format(num_buttons: usize, num_joysticks: usize) -> String {
    let mut format = String::new();
    format.extend(std::iter::repeat_n('i', num_buttons.div_ceil(32)));
    format.extend(std::iter::repeat_n('d', num_joysticks));
    format
}

fn line_error(label: &str, err: ScanError) -> TrackError {
    warn!(label, %err, "line decode failed");
    TrackError::parse(label, err.to_string())
}

fn block(label: &str, scan: &mut Scanner<'_>, format: &str) -> Result<Block> {
    scan.parse_block(format).map_err(|e| line_error(label, e))
}

/// Declared count at the start of a line; negative counts are invalid input.
fn next_count(label: &str, scan: &mut Scanner<'_>) -> Result<i64> {
    let value = scan.next_int().map_err(|e| line_error(label, e))?;
    if value < 0 {
        warn!(label, value, "negative count");
        return Err(TrackError::parse(label, format!("negative count {value}")));
    }
    Ok(value)
}

/// Per-entry length field (button/joystick/finger/joint count).
fn next_len(label: &str, value: i64) -> Result<usize> {
    if value < 0 {
        warn!(label, value, "negative length field");
        return Err(TrackError::parse(label, format!("negative length {value}")));
    }
    Ok(value as usize)
}

/// Id that must satisfy `0 <= id < declared`.
fn bounded_id(label: &str, id: i64, declared: i64) -> Result<usize> {
    if id < 0 || id >= declared {
        warn!(label, id, declared, "id out of declared range");
        return Err(TrackError::parse(label, format!("id {id} outside 0..{declared}")));
    }
    Ok(id as usize)
}

/// Id with no declared bound; only non-negativity is required.
fn unbounded_id(label: &str, id: i64) -> Result<usize> {
    if id < 0 {
        warn!(label, id, "negative id");
        return Err(TrackError::parse(label, format!("negative id {id}")));
    }
    Ok(id as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode(decoder: &mut FrameDecoder, packet: &str) {
        decoder.decode_packet(packet).expect("packet should decode");
    }

    #[test]
    fn frame_counter_and_timestamp() {
        let mut decoder = FrameDecoder::new();
        decode(&mut decoder, "fr 42\nts 1.5");
        assert_eq!(decoder.snapshot().frame_counter, 42);
        assert_eq!(decoder.snapshot().timestamp, 1.5);
    }

    #[test]
    fn timestamp_resets_between_packets() {
        let mut decoder = FrameDecoder::new();
        decode(&mut decoder, "fr 1\nts 1.5");
        decode(&mut decoder, "fr 2");
        assert_eq!(decoder.snapshot().timestamp, -1.0);
    }

    #[test]
    fn unknown_label_is_skipped() {
        let mut decoder = FrameDecoder::new();
        decode(&mut decoder, "fr 1\nxx [1]\nts 1.5");
        assert_eq!(decoder.snapshot().frame_counter, 1);
        assert_eq!(decoder.snapshot().timestamp, 1.5);
    }

    #[test]
    fn body_line_updates_pose() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6d 1 [0 0.95][100.0 200.0 300.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );

        let body = decoder.snapshot().body(0).unwrap();
        assert!(body.is_tracked());
        assert_eq!(body.quality, 0.95);
        assert_eq!(body.loc, [100.0, 200.0, 300.0]);
        assert_eq!(body.rot, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }

    #[test]
    fn rotation_is_column_major_on_wire() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6d 1 [0 1.0][0.0 0.0 0.0][1.0 2.0 3.0 4.0 5.0 6.0 7.0 8.0 9.0]",
        );

        let body = decoder.snapshot().body(0).unwrap();
        assert_eq!(body.rot, [[1.0, 4.0, 7.0], [2.0, 5.0, 8.0], [3.0, 6.0, 9.0]]);
    }

    #[test]
    fn empty_body_line_marks_existing_untracked() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6d 2 [0 0.9][1.0 1.0 1.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\
             [1 0.8][2.0 2.0 2.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );
        assert_eq!(decoder.snapshot().bodies.len(), 2);

        decode(&mut decoder, "6d 0");
        assert_eq!(decoder.snapshot().bodies.len(), 2);
        assert!(decoder.snapshot().bodies.iter().all(|b| !b.is_tracked()));
        // Pose of untracked entities is stale but retained.
        assert_eq!(decoder.snapshot().body(0).unwrap().loc, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn covariance_expansion_mapping() {
        // dim 3: reduced [1,2,3,4,5,6] -> [[1,2,3],[2,4,5],[3,5,6]]
        let full = expand_covariance::<3>(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(full, [[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]]);
    }

    proptest! {
        #[test]
        fn covariance_expansion_is_symmetric(
            reduced in prop::collection::vec(-1e3f64..1e3f64, 21)
        ) {
            let full = expand_covariance::<6>(&reduced);
            for i in 0..6 {
                for j in 0..6 {
                    prop_assert_eq!(full[i][j], full[j][i]);
                }
            }
            // Every reduced element appears in the expansion.
            for v in &reduced {
                prop_assert!(full.iter().flatten().any(|x| x == v));
            }
        }
    }

    #[test]
    fn covariance_line_fills_body_in_place() {
        let mut decoder = FrameDecoder::new();
        let reduced: Vec<String> = (1..=21).map(|v| format!("{v}.0")).collect();
        let packet = format!("6dcov 1 [0 7.0 8.0 9.0][{}]", reduced.join(" "));
        decode(&mut decoder, &packet);

        let body = decoder.snapshot().body(0).unwrap();
        assert_eq!(body.cov_ref, [7.0, 8.0, 9.0]);
        assert_eq!(body.cov[0][0], 1.0);
        assert_eq!(body.cov[0][5], 6.0);
        assert_eq!(body.cov[5][0], 6.0);
        assert_eq!(body.cov[5][5], 21.0);
        // Covariance does not change tracking state.
        assert!(!body.is_tracked());
    }

    #[test]
    fn legacy_flystick_buttons_and_joystick() {
        let mut decoder = FrameDecoder::new();
        // Packed 0b1010_0010: buttons 1, 5 and 7 pressed.
        decode(
            &mut decoder,
            "6df 1 [0 0.9 162][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );

        let flystick = decoder.snapshot().flystick(0).unwrap();
        assert_eq!(flystick.buttons.len(), 8);
        assert!(flystick.buttons[1]);
        assert!(flystick.buttons[5]);
        assert!(flystick.buttons[7]);
        assert!(!flystick.buttons[0]);
        // Button 5 wins the x deflection over button 7.
        assert_eq!(flystick.joysticks, vec![-1.0, 0.0]);
    }

    #[test]
    fn modern_flystick_explicit_counts() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6df2 2 1 [1 0.75 3 2][1.0 2.0 3.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\
             [5 0.25 -0.5]",
        );

        let snapshot = decoder.snapshot();
        assert_eq!(snapshot.flysticks.len(), 2);
        assert!(!snapshot.flystick(0).unwrap().is_tracked());

        let flystick = snapshot.flystick(1).unwrap();
        assert_eq!(flystick.quality, 0.75);
        assert_eq!(flystick.buttons, vec![true, false, true]);
        assert_eq!(flystick.joysticks, vec![0.25, -0.5]);
    }

    #[test]
    fn modern_flystick_buttons_across_words() {
        // 40 buttons span two 32-bit groups.
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6df2 1 1 [0 1.0 40 0][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\
             [-2147483648 129]",
        );

        let flystick = decoder.snapshot().flystick(0).unwrap();
        assert_eq!(flystick.buttons.len(), 40);
        assert!(flystick.buttons[31]); // sign bit of the first group
        assert!(flystick.buttons[32]);
        assert!(flystick.buttons[39]);
        assert!(!flystick.buttons[0]);
    }

    #[test]
    fn measurement_tool_with_covariance() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6dmt2 1 1 [0 0.5 2 6.0][1.0 2.0 3.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\
             [3][1.0 2.0 3.0 4.0 5.0 6.0]",
        );

        let tool = decoder.snapshot().tool(0).unwrap();
        assert_eq!(tool.tip_radius, 6.0);
        assert_eq!(tool.buttons, vec![true, true]);
        assert_eq!(tool.cov, [[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]]);
    }

    #[test]
    fn hand_with_fingers() {
        let mut decoder = FrameDecoder::new();
        let finger = "[10.0 11.0 12.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\
                      [4.5 30.0 15.0 25.0 10.0 20.0]";
        let packet = format!(
            "gl 1 [0 0.8 1 2][1.0 2.0 3.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]{finger}{finger}"
        );
        decode(&mut decoder, &packet);

        let hand = decoder.snapshot().hand(0).unwrap();
        assert_eq!(hand.side, HandSide::Right);
        assert_eq!(hand.fingers.len(), 2);
        let finger = &hand.fingers[0];
        assert_eq!(finger.tip_radius, 4.5);
        assert_eq!(finger.phalanx_lengths, [30.0, 25.0, 20.0]);
        assert_eq!(finger.phalanx_angles, [15.0, 10.0]);
    }

    #[test]
    fn human_models_with_joints() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6dj 2 1 [1 2]\
             [3 0.9][1.0 2.0 3.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\
             [4 0.8][4.0 5.0 6.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );

        let snapshot = decoder.snapshot();
        assert_eq!(snapshot.humans.len(), 2);
        assert!(!snapshot.human(0).unwrap().is_tracked());

        let human = snapshot.human(1).unwrap();
        assert_eq!(human.joints.len(), 2);
        assert_eq!(human.joints[0].id, 3);
        assert_eq!(human.joints[1].loc, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn inertial_bodies() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6di 1 [0 2 0.15][1.0 2.0 3.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );

        let inertial = decoder.snapshot().inertial(0).unwrap();
        assert!(inertial.is_tracked());
        assert_eq!(inertial.state, 2);
        assert_eq!(inertial.error, 0.15);
    }

    #[test]
    fn markers_rebuilt_by_index() {
        let mut decoder = FrameDecoder::new();
        decode(&mut decoder, "3d 2 [11 0.9][1.0 1.0 1.0] [12 0.8][2.0 2.0 2.0]");
        assert_eq!(decoder.snapshot().markers.len(), 2);

        decode(&mut decoder, "3d 1 [13 0.7][3.0 3.0 3.0]");
        let snapshot = decoder.snapshot();
        assert_eq!(snapshot.markers.len(), 1);
        assert_eq!(snapshot.marker(0).unwrap().id, 13);
    }

    #[test]
    fn reconciliation_resizes_bodies_from_calibration_count() {
        let mut decoder = FrameDecoder::new();
        // 5 calibrated targets, 1 legacy Flystick and 1 legacy tool leave
        // 3 standard bodies.
        decode(
            &mut decoder,
            "6dcal 5\n\
             6df 1 [0 0.9 0][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\n\
             6dmt 1 [0 0.9 0][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );
        assert_eq!(decoder.snapshot().bodies.len(), 3);
        assert!(decoder.snapshot().bodies.iter().all(|b| !b.is_tracked()));
    }

    #[test]
    fn reconciliation_is_order_independent() {
        let flystick = "6df 1 [0 0.9 0][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]";
        let mut first = FrameDecoder::new();
        decode(&mut first, &format!("6dcal 4\n{flystick}"));
        let mut second = FrameDecoder::new();
        decode(&mut second, &format!("{flystick}\n6dcal 4"));
        assert_eq!(first.snapshot().bodies.len(), 3);
        assert_eq!(second.snapshot().bodies.len(), 3);
    }

    #[test]
    fn reconciliation_truncates_bodies() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6d 1 [4 0.9][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );
        assert_eq!(decoder.snapshot().bodies.len(), 5);

        decode(&mut decoder, "6dcal 2");
        assert_eq!(decoder.snapshot().bodies.len(), 2);
    }

    #[test]
    fn reconciliation_resizes_hands() {
        let mut decoder = FrameDecoder::new();
        decode(&mut decoder, "glcal 2");
        assert_eq!(decoder.snapshot().hands.len(), 2);

        // Hand count hints do not persist across packets.
        decode(&mut decoder, "fr 2");
        assert_eq!(decoder.snapshot().hands.len(), 2);
    }

    #[test]
    fn identical_packet_decodes_identically() {
        let packet = "fr 7\nts 2.25\n\
                      6d 1 [0 0.9][1.0 2.0 3.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]\n\
                      3d 1 [5 0.5][9.0 9.0 9.0]";
        let mut decoder = FrameDecoder::new();
        decode(&mut decoder, packet);
        let first = decoder.snapshot().clone();
        decode(&mut decoder, packet);
        let second = decoder.snapshot();

        assert_eq!(first.frame_counter, second.frame_counter);
        assert_eq!(first.timestamp, second.timestamp);
        assert_eq!(first.bodies.len(), second.bodies.len());
        assert_eq!(first.body(0).unwrap().loc, second.body(0).unwrap().loc);
        assert_eq!(first.markers.len(), second.markers.len());
    }

    #[test]
    fn failing_line_aborts_rest_of_packet() {
        let mut decoder = FrameDecoder::new();
        let err = decoder.decode_packet("fr 9\n6d 1 [bad\nts 3.0").unwrap_err();
        assert!(matches!(err, TrackError::Parse { .. }));

        // Lines before the failure were applied, lines after were not.
        assert_eq!(decoder.snapshot().frame_counter, 9);
        assert_eq!(decoder.snapshot().timestamp, -1.0);
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode_packet(
                "6df 1 [3 0.9 0][0.0 0.0 0.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
            )
            .unwrap_err();
        assert!(matches!(err, TrackError::Parse { .. }));
    }

    #[test]
    fn entities_persist_across_frames_at_stable_ids() {
        let mut decoder = FrameDecoder::new();
        decode(
            &mut decoder,
            "6d 1 [1 0.9][5.0 6.0 7.0][1.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0]",
        );
        assert_eq!(decoder.snapshot().bodies.len(), 2);

        decode(&mut decoder, "fr 10");
        let body = decoder.snapshot().body(1).unwrap();
        assert_eq!(body.loc, [5.0, 6.0, 7.0]);
    }
}
