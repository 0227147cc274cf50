//! Outbound command frame construction.
//!
//! One struct per command kind, each holding fields already converted to
//! device units (the driver facade applies normalisation before building
//! these) and producing the exact wire payload, checksum included, via
//! `to_frame()`.

use crate::MksFrame;
use crate::commands::{CURRENT_POS, SEEK_POS_BY_STEPS, SEND_STEP, SET_SPEED, checksum};

/// Spin direction as encoded in the speed-properties direction bit.
///
/// The manual defines bit value 1 as CW and 0 as CCW, consistent with the
/// encoder convention that positive counts are CCW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ccw = 0,
    Cw = 1,
}

impl Direction {
    /// Maps a signed nominal speed to its direction bit: negative is CW.
    pub fn from_rpm(rpm: i16) -> Self {
        if rpm < 0 { Direction::Cw } else { Direction::Ccw }
    }
}

/// Two-byte packing of a 12-bit speed magnitude and the direction bit.
///
/// Wire layout (big-endian word):
///
/// ```text
/// | Bit     |  15 | 14-12    | 11-0      |
/// | Meaning | Dir | Reserved | Magnitude |
/// ```
///
/// i.e. the first byte on the wire carries the direction bit and the high
/// nibble of the magnitude, the second byte the low magnitude byte. Stays
/// internal to the codec; callers deal in signed nominal speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpeedProperties {
    magnitude: u16,
    direction: Direction,
}

impl SpeedProperties {
    /// Magnitudes beyond the 12-bit field are masked; the driver clamps
    /// (with a warning) before the value ever gets here.
    pub(crate) fn new(magnitude: u16, direction: Direction) -> Self {
        Self {
            magnitude: magnitude & 0x0FFF,
            direction,
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; 2] {
        [
            ((self.direction as u8) << 7) | (self.magnitude >> 8) as u8,
            (self.magnitude & 0xFF) as u8,
        ]
    }
}

/// Packs the low 24 bits of a value big-endian, as used by the step-count
/// and position fields.
pub(crate) fn pack_24_be(value: u32) -> [u8; 3] {
    [
        (value >> 16 & 0xFF) as u8,
        (value >> 8 & 0xFF) as u8,
        (value & 0xFF) as u8,
    ]
}

/// `SET_SPEED` (0xF6): run the motor at a target device speed.
///
/// Payload: `[0xF6, props_hi, props_lo, accel, checksum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSpeedCommand {
    pub motor: u16,
    /// Target speed magnitude in device units (12-bit)
    pub speed: u16,
    pub direction: Direction,
    pub acceleration: u8,
}

impl SetSpeedCommand {
    pub fn to_frame(&self) -> MksFrame {
        let props = SpeedProperties::new(self.speed, self.direction).to_bytes();
        let mut payload = [SET_SPEED, props[0], props[1], self.acceleration, 0];
        let ck = checksum(self.motor, &payload[..4]);
        payload[4] = ck;
        MksFrame::new_standard(self.motor, &payload)
    }
}

/// `SEND_STEP` (0xFD): relative move by a 24-bit step count.
///
/// Payload: `[0xFD, props_hi, props_lo, accel, s2, s1, s0, checksum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendStepCommand {
    pub motor: u16,
    /// Number of device steps to move; only the low 24 bits are encodable
    pub steps: u32,
    pub speed: u16,
    pub direction: Direction,
    pub acceleration: u8,
}

impl SendStepCommand {
    pub fn to_frame(&self) -> MksFrame {
        let props = SpeedProperties::new(self.speed, self.direction).to_bytes();
        let steps = pack_24_be(self.steps);
        let mut payload = [
            SEND_STEP,
            props[0],
            props[1],
            self.acceleration,
            steps[0],
            steps[1],
            steps[2],
            0,
        ];
        let ck = checksum(self.motor, &payload[..7]);
        payload[7] = ck;
        MksFrame::new_standard(self.motor, &payload)
    }
}

/// `SEEK_POS_BY_STEPS` (0xFE): absolute move to a step position.
///
/// Payload: `[0xFE, props_hi, props_lo, accel, p2, p1, p0, checksum]`.
/// The position is the signed 32-bit device position truncated to its low
/// 24 bits. The device ignores the direction bit when seeking, so it is
/// packed as CCW.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPositionCommand {
    pub motor: u16,
    /// Target device step position; encoded as its low 24 bits
    pub position: i32,
    pub speed: u16,
    pub acceleration: u8,
}

impl SeekPositionCommand {
    pub fn to_frame(&self) -> MksFrame {
        let props = SpeedProperties::new(self.speed, Direction::Ccw).to_bytes();
        let position = pack_24_be(self.position as u32);
        let mut payload = [
            SEEK_POS_BY_STEPS,
            props[0],
            props[1],
            self.acceleration,
            position[0],
            position[1],
            position[2],
            0,
        ];
        let ck = checksum(self.motor, &payload[..7]);
        payload[7] = ck;
        MksFrame::new_standard(self.motor, &payload)
    }
}

/// `CURRENT_POS` (0x33): query the step-counted position.
///
/// Payload: `[0x33, checksum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPositionCommand {
    pub motor: u16,
}

impl QueryPositionCommand {
    pub fn to_frame(&self) -> MksFrame {
        let mut payload = [CURRENT_POS, 0];
        let ck = checksum(self.motor, &payload[..1]);
        payload[1] = ck;
        MksFrame::new_standard(self.motor, &payload)
    }
}
