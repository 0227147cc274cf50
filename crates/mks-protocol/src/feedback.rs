//! Response frame parsing.
//!
//! Each driver module answers a command with a frame whose first payload
//! byte echoes the command byte. One struct per response kind, parsed via
//! `TryFrom<MksFrame>`.
//!
//! Length checks here are load-bearing, not defensive: with loopback
//! enabled on the bus interface, our own outbound frames come back tagged
//! with the same command bytes, and only the payload length tells a
//! genuine response (status: 3 bytes, position: 6 bytes) apart from an
//! echo (5, 8 or 2 bytes). Response checksums are carried on the wire but
//! not verified.

use crate::MksFrame;
use crate::commands::{CURRENT_POS, SEEK_POS_BY_STEPS, SEND_STEP, SET_SPEED};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ProtocolError;

/// Status code reported while a `SEND_STEP` or `SEEK_POS_BY_STEPS` motion
/// executes. A motion typically reports `Moving` on acceptance and
/// `Completed` (or `LimitReached`) once finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MoveStatus {
    /// Movement failed
    Failed = 0,
    /// The motor is moving
    Moving = 1,
    /// The motor has reached the target
    Completed = 2,
    /// An end limit has been reached
    LimitReached = 3,
}

/// Expected payload length of a status-style response: echo byte, status
/// byte, checksum.
const STATUS_RESPONSE_LEN: usize = 3;

/// Expected payload length of a position response: echo byte, int32
/// position, checksum.
const POSITION_RESPONSE_LEN: usize = 6;

fn check_response(
    frame: &MksFrame,
    command: u8,
    expected_len: usize,
) -> Result<(), ProtocolError> {
    let data = frame.data_slice();
    if data.first() != Some(&command) {
        return Err(ProtocolError::UnexpectedCommand {
            command: data.first().copied().unwrap_or(0),
        });
    }
    if data.len() != expected_len {
        return Err(ProtocolError::InvalidLength {
            expected: expected_len,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Response to `SET_SPEED` (0xF6).
///
/// The device reports a single acceptance byte; 1 means the speed command
/// was taken, anything else is failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSpeedResponse {
    pub motor: u16,
    pub success: bool,
}

impl TryFrom<MksFrame> for SetSpeedResponse {
    type Error = ProtocolError;

    fn try_from(frame: MksFrame) -> Result<Self, Self::Error> {
        check_response(&frame, SET_SPEED, STATUS_RESPONSE_LEN)?;
        Ok(Self {
            motor: frame.id,
            success: frame.data[1] == 1,
        })
    }
}

/// Response to `SEND_STEP` (0xFD).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendStepResponse {
    pub motor: u16,
    pub status: MoveStatus,
}

impl TryFrom<MksFrame> for SendStepResponse {
    type Error = ProtocolError;

    fn try_from(frame: MksFrame) -> Result<Self, Self::Error> {
        check_response(&frame, SEND_STEP, STATUS_RESPONSE_LEN)?;
        let status =
            MoveStatus::try_from(frame.data[1]).map_err(|_| ProtocolError::InvalidValue {
                field: "MoveStatus".to_string(),
                value: frame.data[1],
            })?;
        Ok(Self {
            motor: frame.id,
            status,
        })
    }
}

/// Response to `SEEK_POS_BY_STEPS` (0xFE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPositionResponse {
    pub motor: u16,
    pub status: MoveStatus,
}

impl TryFrom<MksFrame> for SeekPositionResponse {
    type Error = ProtocolError;

    fn try_from(frame: MksFrame) -> Result<Self, Self::Error> {
        check_response(&frame, SEEK_POS_BY_STEPS, STATUS_RESPONSE_LEN)?;
        let status =
            MoveStatus::try_from(frame.data[1]).map_err(|_| ProtocolError::InvalidValue {
                field: "MoveStatus".to_string(),
                value: frame.data[1],
            })?;
        Ok(Self {
            motor: frame.id,
            status,
        })
    }
}

/// Response to `CURRENT_POS` (0x33).
///
/// Carries the raw device step position (big-endian int32); dividing out
/// the normalisation factor is the driver's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentPositionResponse {
    pub motor: u16,
    /// Step offset from the zero point, in device (microstep) units
    pub position: i32,
}

impl TryFrom<MksFrame> for CurrentPositionResponse {
    type Error = ProtocolError;

    fn try_from(frame: MksFrame) -> Result<Self, Self::Error> {
        check_response(&frame, CURRENT_POS, POSITION_RESPONSE_LEN)?;
        let position = i32::from_be_bytes([frame.data[1], frame.data[2], frame.data[3], frame.data[4]]);
        Ok(Self {
            motor: frame.id,
            position,
        })
    }
}
