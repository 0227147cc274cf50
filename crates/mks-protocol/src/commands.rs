//! Command byte constants for the MKS SERVO57D/42D/35D/28D driver modules.
//!
//! Responses echo the command byte as the first payload byte, so these
//! constants are used both when building outbound frames and when routing
//! inbound ones. The bus is shared: frames tagged with bytes outside the
//! modeled set are normal traffic for other tools and are ignored by the
//! dispatcher.
//!
//! Byte values are taken from the MKS SERVO 42D/57D manual. The manual's
//! speed unit of "RPM" only holds under its nominal calibration (16
//! microsteps, 200 steps/rev); one device speed unit is 160/3 steps/s.

/// Encoder value with turns and angle combined into a single int48,
/// 0x4000 per CW turn. Not modeled; documented for bus-traffic context.
pub const ENCODER_ADDITIVE: u8 = 0x31;

/// Motor speed as measured by the encoder, int16, positive is CCW.
/// Not modeled.
pub const MOTOR_SPEED: u8 = 0x32;

/// Current motor position by step counting.
///
/// Query: no arguments. Response: int32 big-endian step offset from the
/// zero point.
pub const CURRENT_POS: u8 = 0x33;

/// IO port status bitmap. Not modeled.
pub const IO_STATUS: u8 = 0x34;

/// Enable or disable the motor driver stage. Not modeled.
pub const ENABLE_MOTOR: u8 = 0xF3;

/// Run the motor at a target speed with a fixed acceleration ramp.
///
/// Arguments: packed speed properties (2 bytes: direction bit plus 12-bit
/// magnitude), acceleration (1 byte). Response: 1 = command accepted.
///
/// A speed of 0 stops the motor; acceleration 0 applies the target speed
/// immediately.
pub const SET_SPEED: u8 = 0xF6;

/// Immediate stop without deceleration. Not modeled.
pub const EMERGENCY_STOP: u8 = 0xF7;

/// Run the motor a relative number of steps ("position mode 1").
///
/// Arguments: packed speed properties (2 bytes), acceleration (1 byte),
/// step count (uint24 big-endian). Response: a
/// [`MoveStatus`](crate::feedback::MoveStatus) code, typically `Moving`
/// followed later by `Completed`.
pub const SEND_STEP: u8 = 0xFD;

/// Run the motor to an absolute step position ("position mode 2").
///
/// Arguments: packed speed properties (2 bytes), acceleration (1 byte),
/// target position (int24 big-endian, positive is CW of zero). Response:
/// a [`MoveStatus`](crate::feedback::MoveStatus) code.
pub const SEEK_POS_BY_STEPS: u8 = 0xFE;

/// 8-bit sum-of-bytes checksum appended to every outbound payload.
///
/// Covers the device address byte and all preceding payload bytes
/// (command byte included); overflow wraps silently, which is the wire
/// contract. Responses carry a checksum too, but this crate does not
/// verify it on receive.
pub fn checksum(address: u16, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(address as u8, |sum, byte| sum.wrapping_add(*byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_example() {
        // worked example from the manual: 0x01 + 0xF6 + 0x00 + 0x10 + 0x00
        assert_eq!(checksum(0x01, &[0xF6, 0x00, 0x10, 0x00]), 0x07);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(0xFF, &[0xFF, 0xFF]), 0xFD);
        assert_eq!(checksum(0x01, &[0xFF]), 0x00);
    }

    #[test]
    fn test_checksum_empty_payload() {
        assert_eq!(checksum(0x42, &[]), 0x42);
    }

    #[test]
    fn test_checksum_address_low_byte() {
        // 11-bit ids contribute only their low byte, which is id mod 256
        assert_eq!(checksum(0x1FF, &[0x33]), checksum(0xFF, &[0x33]));
    }

    #[test]
    fn test_checksum_deterministic() {
        let payload = [0xFD, 0x80, 0x0A, 0x00, 0x00, 0x00, 0x14];
        assert_eq!(checksum(0x05, &payload), checksum(0x05, &payload));
    }
}
