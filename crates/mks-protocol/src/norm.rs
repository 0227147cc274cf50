//! Interpolated normalisation between nominal units and device units.
//!
//! The MKS manual documents speeds in "RPM", which is only accurate under
//! its nominal calibration (16-microstep mode, 200 steps/rev motor); a
//! commanded "1 RPM" actually moves 3200 steps/min. To keep caller-facing
//! units meaningful regardless of the configured microstep interpolation
//! factor, speeds are rescaled by `16 / factor` and step counts and
//! positions by `factor`. A factor of 1 disables normalisation.
//!
//! These are total functions over their domains; a factor of 0 is rejected
//! at controller construction, never here.

/// Converts a nominal signed speed in RPM to a device speed magnitude.
///
/// Computes `round(|rpm| * 16 / factor)`, rounding half away from zero.
/// The sign is carried separately as the direction bit, see
/// [`Direction`](crate::control::Direction). Magnitudes past `u16::MAX`
/// saturate rather than wrap; the driver clamps further to the wire
/// field's 12 bits.
pub fn to_device_speed(rpm: i16, factor: u8) -> u16 {
    let magnitude = (rpm as i32).unsigned_abs() * 16;
    let factor = u32::from(factor);
    let scaled = (magnitude + factor / 2) / factor;
    scaled.min(u32::from(u16::MAX)) as u16
}

/// Converts a nominal relative step count to device microsteps,
/// saturating at `u32::MAX`.
pub fn to_device_steps(steps: u32, factor: u8) -> u32 {
    (u64::from(steps) * u64::from(factor)).min(u64::from(u32::MAX)) as u32
}

/// Converts a nominal absolute step position to a device step position,
/// saturating at the `i32` range.
pub fn to_device_position(position: i32, factor: u8) -> i32 {
    (i64::from(position) * i64::from(factor))
        .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Converts a raw device step position back to nominal steps.
///
/// Integer division, truncating toward zero; sub-factor remainders are
/// below the caller's unit of resolution.
pub fn from_device_position(raw: i32, factor: u8) -> i32 {
    raw / i32::from(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_speed_identity_scaling() {
        // factor 16 cancels the nominal x16: 1 RPM in, 1 device unit out
        assert_eq!(to_device_speed(1, 16), 1);
        assert_eq!(to_device_speed(-10, 16), 10);
        assert_eq!(to_device_speed(2047, 16), 2047);
    }

    #[test]
    fn test_speed_no_interpolation() {
        // factor 1: full nominal ratio applies
        assert_eq!(to_device_speed(1, 1), 16);
        assert_eq!(to_device_speed(-5, 1), 80);
    }

    #[test]
    fn test_speed_rounds_half_up() {
        // |3| * 16 / 32 = 1.5 -> 2
        assert_eq!(to_device_speed(3, 32), 2);
        assert_eq!(to_device_speed(-3, 32), 2);
        // |1| * 16 / 32 = 0.5 -> 1
        assert_eq!(to_device_speed(1, 32), 1);
    }

    #[test]
    fn test_speed_zero() {
        assert_eq!(to_device_speed(0, 1), 0);
        assert_eq!(to_device_speed(0, 16), 0);
    }

    #[test]
    fn test_speed_saturates_instead_of_wrapping() {
        // 4096 * 16 = 65536 would wrap a bare u16 to 0 (a stop command)
        assert_eq!(to_device_speed(4096, 1), u16::MAX);
        assert_eq!(to_device_speed(i16::MIN, 1), u16::MAX);
        // just under the boundary still scales exactly
        assert_eq!(to_device_speed(4095, 1), 65520);
    }

    #[test]
    fn test_steps_scaling() {
        assert_eq!(to_device_steps(20, 1), 20);
        assert_eq!(to_device_steps(20, 16), 320);
    }

    #[test]
    fn test_steps_saturate_instead_of_overflowing() {
        assert_eq!(to_device_steps(0x1000_0000, 16), u32::MAX);
        assert_eq!(to_device_steps(u32::MAX, 255), u32::MAX);
    }

    #[test]
    fn test_position_scaling() {
        assert_eq!(to_device_position(100, 4), 400);
        assert_eq!(to_device_position(-100, 4), -400);
        assert_eq!(from_device_position(400, 4), 100);
        assert_eq!(from_device_position(-400, 4), -100);
    }

    #[test]
    fn test_position_saturates_at_i32_range() {
        assert_eq!(to_device_position(0x0800_0000, 32), i32::MAX);
        assert_eq!(to_device_position(-0x0800_0000, 32), i32::MIN);
    }

    #[test]
    fn test_position_truncates_toward_zero() {
        assert_eq!(from_device_position(7, 4), 1);
        assert_eq!(from_device_position(-7, 4), -1);
        assert_eq!(from_device_position(0x20, 16), 2);
    }

    proptest! {
        /// Positions that fit the wire's 24-bit field after scaling must
        /// survive the there-and-back conversion exactly.
        #[test]
        fn prop_position_roundtrip(
            position in -0x40_0000i32..0x40_0000i32,
            factor_exp in 0u32..6,
        ) {
            let factor = 1u8 << factor_exp; // 1, 2, 4, 8, 16, 32
            prop_assume!(
                to_device_position(position, factor).unsigned_abs() < 0x80_0000
            );
            let raw = to_device_position(position, factor);
            prop_assert_eq!(from_device_position(raw, factor), position);
        }

        #[test]
        fn prop_speed_magnitude_only(rpm in -2047i16..=2047, factor_exp in 0u32..6) {
            let factor = 1u8 << factor_exp;
            prop_assert_eq!(
                to_device_speed(rpm, factor),
                to_device_speed(rpm.saturating_abs(), factor)
            );
        }
    }
}
