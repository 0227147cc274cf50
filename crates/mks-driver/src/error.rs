use mks_can::CanError;
use thiserror::Error;

/// Top-level driver error.
///
/// Transport failures convert in via `?`; the other variants are
/// driver-level misuse. Protocol decode failures never appear here: the
/// dispatcher drops undecodable frames as normal shared-bus traffic.
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN transport error
    #[error("CAN Error: {0}")]
    Can(#[from] CanError),

    /// The normalisation factor must be at least 1
    #[error("Invalid normalisation factor: {0} (must be >= 1)")]
    InvalidNormFactor(u8),

    /// The motor id is not one this controller was constructed with
    #[error("Unknown motor id: 0x{0:X}")]
    UnknownMotor(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_error_converts() {
        let err: DriverError = CanError::Timeout.into();
        assert!(matches!(err, DriverError::Can(CanError::Timeout)));
    }

    #[test]
    fn test_display() {
        assert!(
            DriverError::InvalidNormFactor(0)
                .to_string()
                .contains("must be >= 1")
        );
        assert!(DriverError::UnknownMotor(0x10).to_string().contains("0x10"));
    }
}
