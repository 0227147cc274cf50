//! # MKS Protocol
//!
//! CAN wire protocol for MKS SERVO57D/42D/35D/28D stepper motor driver
//! modules (no hardware dependency).
//!
//! ## Modules
//!
//! - `commands`: command byte constants
//! - `control`: outbound command frame construction
//! - `feedback`: response frame parsing
//! - `norm`: interpolated normalisation between nominal and device units
//!
//! ## Wire format
//!
//! Each driver module is addressed by an 11-bit standard CAN id (1–0x7FF,
//! 0 is reserved as broadcast). Multi-byte fields are big-endian. Every
//! outbound payload ends with an 8-bit sum-of-bytes checksum covering the
//! device address and all preceding payload bytes.

pub mod commands;
pub mod control;
pub mod feedback;
pub mod norm;

pub use commands::*;
pub use control::*;
pub use feedback::*;
pub use norm::*;

use thiserror::Error;

/// CAN 2.0 standard frame as exchanged with the MKS driver modules.
///
/// Intermediate abstraction between the protocol layer and the transport
/// backends: protocol structs parse from / build into `MksFrame`, and the
/// `CanAdapter` implementations translate it to their native frame type.
///
/// - `Copy`: zero-cost to pass around, no heap allocation
/// - fixed 8-byte buffer with an explicit `len`
/// - `is_extended` is carried so the dispatcher can reject 29-bit traffic
///   (the MKS modules only speak standard addressing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MksFrame {
    /// CAN id of the driver module (11-bit standard addressing)
    pub id: u16,

    /// Frame payload (unused tail bytes are 0)
    pub data: [u8; 8],

    /// Valid payload length (0-8)
    pub len: u8,

    /// Whether the frame arrived with a 29-bit extended id
    pub is_extended: bool,
}

impl MksFrame {
    /// Creates a standard frame. Data longer than 8 bytes is truncated.
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended: false,
        }
    }

    /// Returns only the valid portion of the payload.
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Protocol encode/decode error type
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unexpected command byte: 0x{command:02X}")]
    UnexpectedCommand { command: u8 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}
