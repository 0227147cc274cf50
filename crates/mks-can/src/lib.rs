//! # MKS CAN Adapter Layer
//!
//! Hardware abstraction for the shared CAN bus the stepper driver modules
//! live on. The protocol engine depends only on the [`CanAdapter`] trait;
//! concrete transports (SocketCAN on Linux, a scripted mock for tests)
//! live behind it and are swappable.

use std::time::Duration;
use thiserror::Error;

// Re-export the frame type from mks-protocol
pub use mks_protocol::MksFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::MockCanAdapter;

/// Unified CAN adapter error type
#[derive(Error, Debug)]
pub enum CanError {
    /// Underlying IO error
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// Device-level error (interface missing, not up, open failed)
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),

    /// Send or receive did not complete within its bound (non-fatal,
    /// retry is the caller's decision)
    #[error("Timeout")]
    Timeout,

    /// Bus off (fatal, the interface needs a restart)
    #[error("Bus off")]
    BusOff,
}

/// Structured classification of device/backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    /// Interface does not exist
    NotFound,
    /// Interface exists but is not up
    NotUp,
    /// Permission denied opening the interface
    AccessDenied,
    /// Other backend error
    Backend,
}

/// Structured device error: kind + human-readable message
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Fatal errors mean the interface is unusable and must be fixed
    /// outside the process; non-fatal ones may clear on retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NotFound
                | CanDeviceErrorKind::NotUp
                | CanDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// CAN transport capability.
///
/// Semantics:
/// - `send()`: fire-and-forget; returns once the frame is queued on the
///   interface, bounded by the transport's own send timeout.
/// - `receive_timeout()`: blocks until a frame arrives or the given bound
///   elapses. A zero timeout is a non-blocking best-effort check.
///
/// No call blocks indefinitely.
pub trait CanAdapter {
    /// Sends one frame.
    fn send(&mut self, frame: MksFrame) -> Result<(), CanError>;

    /// Receives one frame, blocking no longer than the configured read
    /// timeout.
    fn receive(&mut self) -> Result<MksFrame, CanError>;

    /// Sets the timeout used by subsequent `receive()` calls. Default is
    /// a no-op for adapters with a fixed bound.
    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    /// Receives one frame with an explicit bound for this call only.
    fn receive_timeout(&mut self, timeout: Duration) -> Result<MksFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    /// Non-blocking receive: `Ok(None)` when no frame is pending.
    fn try_receive(&mut self) -> Result<Option<MksFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Sends one frame with an explicit bound. Default ignores the bound
    /// and relies on the adapter's own send timeout.
    fn send_timeout(&mut self, frame: MksFrame, _timeout: Duration) -> Result<(), CanError> {
        self.send(frame)
    }
}
