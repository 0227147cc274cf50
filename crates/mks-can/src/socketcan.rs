//! SocketCAN adapter (Linux).
//!
//! Uses the kernel SocketCAN subsystem. The interface must already exist
//! and be configured (bitrate via `ip link`); permissions permitting, no
//! further setup is needed.
//!
//! Loopback is deliberately left at the kernel default (enabled): the MKS
//! modules answer on the same ids we transmit to, and the protocol layer
//! separates genuine responses from looped-back commands by payload
//! length. Disabling loopback here would mask a behaviour the decoder is
//! specified against.

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, MksFrame};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socketcan::{BlockingCan, CanFrame, CanSocket, EmbeddedFrame, Frame, Socket, StandardId};
use std::os::fd::BorrowedFd;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Default bound on a blocking receive when none is set explicitly.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// Bound on a blocking send (full TX queue); applied once at open.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// `CanAdapter` backed by a SocketCAN interface.
///
/// # Example
///
/// ```no_run
/// use mks_can::{CanAdapter, MksFrame, SocketCanAdapter};
/// use std::time::Duration;
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(MksFrame::new_standard(0x01, &[0x33, 0x34])).unwrap();
/// let reply = adapter.receive_timeout(Duration::from_millis(10));
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    /// Interface name, e.g. "can0"
    interface: String,
    /// Bound applied by `receive()`
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// Opens a SocketCAN interface.
    ///
    /// # Errors
    /// - `CanError::Device` with kind `NotFound` / `AccessDenied` /
    ///   `NotUp` mapped from the open failure, with the `ip link`
    ///   command needed to fix it where that is the likely cause
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            let kind = match e.raw_os_error() {
                Some(libc::ENODEV) => CanDeviceErrorKind::NotFound,
                Some(libc::ENETDOWN) => CanDeviceErrorKind::NotUp,
                Some(libc::EPERM) | Some(libc::EACCES) => CanDeviceErrorKind::AccessDenied,
                _ => CanDeviceErrorKind::Backend,
            };
            let hint = match kind {
                CanDeviceErrorKind::NotFound => {
                    format!(" (does '{interface}' exist? check `ip link`)")
                },
                CanDeviceErrorKind::NotUp => {
                    format!(" (try `sudo ip link set up {interface}`)")
                },
                _ => String::new(),
            };
            CanError::Device(CanDeviceError::new(
                kind,
                format!("Failed to open CAN interface '{interface}': {e}{hint}"),
            ))
        })?;

        let read_timeout = DEFAULT_READ_TIMEOUT;
        socket.set_read_timeout(read_timeout).map_err(CanError::Io)?;
        socket
            .set_write_timeout(DEFAULT_WRITE_TIMEOUT)
            .map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout,
        })
    }

    /// Interface name this adapter is bound to.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Current receive bound.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Sets the bound used by `receive()`.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        self.socket.set_read_timeout(timeout).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Waits until the socket is readable or `deadline` passes.
    fn wait_readable(&self, deadline: Instant) -> Result<(), CanError> {
        let Some(budget) = poll_budget(deadline) else {
            return Err(CanError::Timeout);
        };

        let fd = self.socket.as_raw_fd();
        let pollfd = PollFd::new(unsafe { BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN);

        match poll(&mut [pollfd], PollTimeout::from(budget)) {
            Ok(0) => Err(CanError::Timeout),
            Ok(_) => Ok(()),
            Err(e) => Err(CanError::Io(std::io::Error::other(format!(
                "poll failed: {e}"
            )))),
        }
    }
}

/// Milliseconds left until `deadline`, capped at the poll(2) argument
/// range; `None` once the deadline has passed.
fn poll_budget(deadline: Instant) -> Option<u16> {
    let remaining = deadline.checked_duration_since(Instant::now())?;
    Some(remaining.as_millis().min(65_535) as u16)
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: MksFrame) -> Result<(), CanError> {
        let can_frame = StandardId::new(frame.id)
            .and_then(|id| CanFrame::new(id, frame.data_slice()))
            .ok_or_else(|| {
                CanError::Device(
                    format!("Failed to create standard frame with ID 0x{:X}", frame.id).into(),
                )
            })?;

        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {e}"
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn receive(&mut self) -> Result<MksFrame, CanError> {
        // One deadline for the whole call: a faulted bus streaming error
        // frames must not extend the bound with every frame it emits.
        let deadline = Instant::now() + self.read_timeout;

        loop {
            self.wait_readable(deadline)?;

            let can_frame = self.socket.receive().map_err(|e| {
                CanError::Io(std::io::Error::other(format!(
                    "SocketCAN receive error: {e}"
                )))
            })?;

            // Error frames are bus diagnostics, not data
            if can_frame.is_error_frame() {
                warn!("CAN error frame received on '{}', ignoring", self.interface);
                continue;
            }

            let frame = MksFrame {
                // Extended ids do not fit the 11-bit space; keep the low
                // bits and the flag so the dispatcher can reject the frame.
                id: (can_frame.raw_id() & 0x7FF) as u16,
                data: {
                    let mut data = [0u8; 8];
                    let frame_data = can_frame.data();
                    let len = frame_data.len().min(8);
                    data[..len].copy_from_slice(&frame_data[..len]);
                    data
                },
                len: can_frame.dlc() as u8,
                is_extended: can_frame.is_extended(),
            };

            trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
            return Ok(frame);
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {e}");
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MksFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = self.receive();
        let _ = self.set_read_timeout(old_timeout);
        result
    }

    fn send_timeout(&mut self, frame: MksFrame, timeout: Duration) -> Result<(), CanError> {
        self.socket.set_write_timeout(timeout).map_err(CanError::Io)?;
        let result = self.send(frame);
        let _ = self.socket.set_write_timeout(DEFAULT_WRITE_TIMEOUT);
        result
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        trace!("SocketCAN interface '{}' closed", self.interface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_budget_expired_deadline() {
        let past = Instant::now() - Duration::from_millis(5);
        assert_eq!(poll_budget(past), None);
    }

    #[test]
    fn test_poll_budget_caps_at_poll_range() {
        let far = Instant::now() + Duration::from_secs(3600);
        assert_eq!(poll_budget(far), Some(65_535));
    }

    #[test]
    fn test_poll_budget_counts_down() {
        let deadline = Instant::now() + Duration::from_millis(50);
        let budget = poll_budget(deadline).unwrap();
        assert!(budget <= 50);
    }
}
