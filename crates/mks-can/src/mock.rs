//! Scripted CAN adapter for tests.
//!
//! No hardware, no threads: frames queued with [`MockCanAdapter::inject`]
//! come back from `receive()` in order, and everything passed to `send()`
//! is recorded for assertions. Gated behind the `mock` feature so it never
//! ships in a production dependency graph.

use crate::{CanAdapter, CanError, MksFrame};
use std::collections::VecDeque;
use std::time::Duration;

/// In-memory `CanAdapter` with a scripted receive queue and a recorded
/// send log.
#[derive(Debug, Default)]
pub struct MockCanAdapter {
    rx_queue: VecDeque<MksFrame>,
    tx_log: Vec<MksFrame>,
    /// When set, every `send()` fails with this many errors remaining
    send_failures: usize,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame to be returned by a later `receive()`.
    pub fn inject(&mut self, frame: MksFrame) {
        self.rx_queue.push_back(frame);
    }

    /// Frames passed to `send()` so far, oldest first.
    pub fn sent(&self) -> &[MksFrame] {
        &self.tx_log
    }

    /// Removes and returns the oldest sent frame.
    pub fn take_sent(&mut self) -> Option<MksFrame> {
        if self.tx_log.is_empty() {
            None
        } else {
            Some(self.tx_log.remove(0))
        }
    }

    /// Makes the next `count` calls to `send()` fail with a timeout.
    pub fn fail_next_sends(&mut self, count: usize) {
        self.send_failures = count;
    }

    /// Number of frames still queued for receive.
    pub fn pending(&self) -> usize {
        self.rx_queue.len()
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: MksFrame) -> Result<(), CanError> {
        if self.send_failures > 0 {
            self.send_failures -= 1;
            return Err(CanError::Timeout);
        }
        self.tx_log.push(frame);
        Ok(())
    }

    fn receive(&mut self) -> Result<MksFrame, CanError> {
        self.rx_queue.pop_front().ok_or(CanError::Timeout)
    }

    fn receive_timeout(&mut self, _timeout: Duration) -> Result<MksFrame, CanError> {
        self.receive()
    }
}
