//! Decoded event stream.

use mks_protocol::MoveStatus;

/// A decoded response from one of the stepper modules, tagged with the
/// motor id it came from.
///
/// Events are produced by [`poll`](crate::MksStepperController::poll) and
/// delivered through the channel handed out by
/// [`events`](crate::MksStepperController::events). `Position` carries the
/// nominal (normalised) position; raw device steps never leave the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperEvent {
    /// Acknowledgement of a speed command
    SetSpeed { motor: u16, success: bool },
    /// Progress of a relative move
    SendStep { motor: u16, status: MoveStatus },
    /// Progress of an absolute move
    SeekPosition { motor: u16, status: MoveStatus },
    /// Reported position, in nominal steps
    Position { motor: u16, position: i32 },
}

impl StepperEvent {
    /// The motor this event belongs to.
    pub fn motor(&self) -> u16 {
        match self {
            Self::SetSpeed { motor, .. }
            | Self::SendStep { motor, .. }
            | Self::SeekPosition { motor, .. }
            | Self::Position { motor, .. } => *motor,
        }
    }
}
