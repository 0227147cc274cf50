//! The controller facade.
//!
//! Owns the CAN adapter and the set of motor addresses, applies the unit
//! normalisation in both directions, and hands decoded responses to the
//! caller through a channel. Single logical thread of control: commands go
//! out when asked, frames come in only when [`poll`] is called, and events
//! are delivered synchronously inside `poll` on the caller's thread.
//!
//! [`poll`]: MksStepperController::poll

use crate::dispatch::dispatch;
use crate::error::DriverError;
use crate::events::StepperEvent;
use crossbeam_channel::{Receiver, Sender, unbounded};
use mks_can::{CanAdapter, CanError};
use mks_protocol::control::{
    Direction, QueryPositionCommand, SeekPositionCommand, SendStepCommand, SetSpeedCommand,
};
use mks_protocol::norm;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest speed magnitude the 12-bit wire field can carry.
const MAX_DEVICE_SPEED: u16 = 0x0FFF;

/// Largest step count the 24-bit wire field can carry.
const MAX_DEVICE_STEPS: u32 = 0xFF_FFFF;

/// Driver for a set of MKS stepper modules sharing one CAN bus.
///
/// Generic over the transport so tests run against a scripted adapter.
/// Speeds, step counts and positions at this interface are nominal
/// (pre-interpolation) units; the configured normalisation factor converts
/// them to device microsteps on the way out and back on the way in.
///
/// # Example
///
/// ```no_run
/// use mks_driver::MksStepperController;
/// use std::time::Duration;
///
/// let mut controller =
///     MksStepperController::open("can0", [1, 2].into(), 16).unwrap();
/// controller.set_speed(1, 120, 2).unwrap();
/// loop {
///     controller.poll(Duration::from_millis(2)).unwrap();
///     for event in controller.events().try_iter() {
///         println!("{event:?}");
///     }
/// }
/// ```
#[derive(Debug)]
pub struct MksStepperController<A: CanAdapter> {
    adapter: A,
    motor_ids: HashSet<u16>,
    norm_factor: u8,
    event_tx: Sender<StepperEvent>,
    event_rx: Receiver<StepperEvent>,
}

impl<A: CanAdapter> MksStepperController<A> {
    /// Creates a controller over an already-open adapter.
    ///
    /// # Errors
    /// - `DriverError::InvalidNormFactor` if `norm_factor` is 0
    pub fn new(
        adapter: A,
        motor_ids: HashSet<u16>,
        norm_factor: u8,
    ) -> Result<Self, DriverError> {
        if norm_factor == 0 {
            return Err(DriverError::InvalidNormFactor(norm_factor));
        }

        let (event_tx, event_rx) = unbounded();

        Ok(Self {
            adapter,
            motor_ids,
            norm_factor,
            event_tx,
            event_rx,
        })
    }

    /// Motor addresses this controller talks to.
    pub fn motor_ids(&self) -> &HashSet<u16> {
        &self.motor_ids
    }

    /// The configured normalisation factor.
    pub fn norm_factor(&self) -> u8 {
        self.norm_factor
    }

    /// A receiver for the decoded event stream. Cheap to clone; all
    /// receivers see every event.
    pub fn events(&self) -> Receiver<StepperEvent> {
        self.event_rx.clone()
    }

    fn check_motor(&self, motor: u16) -> Result<(), DriverError> {
        if self.motor_ids.contains(&motor) {
            Ok(())
        } else {
            Err(DriverError::UnknownMotor(motor))
        }
    }

    /// Converts a nominal speed to its device magnitude, clamping to the
    /// 12-bit wire field.
    fn device_speed(&self, rpm: i16) -> u16 {
        let speed = norm::to_device_speed(rpm, self.norm_factor);
        if speed > MAX_DEVICE_SPEED {
            warn!(
                "Speed {} exceeds the device maximum, clamping to {}",
                speed, MAX_DEVICE_SPEED
            );
            MAX_DEVICE_SPEED
        } else {
            speed
        }
    }

    /// Runs a motor at a constant speed. Negative `rpm` spins clockwise;
    /// 0 stops the motor. Acceleration 0 applies the speed immediately.
    ///
    /// The module acknowledges with a [`StepperEvent::SetSpeed`].
    pub fn set_speed(&mut self, motor: u16, rpm: i16, acceleration: u8) -> Result<(), DriverError> {
        self.check_motor(motor)?;

        let command = SetSpeedCommand {
            motor,
            speed: self.device_speed(rpm),
            direction: Direction::from_rpm(rpm),
            acceleration,
        };

        debug!("Motor 0x{:X}: set speed {} rpm", motor, rpm);
        self.adapter.send(command.to_frame())?;
        Ok(())
    }

    /// Moves a motor by a relative number of nominal steps at the given
    /// speed. Negative `rpm` moves clockwise.
    ///
    /// Progress arrives as [`StepperEvent::SendStep`] events, typically
    /// `Moving` on acceptance and `Completed` when the move finishes.
    pub fn send_step(
        &mut self,
        motor: u16,
        steps: u32,
        rpm: i16,
        acceleration: u8,
    ) -> Result<(), DriverError> {
        self.check_motor(motor)?;

        let mut device_steps = norm::to_device_steps(steps, self.norm_factor);
        if device_steps > MAX_DEVICE_STEPS {
            warn!(
                "Step count {} exceeds the device maximum, clamping to {}",
                device_steps, MAX_DEVICE_STEPS
            );
            device_steps = MAX_DEVICE_STEPS;
        }

        let command = SendStepCommand {
            motor,
            steps: device_steps,
            speed: self.device_speed(rpm),
            direction: Direction::from_rpm(rpm),
            acceleration,
        };

        debug!("Motor 0x{:X}: step {} at {} rpm", motor, steps, rpm);
        self.adapter.send(command.to_frame())?;
        Ok(())
    }

    /// Moves a motor to an absolute nominal position. The sign of `rpm`
    /// is ignored; the module picks the direction that reaches the
    /// target.
    ///
    /// Progress arrives as [`StepperEvent::SeekPosition`] events.
    pub fn seek_position(
        &mut self,
        motor: u16,
        position: i32,
        rpm: i16,
        acceleration: u8,
    ) -> Result<(), DriverError> {
        self.check_motor(motor)?;

        let command = SeekPositionCommand {
            motor,
            position: norm::to_device_position(position, self.norm_factor),
            speed: self.device_speed(rpm),
            acceleration,
        };

        debug!("Motor 0x{:X}: seek position {}", motor, position);
        self.adapter.send(command.to_frame())?;
        Ok(())
    }

    /// Requests the current position of a motor. The answer arrives as a
    /// [`StepperEvent::Position`] on a later `poll`.
    pub fn get_position(&mut self, motor: u16) -> Result<(), DriverError> {
        self.check_motor(motor)?;
        self.adapter.send(QueryPositionCommand { motor }.to_frame())?;
        Ok(())
    }

    /// Receives at most one frame from the bus, bounded by `timeout`, and
    /// delivers the decoded event (if any) to the event channel.
    ///
    /// A timeout is a normal, empty-bus return, not an error. Frames that
    /// do not decode into an event (other traffic, loop-back echoes) are
    /// dropped here the same way.
    pub fn poll(&mut self, timeout: Duration) -> Result<(), DriverError> {
        let frame = match self.adapter.receive_timeout(timeout) {
            Ok(frame) => frame,
            Err(CanError::Timeout) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if let Some(event) = dispatch(&self.motor_ids, &frame) {
            let event = self.normalize(event);
            debug!("Decoded event: {:?}", event);
            // Delivery only fails when every receiver is gone, in which
            // case the caller has stopped listening.
            let _ = self.event_tx.send(event);
        }
        Ok(())
    }

    /// Raw device positions become nominal before delivery; other events
    /// pass through.
    fn normalize(&self, event: StepperEvent) -> StepperEvent {
        match event {
            StepperEvent::Position { motor, position } => StepperEvent::Position {
                motor,
                position: norm::from_device_position(position, self.norm_factor),
            },
            other => other,
        }
    }
}

#[cfg(target_os = "linux")]
impl MksStepperController<mks_can::SocketCanAdapter> {
    /// Opens a SocketCAN interface and builds a controller over it.
    pub fn open(
        interface: &str,
        motor_ids: HashSet<u16>,
        norm_factor: u8,
    ) -> Result<Self, DriverError> {
        let adapter = mks_can::SocketCanAdapter::new(interface)?;
        Self::new(adapter, motor_ids, norm_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mks_can::MockCanAdapter;
    use mks_protocol::{MksFrame, MoveStatus};

    fn controller(
        motors: &[u16],
        factor: u8,
    ) -> MksStepperController<MockCanAdapter> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        MksStepperController::new(MockCanAdapter::new(), motors.iter().copied().collect(), factor)
            .unwrap()
    }

    #[test]
    fn test_rejects_zero_norm_factor() {
        let result = MksStepperController::new(MockCanAdapter::new(), HashSet::from([1]), 0);
        assert!(matches!(result, Err(DriverError::InvalidNormFactor(0))));
    }

    #[test]
    fn test_rejects_unknown_motor() {
        let mut controller = controller(&[1, 2], 16);
        assert!(matches!(
            controller.set_speed(9, 100, 0),
            Err(DriverError::UnknownMotor(9))
        ));
    }

    #[test]
    fn test_set_speed_normalises_and_signs() {
        // rpm = -10, factor 16: magnitude 10, direction bit set
        let mut controller = controller(&[1], 16);
        controller.set_speed(1, -10, 0).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        assert_eq!(frame.id, 1);
        assert_eq!(frame.data_slice(), &[0xF6, 0x80, 0x0A, 0x00, 0x81]);
    }

    #[test]
    fn test_set_speed_clamps_to_wire_field() {
        // factor 1: 300 rpm -> 4800 device units, above the 12-bit max
        let mut controller = controller(&[1], 1);
        controller.set_speed(1, 300, 0).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        assert_eq!(&frame.data_slice()[1..3], &[0x0F, 0xFF]);
    }

    #[test]
    fn test_set_speed_clamps_past_u16_range() {
        // 4096 rpm at factor 1 normalises to 65536; a wrapping
        // narrowing would put 0x0000 (a stop) on the wire
        let mut controller = controller(&[1], 1);
        controller.set_speed(1, 4096, 0).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        assert_eq!(&frame.data_slice()[1..3], &[0x0F, 0xFF]);
    }

    #[test]
    fn test_send_step_wire_format() {
        let mut controller = controller(&[1], 1);
        controller.send_step(1, 20, 100, 0).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        assert_eq!(
            frame.data_slice(),
            &[0xFD, 0x00, 0x64, 0x00, 0x00, 0x00, 0x14, 0x7A]
        );
    }

    #[test]
    fn test_send_step_applies_factor() {
        let mut controller = controller(&[1], 16);
        controller.send_step(1, 20, 100, 0).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        // 20 nominal steps * 16 = 320 = 0x000140 device steps
        assert_eq!(&frame.data_slice()[4..7], &[0x00, 0x01, 0x40]);
    }

    #[test]
    fn test_send_step_clamps_overflowing_counts() {
        // 0x1000_0000 * 16 overflows u32; must saturate, then clamp to
        // the 24-bit wire field
        let mut controller = controller(&[1], 16);
        controller.send_step(1, 0x1000_0000, 100, 0).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        assert_eq!(&frame.data_slice()[4..7], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_seek_position_applies_factor() {
        let mut controller = controller(&[1], 16);
        controller.seek_position(1, -2, 50, 1).unwrap();

        let frame = controller.adapter.take_sent().unwrap();
        assert_eq!(frame.data_slice()[0], 0xFE);
        // -2 * 16 = -32 = 0xFFFFE0 in 24 bits
        assert_eq!(&frame.data_slice()[4..7], &[0xFF, 0xFF, 0xE0]);
    }

    #[test]
    fn test_send_timeout_surfaces_as_error() {
        let mut controller = controller(&[1], 1);
        controller.adapter.fail_next_sends(1);
        assert!(matches!(
            controller.get_position(1),
            Err(DriverError::Can(CanError::Timeout))
        ));
    }

    #[test]
    fn test_poll_swallows_timeout() {
        let mut controller = controller(&[1], 1);
        controller.poll(Duration::from_millis(1)).unwrap();
        assert!(controller.events().try_recv().is_err());
    }

    #[test]
    fn test_poll_drops_foreign_traffic() {
        let mut controller = controller(&[1], 1);
        controller
            .adapter
            .inject(MksFrame::new_standard(0x09, &[0x33, 0x00, 0x00, 0x00, 0x20, 0x5D]));

        controller.poll(Duration::from_millis(1)).unwrap();
        assert!(controller.events().try_recv().is_err());
    }

    #[test]
    fn test_poll_delivers_move_status() {
        let mut controller = controller(&[3], 1);
        controller
            .adapter
            .inject(MksFrame::new_standard(0x03, &[0xFD, 0x02, 0x02]));

        controller.poll(Duration::from_millis(1)).unwrap();
        assert_eq!(
            controller.events().try_recv(),
            Ok(StepperEvent::SendStep {
                motor: 3,
                status: MoveStatus::Completed
            })
        );
    }

    #[test]
    fn test_position_query_end_to_end() {
        let mut controller = controller(&[1], 16);
        controller.get_position(1).unwrap();

        // query on the wire
        let query = controller.adapter.take_sent().unwrap();
        assert_eq!(query.data_slice(), &[0x33, 0x34]);

        // device answers 32 raw steps; factor 16 makes that 2 nominal
        controller
            .adapter
            .inject(MksFrame::new_standard(0x01, &[0x33, 0x00, 0x00, 0x00, 0x20, 0x55]));
        controller.poll(Duration::from_millis(1)).unwrap();

        assert_eq!(
            controller.events().try_recv(),
            Ok(StepperEvent::Position {
                motor: 1,
                position: 2
            })
        );
    }
}
