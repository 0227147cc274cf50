//! Inbound frame routing.
//!
//! The bus is shared: besides responses to our own commands it carries our
//! looped-back outbound frames, traffic for motors other tools own, and
//! command bytes this driver does not model. Routing is therefore a
//! filter: a frame either decodes into a [`StepperEvent`] or is dropped,
//! and dropping is not an error.

use crate::events::StepperEvent;
use mks_protocol::commands::{CURRENT_POS, SEEK_POS_BY_STEPS, SEND_STEP, SET_SPEED};
use mks_protocol::{
    CurrentPositionResponse, MksFrame, SeekPositionResponse, SendStepResponse, SetSpeedResponse,
};
use std::collections::HashSet;
use tracing::{trace, warn};

/// Routes one inbound frame.
///
/// Returns `None` for anything that is not a well-formed response from a
/// known motor: extended frames, unknown addresses, empty payloads,
/// unmodeled command bytes, and loop-back echoes of our own commands
/// (told apart by payload length). The returned `Position` event carries
/// the raw device position; normalisation is the caller's job.
pub fn dispatch(motor_ids: &HashSet<u16>, frame: &MksFrame) -> Option<StepperEvent> {
    if frame.is_extended {
        trace!("Ignoring extended frame: ID=0x{:X}", frame.id);
        return None;
    }
    if !motor_ids.contains(&frame.id) {
        trace!("Ignoring frame from unknown address 0x{:X}", frame.id);
        return None;
    }

    let data = frame.data_slice();
    let command = *data.first()?;

    let decoded = match command {
        SET_SPEED => SetSpeedResponse::try_from(*frame)
            .map(|r| StepperEvent::SetSpeed {
                motor: r.motor,
                success: r.success,
            }),
        SEND_STEP => SendStepResponse::try_from(*frame)
            .map(|r| StepperEvent::SendStep {
                motor: r.motor,
                status: r.status,
            }),
        SEEK_POS_BY_STEPS => SeekPositionResponse::try_from(*frame)
            .map(|r| StepperEvent::SeekPosition {
                motor: r.motor,
                status: r.status,
            }),
        CURRENT_POS => CurrentPositionResponse::try_from(*frame)
            .map(|r| StepperEvent::Position {
                motor: r.motor,
                position: r.position,
            }),
        _ => {
            // Normal traffic for command bytes we do not model
            trace!(
                "Ignoring frame with unmodeled command 0x{:02X} from 0x{:X}",
                command, frame.id
            );
            return None;
        },
    };

    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            // Loop-back echoes land here via the length check; real
            // malformed responses are worth a warning either way.
            warn!(
                "Dropping undecodable 0x{:02X} frame from 0x{:X}: {}",
                command, frame.id, e
            );
            None
        },
    }
}
