//! # MKS Stepper Driver
//!
//! High-level driver for MKS SERVO57D/42D/35D/28D stepper modules on a
//! shared CAN bus.
//!
//! The [`MksStepperController`] facade sends commands (constant speed,
//! relative step, absolute seek, position query) in nominal units and
//! delivers decoded responses as [`StepperEvent`]s through a channel.
//! Frame-level filtering lives in [`dispatch`], which tells genuine
//! responses apart from loop-back echoes and unrelated bus traffic.
//!
//! ## Quick start
//!
//! ```no_run
//! use mks_driver::{MksStepperController, StepperEvent};
//! use std::time::Duration;
//!
//! let mut controller =
//!     MksStepperController::open("can0", [1].into(), 16)?;
//!
//! controller.send_step(1, 400, 60, 2)?;
//! loop {
//!     controller.poll(Duration::from_millis(2))?;
//!     if let Ok(StepperEvent::SendStep { status, .. }) = controller.events().try_recv() {
//!         println!("move: {status:?}");
//!     }
//! }
//! # Ok::<(), mks_driver::DriverError>(())
//! ```

pub mod controller;
pub mod dispatch;
pub mod error;
pub mod events;

pub use controller::MksStepperController;
pub use dispatch::dispatch;
pub use error::DriverError;
pub use events::StepperEvent;

// Re-export the layers callers need to name
pub use mks_can::{CanAdapter, CanError, MksFrame};
pub use mks_protocol::{Direction, MoveStatus, ProtocolError};
