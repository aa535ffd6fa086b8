//! `handysim-hal` – The Simulated Actuator
//!
//! Everything that stands in for physical hardware.
//!
//! # Modules
//!
//! - [`decoder`] – [`CommandDecoder`]: heuristic recovery of a
//!   `(position, duration)` pair from an opaque binary payload.
//! - [`movement`] – [`MovementModel`]: the Idle/Moving state machine that
//!   linearly interpolates position over a movement's duration.
//! - [`actuator`] – the [`Actuator`] trait the runtime drives.
//! - [`sim`] – [`SimActuator`]: a mutex-guarded [`MovementModel`] that can be
//!   shared between concurrently scheduled activities.

pub mod actuator;
pub mod decoder;
pub mod movement;
pub mod sim;

pub use actuator::Actuator;
pub use decoder::{CommandDecoder, DecoderConfig};
pub use movement::{MotionState, Movement, MovementModel};
pub use sim::SimActuator;
