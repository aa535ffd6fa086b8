//! Generic `Actuator` trait for position-controlled linear hardware.
//!
//! The runtime's receive, physics and render activities only ever talk to this
//! trait.  Every method takes `&self`: implementations serialise access
//! internally so one handle can be shared between concurrently scheduled
//! tasks, and each call is atomic with respect to the others.

use std::time::Instant;

use handysim_types::{Command, RenderSnapshot};

/// A linear actuator driven by decoded [`Command`]s.
pub trait Actuator: Send + Sync {
    /// Stable identifier for this actuator, e.g. `"SimulatedHandy"`.
    fn id(&self) -> &str;

    /// Start moving towards `command.position`, superseding any movement in
    /// flight.  Never fails; out-of-range inputs are normalised.
    fn apply(&self, command: &Command, now: Instant);

    /// Advance the simulated physics to `now`.
    fn tick(&self, now: Instant);

    /// Consistent read-only view of the actuator as of `now`.
    fn snapshot(&self, now: Instant) -> RenderSnapshot;
}
