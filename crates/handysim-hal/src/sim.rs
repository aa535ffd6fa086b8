//! In-process simulated linear actuator.
//!
//! [`SimActuator`] wraps a [`MovementModel`] behind a mutex and implements
//! [`Actuator`], so the receive, physics and render activities can share one
//! `Arc<SimActuator>` without ever observing a half-applied update.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use handysim_hal::actuator::Actuator;
//! use handysim_hal::sim::SimActuator;
//! use handysim_types::Command;
//!
//! let act = SimActuator::new("SimulatedHandy");
//! let t0 = Instant::now();
//! act.apply(&Command { position: 0.9, duration_ms: 100 }, t0);
//! act.tick(t0 + Duration::from_millis(100));
//!
//! assert_eq!(act.snapshot(t0).current_position, 0.9);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use handysim_types::{Command, RenderSnapshot};

use crate::actuator::Actuator;
use crate::movement::MovementModel;

/// A simulated actuator whose position follows a [`MovementModel`].
pub struct SimActuator {
    id: String,
    model: Mutex<MovementModel>,
}

impl SimActuator {
    /// Create a simulated actuator idle at the centre of travel.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_model(id, MovementModel::new())
    }

    /// Create a simulated actuator around a pre-configured model.
    pub fn with_model(id: impl Into<String>, model: MovementModel) -> Self {
        Self {
            id: id.into(),
            model: Mutex::new(model),
        }
    }

    /// Start a movement from raw, possibly out-of-range, inputs.
    pub fn start_movement(&self, position: f64, duration_ms: i64, now: Instant) {
        self.lock().start_movement(position, duration_ms, now);
    }

    /// Position as of the most recent tick.
    pub fn current_position(&self) -> f64 {
        self.lock().current_position()
    }

    /// Run `f` against the locked model.  Keep `f` short; every activity
    /// contends for the same lock.
    pub fn with_model_ref<R>(&self, f: impl FnOnce(&MovementModel) -> R) -> R {
        f(&self.lock())
    }

    // Every update leaves the model consistent before returning, so a poisoned
    // lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, MovementModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, command: &Command, now: Instant) {
        self.lock().apply(command, now);
    }

    fn tick(&self, now: Instant) {
        self.lock().tick(now);
    }

    fn snapshot(&self, now: Instant) -> RenderSnapshot {
        self.lock().snapshot(now)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
