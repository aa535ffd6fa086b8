//! Time-driven movement model for a single linear actuator.
//!
//! [`MovementModel`] is a two-state machine:
//!
//! | State | Meaning |
//! |---|---|
//! | [`MotionState::Idle`] | No movement in flight; position is held at the target. |
//! | [`MotionState::Moving`] | A [`Movement`] is interpolating towards its target. |
//!
//! [`MovementModel::start_movement`] always enters `Moving` (the newest
//! command wins, nothing is queued or blended) and [`MovementModel::tick`]
//! returns to `Idle` once the movement's duration has elapsed.  Interpolation
//! is linear with no easing.
//!
//! All time arguments are monotonic [`Instant`]s supplied by the caller so the
//! model stays deterministic under test.

use std::time::{Duration, Instant};

use handysim_types::{Command, MovementProgress, RenderSnapshot};
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Position the actuator rests at on power-up (centre of travel).
pub const HOME_POSITION: f64 = 0.5;

/// Shortest movement the model will execute.
pub const MIN_MOVE_DURATION_MS: u32 = 10;

/// Physical length of full travel, used to express speed in mm/s.
pub const NOMINAL_STROKE_MM: f64 = 125.0;

/// Moves shorter than this fraction of travel report zero speed.
const SPEED_DEADBAND: f64 = 0.001;

// ─────────────────────────────────────────────────────────────────────────────
// Movement
// ─────────────────────────────────────────────────────────────────────────────

/// A linear interpolation between two positions over a fixed time window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub start_position: f64,
    pub target_position: f64,
    pub duration_ms: u32,
    pub start_time: Instant,
}

impl Movement {
    /// Milliseconds since the movement started; zero if `now` precedes it.
    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.start_time).as_nanos() as f64 / 1_000_000.0
    }

    /// `true` once `now` is at or past the end of the movement.
    pub fn is_complete(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start_time)
            >= Duration::from_millis(u64::from(self.duration_ms))
    }

    /// Interpolated position at `now`, pinned to the target once complete.
    pub fn position_at(&self, now: Instant) -> f64 {
        if self.is_complete(now) {
            return self.target_position;
        }
        let fraction = self.elapsed_ms(now) / f64::from(self.duration_ms);
        self.start_position + (self.target_position - self.start_position) * fraction
    }

    /// Progress and remaining time at `now`.
    pub fn progress_at(&self, now: Instant) -> MovementProgress {
        let elapsed = self.elapsed_ms(now);
        let duration = f64::from(self.duration_ms);
        MovementProgress {
            progress: (elapsed / duration).clamp(0.0, 1.0),
            remaining_ms: (duration - elapsed).max(0.0),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MovementModel
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse state of the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Moving,
}

/// Position, target, speed and in-flight movement of one simulated actuator.
#[derive(Debug, Clone)]
pub struct MovementModel {
    current_position: f64,
    target_position: f64,
    /// mm/s, recomputed on every `start_movement`.
    speed: f64,
    current_movement: Option<Movement>,
    stroke_mm: f64,
    last_command: String,
}

impl Default for MovementModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementModel {
    /// Create an idle model resting at [`HOME_POSITION`].
    pub fn new() -> Self {
        Self {
            current_position: HOME_POSITION,
            target_position: HOME_POSITION,
            speed: 0.0,
            current_movement: None,
            stroke_mm: NOMINAL_STROKE_MM,
            last_command: String::new(),
        }
    }

    /// Override the full-travel distance used for speed reporting
    /// (builder-style).  Non-positive values are ignored.
    pub fn with_stroke_mm(mut self, stroke_mm: f64) -> Self {
        if stroke_mm > 0.0 {
            self.stroke_mm = stroke_mm;
        }
        self
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Begin moving towards `position` over `duration_ms`, replacing any
    /// movement already in flight.
    ///
    /// `position` is clamped to `0.0..=1.0` (NaN holds the current position)
    /// and `duration_ms` is raised to at least [`MIN_MOVE_DURATION_MS`].  The
    /// new movement starts from the current interpolated position so motion
    /// never jumps.
    pub fn start_movement(&mut self, position: f64, duration_ms: i64, now: Instant) {
        // Bring the position up to date so a superseded movement hands over
        // from where the actuator actually is.
        self.tick(now);

        let target = if position.is_nan() {
            self.current_position
        } else {
            position.clamp(0.0, 1.0)
        };
        let duration_ms = u32::try_from(duration_ms.max(i64::from(MIN_MOVE_DURATION_MS)))
            .unwrap_or(u32::MAX);

        let distance = (target - self.current_position).abs();
        self.speed = if distance > SPEED_DEADBAND {
            distance * self.stroke_mm / (f64::from(duration_ms) / 1000.0)
        } else {
            0.0
        };

        let movement = Movement {
            start_position: self.current_position,
            target_position: target,
            duration_ms,
            start_time: now,
        };
        self.current_movement = Some(movement);
        self.target_position = target;

        info!(
            from_pct = movement.start_position * 100.0,
            to_pct = target * 100.0,
            duration_ms,
            speed_mms = self.speed,
            "movement started"
        );
    }

    /// Apply a decoded [`Command`] and remember its description for display.
    pub fn apply(&mut self, command: &Command, now: Instant) {
        self.last_command = command.describe();
        self.start_movement(command.position, i64::from(command.duration_ms), now);
    }

    /// Advance the model to `now`.
    ///
    /// No-op while idle.  Completes the movement (snapping to its target and
    /// zeroing speed) once its duration has elapsed.
    pub fn tick(&mut self, now: Instant) {
        let Some(movement) = self.current_movement else {
            return;
        };

        if movement.is_complete(now) {
            self.current_position = movement.target_position;
            self.speed = 0.0;
            self.current_movement = None;
        } else {
            self.current_position = movement.position_at(now).clamp(0.0, 1.0);
        }
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    pub fn state(&self) -> MotionState {
        if self.current_movement.is_some() {
            MotionState::Moving
        } else {
            MotionState::Idle
        }
    }

    pub fn current_position(&self) -> f64 {
        self.current_position
    }

    pub fn target_position(&self) -> f64 {
        self.target_position
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn current_movement(&self) -> Option<&Movement> {
        self.current_movement.as_ref()
    }

    pub fn last_command(&self) -> &str {
        &self.last_command
    }

    /// Build a consistent [`RenderSnapshot`] as of `now`.
    ///
    /// Positions reflect the last `tick`; only the movement progress is
    /// evaluated against `now`.
    pub fn snapshot(&self, now: Instant) -> RenderSnapshot {
        RenderSnapshot {
            current_position: self.current_position,
            target_position: self.target_position,
            moving: self.current_movement.is_some(),
            speed: self.speed,
            active_movement: self.current_movement.map(|m| m.progress_at(now)),
            last_command: self.last_command.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
