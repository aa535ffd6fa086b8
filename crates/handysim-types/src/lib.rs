use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A movement instruction recovered from an inbound device payload.
///
/// `position` is a fraction of the actuator's travel (`0.0` fully retracted,
/// `1.0` fully extended) and `duration_ms` is the time allowed to reach it
/// from wherever the actuator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub position: f64,
    pub duration_ms: u32,
}

impl Command {
    /// Human-readable summary used for logs and the `Last:` display line.
    pub fn describe(&self) -> String {
        format!(
            "Position={:.1}%, Duration={}ms",
            self.position * 100.0,
            self.duration_ms
        )
    }
}

/// Progress of the movement that is in flight at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementProgress {
    /// Elapsed fraction of the movement's duration, `0.0..=1.0`.
    pub progress: f64,
    /// Milliseconds left until the movement completes, never negative.
    pub remaining_ms: f64,
}

/// Read-only view of the actuator consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub current_position: f64,
    pub target_position: f64,
    pub moving: bool,
    /// Nominal stroke speed in mm/s; `0.0` while idle.
    pub speed: f64,
    pub active_movement: Option<MovementProgress>,
    /// Empty until the first command has been applied.
    pub last_command: String,
}

/// Global error type spanning transport failures, configuration problems and
/// presentation I/O.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimError {
    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Handshake Failed: {0}")]
    Handshake(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Presentation Error: {0}")]
    Presentation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_describe_formats_percent_and_duration() {
        let cmd = Command {
            position: 0.755,
            duration_ms: 250,
        };
        assert_eq!(cmd.describe(), "Position=75.5%, Duration=250ms");
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snap = RenderSnapshot {
            current_position: 0.5,
            target_position: 0.9,
            moving: true,
            speed: 500.0,
            active_movement: Some(MovementProgress {
                progress: 0.25,
                remaining_ms: 75.0,
            }),
            last_command: "Position=90.0%, Duration=100ms".to_string(),
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"moving\":true"));
        assert!(json.contains("remaining_ms"));
        let back: RenderSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn sim_error_display() {
        let err = SimError::Transport("reset by peer".to_string());
        assert!(err.to_string().contains("Transport Error"));
        assert!(err.to_string().contains("reset by peer"));

        assert_eq!(
            SimError::ConnectionClosed.to_string(),
            "Connection closed by server"
        );
    }
}
