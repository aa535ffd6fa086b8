//! Terminal presentation of the actuator state.
//!
//! [`format_frame`] turns a [`RenderSnapshot`] into a boxed text frame:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          TheHandy Simulator                          │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ [────────────█─────────────◦────────────]  30.0% →  70.0% ▶ MOVING @ 250 mm/s │
//! │ Progress: [████████░░░░░░░░░░░░] 40% | 120ms remaining │
//! └──────────────────────────────────────────────────────────────────────┘
//!   Last: Position=70.0%, Duration=200ms
//! ```
//!
//! A [`Presenter`] puts frames in front of a human.  The render activity only
//! calls it when a frame differs from the previous one.

use std::io::{self, Stdout, Write};

use handysim_types::{RenderSnapshot, SimError};

/// Width of the position track in cells.
pub const DEFAULT_BAR_WIDTH: usize = 40;

const PROGRESS_CELLS: usize = 20;
const FRAME_PADDING: usize = 30;
const TITLE: &str = "TheHandy Simulator";

const CURSOR_HOME: &str = "\x1b[H";
const CLEAR_TO_END: &str = "\x1b[J";
const CLEAR_SCREEN: &str = "\x1b[2J";

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

fn cell_index(fraction: f64, width: usize) -> usize {
    ((fraction * width as f64) as usize).min(width)
}

/// Position track with `█` at the current position and `◦` at the target,
/// followed by percentages and the motion status.
pub fn position_bar(position: f64, target: f64, moving: bool, speed_mms: f64, width: usize) -> String {
    let mut track = vec!['─'; width];

    let target_idx = cell_index(target, width);
    if target_idx < width {
        track[target_idx] = '◦';
    }
    let position_idx = cell_index(position, width);
    if position_idx < width {
        track[position_idx] = '█';
    }

    let status = match (moving, speed_mms > 0.0) {
        (true, true) => format!("▶ MOVING @ {speed_mms:.0} mm/s"),
        (true, false) => "▶ MOVING".to_string(),
        (false, _) => "■ IDLE".to_string(),
    };

    format!(
        "[{}] {:5.1}% → {:5.1}% {}",
        track.into_iter().collect::<String>(),
        position * 100.0,
        target * 100.0,
        status
    )
}

/// Twenty-cell progress bar with percentage and time remaining.
pub fn progress_bar(progress: f64, remaining_ms: f64) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = ((progress * PROGRESS_CELLS as f64) as usize).min(PROGRESS_CELLS);
    format!(
        "Progress: [{}{}] {:.0}% | {:.0}ms remaining",
        "█".repeat(filled),
        "░".repeat(PROGRESS_CELLS - filled),
        progress * 100.0,
        remaining_ms
    )
}

/// Render the full boxed frame for `snapshot`.
pub fn format_frame(snapshot: &RenderSnapshot, bar_width: usize) -> String {
    let inner = bar_width + FRAME_PADDING;
    let content = inner.saturating_sub(2);
    let rule = "─".repeat(inner);
    let row = |text: &str| format!("│ {text:^content$} │");

    let mut lines = vec![
        format!("┌{rule}┐"),
        row(TITLE),
        format!("├{rule}┤"),
        row(&position_bar(
            snapshot.current_position,
            snapshot.target_position,
            snapshot.moving,
            snapshot.speed,
            bar_width,
        )),
    ];
    if let Some(active) = snapshot.active_movement {
        lines.push(row(&progress_bar(active.progress, active.remaining_ms)));
    }
    lines.push(format!("└{rule}┘"));
    if !snapshot.last_command.is_empty() {
        lines.push(format!("  Last: {}", snapshot.last_command));
    }

    lines.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Presenter
// ─────────────────────────────────────────────────────────────────────────────

/// Consumer of rendered frames.  Has no way to feed back into the model.
pub trait Presenter: Send {
    /// Show `frame`, replacing whatever was shown before.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Presentation`] if the output cannot be written.
    /// The render activity logs the error and retries on its next tick.
    fn draw(&mut self, frame: &str) -> Result<(), SimError>;
}

/// Redraws frames in place on an ANSI terminal.
pub struct TerminalPresenter<W: Write + Send = Stdout> {
    out: W,
}

impl TerminalPresenter<Stdout> {
    /// Presenter writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Clear the whole screen and home the cursor.  Call once before the
    /// first frame.
    pub fn clear(&mut self) -> Result<(), SimError> {
        self.write_all(&format!("{CLEAR_SCREEN}{CURSOR_HOME}"))
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_all(&mut self, text: &str) -> Result<(), SimError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| SimError::Presentation(e.to_string()))
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn draw(&mut self, frame: &str) -> Result<(), SimError> {
        self.write_all(&format!("{CURSOR_HOME}{CLEAR_TO_END}{frame}\n"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
