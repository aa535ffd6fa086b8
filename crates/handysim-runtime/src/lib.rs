//! `handysim-runtime` – The Session Engine
//!
//! Drives one simulator session from connection to disconnect.
//!
//! # Modules
//!
//! - [`coordinator`] – [`LoopCoordinator`][coordinator::LoopCoordinator]:
//!   schedules the receive, physics and render activities concurrently over a
//!   shared [`Actuator`][handysim_hal::Actuator] and stops all three as soon
//!   as any one of them ends.
//! - [`display`] – [`format_frame`][display::format_frame] and the
//!   [`Presenter`][display::Presenter] trait, with
//!   [`TerminalPresenter`][display::TerminalPresenter] redrawing frames in
//!   place on an ANSI terminal.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber (stderr, compact or JSON)
//!   with an optional OTLP span exporter.

pub mod coordinator;
pub mod display;
pub mod telemetry;

pub use coordinator::{CoordinatorConfig, LoopCoordinator, SessionEnd, handle_payload};
pub use display::{Presenter, TerminalPresenter, format_frame};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
