//! [`LoopCoordinator`] – runs the simulator's three activities.
//!
//! | Activity | Period | Work |
//! |---|---|---|
//! | Receive | event-driven, bounded wait | pull from the [`Transport`], decode binary payloads, apply commands |
//! | Physics | `update_interval` | [`Actuator::tick`] |
//! | Render | `update_interval` | snapshot, format, hand to the [`Presenter`] when the frame changed |
//!
//! Each activity is a Tokio task sharing one [`Actuator`] handle.  The
//! actuator serialises `apply`, `tick` and `snapshot` internally and no lock
//! is held across an `.await`, so every update is atomic with respect to the
//! other activities.
//!
//! # Shutdown
//!
//! Whichever activity finishes first (transport closed, stop flag raised,
//! task failure) ends the session: the coordinator raises the shared stop
//! flag, waits up to a short grace period for the other two to notice it
//! between iterations, aborts any straggler, and returns a [`SessionEnd`].
//! A dead connection therefore never leaves the actuator animating against
//! stale commands.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use handysim_hal::SimActuator;
//! use handysim_middleware::channel;
//! use handysim_runtime::coordinator::{CoordinatorConfig, LoopCoordinator};
//! use handysim_runtime::display::TerminalPresenter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (_tx, transport) = channel::channel(16);
//!     let actuator = Arc::new(SimActuator::new("SimulatedHandy"));
//!     let end = LoopCoordinator::new(actuator, CoordinatorConfig::default())
//!         .run(transport, TerminalPresenter::stdout())
//!         .await;
//!     println!("session ended: {end:?}");
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use handysim_hal::decoder::hex_preview;
use handysim_hal::{Actuator, CommandDecoder, DecoderConfig};
use handysim_middleware::{Inbound, Transport};
use handysim_types::Command;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::display::{DEFAULT_BAR_WIDTH, Presenter, format_frame};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default period of the physics and render activities.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(20);

/// Default upper bound on a single wait for an inbound message.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// How long the surviving activities get to wind down once the session ends.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Text frames are logged truncated to this many characters.
const TEXT_PREVIEW_CHARS: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`LoopCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Period of the physics and render activities.
    pub update_interval: Duration,
    /// Upper bound on one transport wait; the stop flag is checked at least
    /// this often.
    pub recv_timeout: Duration,
    /// Width of the position track in the rendered frame.
    pub bar_width: usize,
    /// Constants of the duration heuristic.
    pub decoder: DecoderConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            bar_width: DEFAULT_BAR_WIDTH,
            decoder: DecoderConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome types
// ─────────────────────────────────────────────────────────────────────────────

/// One of the coordinator's concurrently scheduled activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Receive,
    Physics,
    Render,
}

/// Why an individual activity returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActivityExit {
    TransportClosed,
    Stopped,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote end closed the connection.
    TransportClosed,
    /// The stop flag was raised (operator interrupt or caller request).
    Stopped,
    /// An activity task panicked or was cancelled by the runtime.
    Faulted(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// LoopCoordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the shared actuator handle and the stop flag for one session.
pub struct LoopCoordinator {
    actuator: Arc<dyn Actuator>,
    decoder: CommandDecoder,
    config: CoordinatorConfig,
    stop: Arc<AtomicBool>,
}

impl LoopCoordinator {
    /// Create a coordinator driving `actuator`.
    pub fn new(actuator: Arc<dyn Actuator>, config: CoordinatorConfig) -> Self {
        Self {
            actuator,
            decoder: CommandDecoder::new(config.decoder),
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned stop flag (builder-style), e.g. one raised
    /// by a Ctrl-C handler.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that ends the session when set to `true`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Return a clone of the shared actuator handle.
    pub fn actuator(&self) -> Arc<dyn Actuator> {
        Arc::clone(&self.actuator)
    }

    /// Run the receive, physics and render activities until the first of
    /// them finishes, then wind the others down.
    ///
    /// The transport is closed before this returns.
    pub async fn run<T, P>(&self, transport: T, presenter: P) -> SessionEnd
    where
        T: Transport + 'static,
        P: Presenter + 'static,
    {
        let mut tasks: JoinSet<(Activity, ActivityExit)> = JoinSet::new();

        tasks.spawn(receive_loop(
            transport,
            Arc::clone(&self.actuator),
            self.decoder,
            self.config.recv_timeout,
            Arc::clone(&self.stop),
        ));
        tasks.spawn(physics_loop(
            Arc::clone(&self.actuator),
            self.config.update_interval,
            Arc::clone(&self.stop),
        ));
        tasks.spawn(render_loop(
            presenter,
            Arc::clone(&self.actuator),
            self.config.update_interval,
            self.config.bar_width,
            Arc::clone(&self.stop),
        ));

        let end = match tasks.join_next().await {
            Some(Ok((activity, exit))) => {
                info!(?activity, ?exit, "activity finished; ending session");
                match exit {
                    ActivityExit::TransportClosed => SessionEnd::TransportClosed,
                    ActivityExit::Stopped => SessionEnd::Stopped,
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "activity task failed; ending session");
                SessionEnd::Faulted(e.to_string())
            }
            None => SessionEnd::Stopped,
        };

        self.stop.store(true, Ordering::Release);

        let drained = time::timeout(SHUTDOWN_GRACE, async {
            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok((activity, exit)) => debug!(?activity, ?exit, "activity stopped"),
                    Err(e) => error!(error = %e, "activity task failed during shutdown"),
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(grace_ms = SHUTDOWN_GRACE.as_millis() as u64, "activities overran shutdown grace; aborting");
            tasks.shutdown().await;
        }

        end
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Activities
// ─────────────────────────────────────────────────────────────────────────────

/// Decode `data` and, on success, apply the command to `actuator`.
///
/// Unrecognised payloads are logged with a hex preview and dropped.
pub fn handle_payload(
    decoder: &CommandDecoder,
    actuator: &dyn Actuator,
    data: &[u8],
    now: Instant,
) -> Option<Command> {
    match decoder.decode(data) {
        Some(command) => {
            info!(
                actuator = actuator.id(),
                position_pct = command.position * 100.0,
                duration_ms = command.duration_ms,
                "linear command"
            );
            actuator.apply(&command, now);
            Some(command)
        }
        None => {
            debug!(len = data.len(), preview = %hex_preview(data), "unrecognised payload");
            None
        }
    }
}

async fn receive_loop<T: Transport>(
    mut transport: T,
    actuator: Arc<dyn Actuator>,
    decoder: CommandDecoder,
    recv_timeout: Duration,
    stop: Arc<AtomicBool>,
) -> (Activity, ActivityExit) {
    let exit = loop {
        if stop.load(Ordering::Acquire) {
            break ActivityExit::Stopped;
        }

        match time::timeout(recv_timeout, transport.recv()).await {
            Err(_) => continue,
            Ok(Ok(Inbound::Binary(data))) => {
                handle_payload(&decoder, actuator.as_ref(), &data, Instant::now());
            }
            Ok(Ok(Inbound::Text(text))) => {
                let preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
                debug!(text = %preview, "text frame ignored");
            }
            Ok(Ok(Inbound::Closed)) => {
                warn!("connection closed by server");
                break ActivityExit::TransportClosed;
            }
            Ok(Err(e)) => error!(error = %e, "error receiving; continuing"),
        }
    };

    if let Err(e) = transport.close().await {
        warn!(error = %e, "transport close failed");
    }
    (Activity::Receive, exit)
}

async fn physics_loop(
    actuator: Arc<dyn Actuator>,
    period: Duration,
    stop: Arc<AtomicBool>,
) -> (Activity, ActivityExit) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if stop.load(Ordering::Acquire) {
            return (Activity::Physics, ActivityExit::Stopped);
        }
        actuator.tick(Instant::now());
    }
}

async fn render_loop<P: Presenter>(
    mut presenter: P,
    actuator: Arc<dyn Actuator>,
    period: Duration,
    bar_width: usize,
    stop: Arc<AtomicBool>,
) -> (Activity, ActivityExit) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_frame = String::new();

    loop {
        interval.tick().await;
        if stop.load(Ordering::Acquire) {
            return (Activity::Render, ActivityExit::Stopped);
        }

        let frame = format_frame(&actuator.snapshot(Instant::now()), bar_width);
        if frame == last_frame {
            continue;
        }
        match presenter.draw(&frame) {
            Ok(()) => last_frame = frame,
            Err(e) => error!(error = %e, "error in display loop; continuing"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use handysim_hal::SimActuator;
    use handysim_middleware::channel::{self, ChannelSender};
    use handysim_types::SimError;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingPresenter {
        frames: Arc<Mutex<Vec<String>>>,
    }

    impl Presenter for RecordingPresenter {
        fn draw(&mut self, frame: &str) -> Result<(), SimError> {
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    /// Fails the first `failures` draws, then records like
    /// [`RecordingPresenter`].
    struct FlakyPresenter {
        failures: usize,
        inner: RecordingPresenter,
    }

    impl Presenter for FlakyPresenter {
        fn draw(&mut self, frame: &str) -> Result<(), SimError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(SimError::Presentation("broken pipe".to_string()));
            }
            self.inner.draw(frame)
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            update_interval: Duration::from_millis(5),
            recv_timeout: Duration::from_millis(20),
            ..CoordinatorConfig::default()
        }
    }

    /// Sentinel-marked single-byte varint duration followed by the position.
    fn payload(position: f64, duration_ms: u8) -> Vec<u8> {
        assert!(duration_ms < 0x80);
        let mut data = vec![0x10, duration_ms];
        data.extend_from_slice(&position.to_le_bytes());
        data
    }

    fn start(
        actuator: Arc<SimActuator>,
        presenter: impl Presenter + 'static,
    ) -> (
        ChannelSender,
        Arc<AtomicBool>,
        tokio::task::JoinHandle<SessionEnd>,
    ) {
        let (tx, transport) = channel::channel(2048);
        let coordinator = LoopCoordinator::new(actuator, fast_config());
        let stop = coordinator.stop_handle();
        let handle = tokio::spawn(async move { coordinator.run(transport, presenter).await });
        (tx, stop, handle)
    }

    async fn finish(handle: tokio::task::JoinHandle<SessionEnd>) -> SessionEnd {
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session must end promptly")
            .expect("coordinator task must not panic")
    }

    #[test]
    fn handle_payload_applies_recognised_commands() {
        let act = SimActuator::new("test");
        let decoder = CommandDecoder::default();
        let now = Instant::now();

        let cmd = handle_payload(&decoder, &act, &payload(0.75, 100), now).unwrap();
        assert_eq!(cmd.position, 0.75);
        assert_eq!(cmd.duration_ms, 100);
        assert_eq!(act.snapshot(now).target_position, 0.75);
    }

    #[test]
    fn handle_payload_drops_unrecognised_bytes() {
        let act = SimActuator::new("test");
        let decoder = CommandDecoder::default();
        let now = Instant::now();

        assert!(handle_payload(&decoder, &act, &[0xFF; 16], now).is_none());
        let snap = act.snapshot(now);
        assert!(!snap.moving);
        assert!(snap.last_command.is_empty());
    }

    #[tokio::test]
    async fn closed_transport_ends_session() {
        let act = Arc::new(SimActuator::new("test"));
        let (tx, stop, handle) = start(Arc::clone(&act), RecordingPresenter::default());

        tx.send_binary(payload(0.75, 40)).await.unwrap();
        drop(tx);

        assert_eq!(finish(handle).await, SessionEnd::TransportClosed);
        assert!(stop.load(Ordering::Acquire), "stop flag must be raised for the other activities");

        let snap = act.snapshot(Instant::now());
        assert_eq!(snap.target_position, 0.75);
        assert_eq!(snap.last_command, "Position=75.0%, Duration=40ms");
    }

    #[tokio::test]
    async fn stop_flag_ends_session() {
        let act = Arc::new(SimActuator::new("test"));
        let (_tx, stop, handle) = start(act, RecordingPresenter::default());

        time::sleep(Duration::from_millis(50)).await;
        stop.store(true, Ordering::Release);

        assert_eq!(finish(handle).await, SessionEnd::Stopped);
    }

    #[tokio::test]
    async fn physics_animates_to_target() {
        let act = Arc::new(SimActuator::new("test"));
        let (tx, stop, handle) = start(Arc::clone(&act), RecordingPresenter::default());

        tx.send_binary(payload(1.0, 50)).await.unwrap();
        time::sleep(Duration::from_millis(250)).await;

        let snap = act.snapshot(Instant::now());
        assert!(!snap.moving);
        assert_eq!(snap.current_position, 1.0);
        assert_eq!(snap.speed, 0.0);

        stop.store(true, Ordering::Release);
        assert_eq!(finish(handle).await, SessionEnd::Stopped);
    }

    #[tokio::test]
    async fn text_frames_and_read_faults_do_not_end_session() {
        let act = Arc::new(SimActuator::new("test"));
        let (tx, _stop, handle) = start(Arc::clone(&act), RecordingPresenter::default());

        tx.send_text("{\"status\":\"ok\"}").await.unwrap();
        tx.send_error(SimError::Transport("bad frame".to_string()))
            .await
            .unwrap();
        tx.send_binary(vec![0xAB; 4]).await.unwrap();
        tx.send_binary(payload(0.2, 30)).await.unwrap();
        tx.close().await.unwrap();

        assert_eq!(finish(handle).await, SessionEnd::TransportClosed);
        assert_eq!(act.snapshot(Instant::now()).target_position, 0.2);
    }

    #[tokio::test]
    async fn render_skips_unchanged_frames() {
        let act = Arc::new(SimActuator::new("test"));
        let presenter = RecordingPresenter::default();
        let frames = Arc::clone(&presenter.frames);
        let (_tx, stop, handle) = start(act, presenter);

        time::sleep(Duration::from_millis(100)).await;
        stop.store(true, Ordering::Release);
        finish(handle).await;

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1, "an idle actuator renders exactly one frame");
        assert!(frames[0].contains("■ IDLE"));
    }

    #[tokio::test]
    async fn render_retries_after_presenter_error() {
        let act = Arc::new(SimActuator::new("test"));
        let inner = RecordingPresenter::default();
        let frames = Arc::clone(&inner.frames);
        let (_tx, stop, handle) = start(act, FlakyPresenter { failures: 2, inner });

        time::sleep(Duration::from_millis(100)).await;
        stop.store(true, Ordering::Release);
        assert_eq!(finish(handle).await, SessionEnd::Stopped);

        assert_eq!(frames.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rapid_commands_keep_position_in_bounds() {
        let act = Arc::new(SimActuator::new("test"));
        let (tx, _stop, handle) = start(Arc::clone(&act), RecordingPresenter::default());

        let probe = {
            let act = Arc::clone(&act);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let snap = act.snapshot(Instant::now());
                    assert!((0.0..=1.0).contains(&snap.current_position));
                    assert!(snap.speed >= 0.0);
                    tokio::task::yield_now().await;
                }
            })
        };

        for i in 0..1_000u32 {
            let position = f64::from(i % 101) / 100.0;
            let duration = 10 + (i % 100) as u8;
            tx.send_binary(payload(position, duration)).await.unwrap();
        }
        tx.close().await.unwrap();

        assert_eq!(finish(handle).await, SessionEnd::TransportClosed);
        probe.await.expect("probe must not observe out-of-range state");

        let snap = act.snapshot(Instant::now());
        assert!((0.0..=1.0).contains(&snap.current_position));
        assert_eq!(snap.target_position, f64::from(999 % 101) / 100.0);
    }
}
