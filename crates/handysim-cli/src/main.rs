//! `handysim-cli` – TheHandy Simulator command line entry point
//!
//! This binary connects a simulated linear actuator to a device-control
//! server's WebSocket Device Manager endpoint.  It:
//!
//! 1. Loads `~/.handysim/config.toml`, writing the defaults on first run.
//! 2. Connects to the server and announces the simulated device.
//! 3. Runs the receive, physics and render loops until the server closes the
//!    connection or the operator presses **Ctrl-C**.

mod config;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use handysim_hal::{MovementModel, SimActuator};
use handysim_middleware::WsdmTransport;
use handysim_runtime::{LoopCoordinator, SessionEnd, TerminalPresenter};
use handysim_types::SimError;

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // Logs go to stderr; stdout belongs to the rendered frame.
    let _guard = handysim_runtime::init_tracing("handysim");

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = load_config();

    print_banner(&cfg);

    // ── Shared stop flag ──────────────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping …".yellow().bold());
        stop_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with a server-side disconnect instead");
    }

    // The runtime is built after init_tracing so the OTLP simple exporter
    // never needs one at init time.
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let code = report(runtime.block_on(run_session(&cfg, stop)));
    println!("\nDisconnected");
    code
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// How often a pending connect re-checks the stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Connect, then run the coordinator until the session ends.
///
/// A raised stop flag abandons a connect that is still in flight.
async fn run_session(cfg: &config::Config, stop: Arc<AtomicBool>) -> Result<SessionEnd, SimError> {
    let url = cfg.url();
    let identity = cfg.identity();

    let transport = tokio::select! {
        result = WsdmTransport::connect(&url, &identity) => result?,
        () = wait_for_stop(&stop) => {
            info!(url = %url, "stop requested while connecting");
            return Ok(SessionEnd::Stopped);
        }
    };

    println!("{} Connected as '{}'", "✓".green().bold(), identity.name.bold());
    println!("Listening for commands... (Press Ctrl+C to stop)\n");

    let model = MovementModel::new().with_stroke_mm(cfg.stroke_mm);
    let actuator = Arc::new(SimActuator::with_model(identity.identifier.clone(), model));

    let mut presenter = TerminalPresenter::stdout();
    if let Err(e) = presenter.clear() {
        warn!(error = %e, "could not clear terminal");
    }

    let coordinator = LoopCoordinator::new(actuator, cfg.coordinator_config()).with_stop_flag(stop);
    let end = coordinator.run(transport, presenter).await;
    info!(?end, "session ended");
    Ok(end)
}

async fn wait_for_stop(stop: &AtomicBool) {
    let mut interval = tokio::time::interval(STOP_POLL_INTERVAL);
    loop {
        interval.tick().await;
        if stop.load(Ordering::SeqCst) {
            return;
        }
    }
}

/// Print the outcome of a session and map it to the process exit status.
fn report(outcome: Result<SessionEnd, SimError>) -> ExitCode {
    match outcome {
        Ok(SessionEnd::TransportClosed) => {
            println!("\n{}", "Connection closed by server.".yellow());
            ExitCode::SUCCESS
        }
        Ok(SessionEnd::Stopped) => {
            println!("\n{}", "Stopped.".green());
            ExitCode::SUCCESS
        }
        Ok(SessionEnd::Faulted(reason)) => {
            println!("\n{}: {}", "Session aborted".red().bold(), reason);
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("{}: {}", "Could not connect".red().bold(), e);
            println!(
                "  {}",
                "Make sure the server is running with the device websocket server enabled.".dimmed()
            );
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let defaults = config::Config::default();
            match config::save(&defaults) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            with_env_overrides(defaults)
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            with_env_overrides(config::Config::default())
        }
    }
}

fn with_env_overrides(mut cfg: config::Config) -> config::Config {
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(cfg: &config::Config) {
    let rule = "═".repeat(62);
    println!();
    println!("{}", rule.bold().cyan());
    println!(
        "  {} {}",
        "TheHandy Simulator".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Websocket Device Manager (WSDM) Client");
    println!("{}", rule.bold().cyan());
    println!();
    println!("  Connecting to: {}", cfg.url().bold());
    println!("  Make sure the server is running with");
    println!("  the device websocket server enabled\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config_for(port: u16) -> config::Config {
        config::Config {
            host: "127.0.0.1".to_string(),
            port,
            ..config::Config::default()
        }
    }

    #[tokio::test]
    async fn stop_abandons_a_stalled_connect() {
        // Accepts TCP but never answers the WebSocket upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let stop = Arc::new(AtomicBool::new(true));
        let outcome = tokio::time::timeout(Duration::from_secs(3), run_session(&config_for(port), stop))
            .await
            .expect("run_session must return once stop is raised");
        assert_eq!(outcome, Ok(SessionEnd::Stopped));

        server.abort();
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let stop = Arc::new(AtomicBool::new(false));
        let outcome = run_session(&config_for(port), stop).await;
        assert!(matches!(outcome, Err(SimError::Transport(_))));
    }
}
