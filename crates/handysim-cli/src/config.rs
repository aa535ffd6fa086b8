//! Configuration – reads/writes `~/.handysim/config.toml`.

use handysim_hal::DecoderConfig;
use handysim_hal::decoder::{DEFAULT_DURATION_MS, DURATION_SENTINEL, MAX_DURATION_MS, MIN_DURATION_MS};
use handysim_hal::movement::NOMINAL_STROKE_MM;
use handysim_middleware::DeviceIdentity;
use handysim_middleware::wsdm::{DEFAULT_DEVICE_ADDRESS, DEFAULT_DEVICE_NAME, DEFAULT_WSDM_PORT, wsdm_url};
use handysim_runtime::CoordinatorConfig;
use handysim_runtime::display::DEFAULT_BAR_WIDTH;
use handysim_types::SimError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted simulator configuration stored in `~/.handysim/config.toml`.
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Host running the device WebSocket server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the device WebSocket server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Identifier and display name announced in the handshake.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_device_address")]
    pub device_address: String,

    /// Period of the physics and render loops.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Upper bound on one receive wait.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    /// Width of the rendered position track.
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,

    /// Full stroke length used for the speed readout.
    #[serde(default = "default_stroke_mm")]
    pub stroke_mm: f64,

    #[serde(default)]
    pub decoder: DecoderSection,
}

/// `[decoder]` table: constants of the duration heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderSection {
    #[serde(default = "default_sentinel")]
    pub sentinel: u8,
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u32,
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u32,
    #[serde(default = "default_default_duration_ms")]
    pub default_duration_ms: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    DEFAULT_WSDM_PORT
}
fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}
fn default_device_address() -> String {
    DEFAULT_DEVICE_ADDRESS.to_string()
}
fn default_update_interval_ms() -> u64 {
    20
}
fn default_recv_timeout_ms() -> u64 {
    100
}
fn default_bar_width() -> usize {
    DEFAULT_BAR_WIDTH
}
fn default_stroke_mm() -> f64 {
    NOMINAL_STROKE_MM
}
fn default_sentinel() -> u8 {
    DURATION_SENTINEL
}
fn default_min_duration_ms() -> u32 {
    MIN_DURATION_MS
}
fn default_max_duration_ms() -> u32 {
    MAX_DURATION_MS
}
fn default_default_duration_ms() -> u32 {
    DEFAULT_DURATION_MS
}

impl Default for DecoderSection {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            min_duration_ms: default_min_duration_ms(),
            max_duration_ms: default_max_duration_ms(),
            default_duration_ms: default_default_duration_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            device_name: default_device_name(),
            device_address: default_device_address(),
            update_interval_ms: default_update_interval_ms(),
            recv_timeout_ms: default_recv_timeout_ms(),
            bar_width: default_bar_width(),
            stroke_mm: default_stroke_mm(),
            decoder: DecoderSection::default(),
        }
    }
}

impl Config {
    /// `ws://host:port` of the device server.
    pub fn url(&self) -> String {
        wsdm_url(&self.host, self.port)
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::named(&self.device_name).with_address(&self.device_address)
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            sentinel: self.decoder.sentinel,
            min_duration_ms: self.decoder.min_duration_ms,
            max_duration_ms: self.decoder.max_duration_ms,
            default_duration_ms: self.decoder.default_duration_ms,
        }
    }

    /// Loop timings and rendering settings for the coordinator.  Zero
    /// intervals are raised to one millisecond.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            update_interval: Duration::from_millis(self.update_interval_ms.max(1)),
            recv_timeout: Duration::from_millis(self.recv_timeout_ms.max(1)),
            bar_width: self.bar_width,
            decoder: self.decoder_config(),
        }
    }
}

/// Return the path to `~/.handysim/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".handysim").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, SimError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Read the config file at `path` as written, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, SimError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| SimError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| SimError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `HANDYSIM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HANDYSIM_HOST` | `host` |
/// | `HANDYSIM_PORT` | `port` |
/// | `HANDYSIM_DEVICE_NAME` | `device_name` |
/// | `HANDYSIM_UPDATE_INTERVAL_MS` | `update_interval_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HANDYSIM_HOST") {
        cfg.host = v;
    }
    if let Ok(v) = std::env::var("HANDYSIM_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("HANDYSIM_DEVICE_NAME") {
        cfg.device_name = v;
    }
    if let Ok(v) = std::env::var("HANDYSIM_UPDATE_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.update_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.handysim/` if necessary.
pub fn save(cfg: &Config) -> Result<(), SimError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path, creating the parent directory.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), SimError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| SimError::Config(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SimError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| SimError::Config(format!("failed to write {}: {e}", path.display())))
}
