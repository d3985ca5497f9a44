//! Configuration module for Uroflow-RS
//!
//! This module handles application configuration including:
//! - Serial link parameters (port, baud rate, timeouts)
//! - Acquisition loop timing
//! - Chart scale hints for display collaborators
//! - Locations of the measurement history and rendered reports
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/id.edisonmedika.uroflow-rs/`
//! - **macOS**: `~/Library/Application Support/id.edisonmedika.uroflow-rs/`
//! - **Windows**: `%APPDATA%\id.edisonmedika.uroflow-rs\`
//!
//! # Files
//!
//! - `uroflow.toml` - Configuration (optional, defaults are used when missing)
//! - `history.json` - Saved measurements
//! - `reports/` - Rendered measurement reports
//! - `uroflow.log` - Application log
//!
//! # Example
//!
//! ```ignore
//! use uroflow_rs::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default(None);
//! config.link.port = "/dev/ttyACM0".to_string();
//! config.save(&uroflow_rs::config::default_config_path().unwrap())?;
//! ```

use crate::error::{Result, UroflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "id.edisonmedika.uroflow-rs";

/// Configuration filename
pub const CONFIG_FILE: &str = "uroflow.toml";

/// Log filename
pub const LOG_FILE: &str = "uroflow.log";

/// Default baud rate of the flow sensor
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default acquisition tick period in milliseconds
pub const DEFAULT_TICK_PERIOD_MS: u64 = 100;

/// Default serial read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default wait after opening the port (the sensor board resets on open)
pub const DEFAULT_SETTLE_MS: u64 = 2000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure a directory exists, creating it if needed
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| {
            UroflowError::Config(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }
    Ok(())
}

/// Get the path of the default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM3".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

// ==================== App Config ====================

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Serial link configuration
    #[serde(default)]
    pub link: LinkConfig,

    /// Acquisition loop configuration
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Chart configuration handed to display collaborators
    #[serde(default)]
    pub display: DisplayConfig,

    /// History and report locations
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            UroflowError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            UroflowError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load configuration from `path` (or the default location), returning
    /// defaults if the file is missing or invalid
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Self::default(),
            },
        };

        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| UroflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            UroflowError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

// ==================== Link Config ====================

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device (e.g. "COM3", "/dev/ttyUSB0")
    pub port: String,

    /// Bit rate
    pub baud_rate: u32,

    /// Read-readiness timeout in milliseconds
    pub timeout_ms: u64,

    /// Delay after opening before the device is ready, in milliseconds
    pub settle_ms: u64,

    /// Send the stop byte to the device when a session is stopped
    pub send_stop_byte: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            send_stop_byte: false,
        }
    }
}

impl LinkConfig {
    /// Read timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Settle delay as a Duration
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

// ==================== Acquisition Config ====================

/// Acquisition loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Period of the polling tick in milliseconds
    pub tick_period_ms: u64,

    /// Maximum number of lines consumed per tick
    pub max_lines_per_tick: usize,

    /// How long the operator handle waits for a command reply, in milliseconds
    pub command_timeout_ms: u64,

    /// Buffer size for channel communication
    pub channel_buffer_size: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            max_lines_per_tick: 8,
            command_timeout_ms: 2000,
            channel_buffer_size: 1024,
        }
    }
}

impl AcquisitionConfig {
    /// Tick period as a Duration (never zero)
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    /// Command reply timeout as a Duration
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

// ==================== Display Config ====================

/// Chart configuration for display collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Visible time window in seconds; the x axis scrolls once exceeded
    pub time_window_seconds: f64,

    /// Upper bound of the flow axis in mL/s
    pub max_flow_rate: f64,

    /// Upper bound of the volume axis in mL
    pub max_volume: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 60.0,
            max_flow_rate: 300.0,
            max_volume: 300.0,
        }
    }
}

// ==================== Storage Config ====================

/// Locations of the measurement history and reports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory (defaults to the app data directory)
    pub data_dir: Option<PathBuf>,

    /// History file name, relative to the base directory
    pub history_file: String,

    /// Reports directory, relative to the base directory
    pub reports_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            history_file: "history.json".to_string(),
            reports_dir: "reports".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve the base directory
    pub fn base_dir(&self) -> Result<PathBuf> {
        self.data_dir
            .clone()
            .or_else(app_data_dir)
            .ok_or_else(|| UroflowError::Config("Could not determine app data directory".into()))
    }

    /// Full path of the history file
    pub fn history_path(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(&self.history_file))
    }

    /// Full path of the reports directory
    pub fn reports_path(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(&self.reports_dir))
    }
}

// ==================== Tests ====================
