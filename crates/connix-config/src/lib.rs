//! Configuration for connector processes.
//!
//! TOML settings file + `CONNIX_`-prefixed environment overrides,
//! and translation to `connix_core::RuntimeConfig`. Hosting binaries
//! depend on this crate — `connix-core` itself never reads config
//! files.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use connix_core::RuntimeConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML settings structs ───────────────────────────────────────────

/// Top-level TOML settings for one connector process.
#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    /// Snapshot file path. Defaults to `devices.json` under the
    /// platform data directory.
    pub snapshot_path: Option<PathBuf>,

    #[serde(default)]
    pub watchdog: Watchdog,

    #[serde(default)]
    pub shutdown: Shutdown,

    /// Capacity of the lifecycle event broadcast channels.
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            watchdog: Watchdog::default(),
            shutdown: Shutdown::default(),
            event_channel_capacity: default_event_capacity(),
        }
    }
}

/// Stale pending-write sweeping.
#[derive(Debug, Deserialize, Serialize)]
pub struct Watchdog {
    /// Disable to let pending writes sit unconfirmed forever.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds a write may sit unconfirmed before its state is
    /// invalidated.
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_secs: u64,

    /// Sweep period in seconds.
    #[serde(default = "default_watchdog_interval")]
    pub interval_secs: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_timeout_secs: default_stale_timeout(),
            interval_secs: default_watchdog_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Shutdown {
    /// Seconds to wait for in-flight device I/O before cancelling.
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self {
            grace_secs: default_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_stale_timeout() -> u64 {
    30
}
fn default_watchdog_interval() -> u64 {
    5
}
fn default_grace() -> u64 {
    10
}
fn default_event_capacity() -> usize {
    64
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("io", "connix", "connix").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default snapshot location when the settings file names none.
pub fn default_snapshot_path() -> PathBuf {
    ProjectDirs::from("io", "connix", "connix").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("devices.json");
            p
        },
        |dirs| dirs.data_dir().join("devices.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("connix");
    p
}

// ── Settings loading ────────────────────────────────────────────────

/// Load settings from file + environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Load settings from an explicit file, still honoring `CONNIX_*`
/// environment overrides.
pub fn load_settings_from(path: &std::path::Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CONNIX_").split("__"));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

/// Load settings, falling back to defaults on any failure.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_default()
}

/// Serialize settings to TOML and write to the canonical path.
pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    let path = settings_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Settings {
    /// Validate and translate into the core runtime tuning type.
    pub fn to_runtime(&self) -> Result<RuntimeConfig, ConfigError> {
        if self.watchdog.enabled && self.watchdog.interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "watchdog.interval_secs".into(),
                reason: "must be non-zero when the watchdog is enabled".into(),
            });
        }
        if self.watchdog.enabled && self.watchdog.stale_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "watchdog.stale_timeout_secs".into(),
                reason: "must be non-zero when the watchdog is enabled".into(),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "event_channel_capacity".into(),
                reason: "must be non-zero".into(),
            });
        }

        Ok(RuntimeConfig {
            snapshot_path: self
                .snapshot_path
                .clone()
                .unwrap_or_else(default_snapshot_path),
            pending_stale_timeout: self
                .watchdog
                .enabled
                .then(|| Duration::from_secs(self.watchdog.stale_timeout_secs)),
            watchdog_interval: Duration::from_secs(self.watchdog.interval_secs),
            termination_grace: Duration::from_secs(self.shutdown.grace_secs),
            event_channel_capacity: self.event_channel_capacity,
        })
    }
}
