// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use hapcam_core::{validate_cameras, CameraRuntimeConfig, HapCamError};
use hapcam_snapshot::SnapshotSettings;
use hapcam_stream::TranscoderSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::Level;

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    /// Format for file logging: "text" (default) or "json"
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: "./hapcam.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

/// OpenTelemetry metrics configuration.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// OTLP/HTTP metrics endpoint (e.g. `http://localhost:4318/v1/metrics`).
    /// Metrics are collected but not exported when unset.
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub otlp_headers: HashMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enable: true, otlp_endpoint: None, otlp_headers: HashMap::new() }
    }
}

const fn default_bridge_join_timeout_ms() -> u64 {
    5000
}

/// EX_TEMPFAIL: the supervisor is expected to start the gateway again.
const fn default_restart_exit_code() -> i32 {
    75
}

/// Bridge teardown policy.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ShutdownConfig {
    /// How long to wait for a bridge thread after asking it to stop.
    #[serde(default = "default_bridge_join_timeout_ms")]
    pub bridge_join_timeout_ms: u64,
    /// Exit code used when a bridge thread does not stop in time and the
    /// gateway has to be restarted as a whole.
    #[serde(default = "default_restart_exit_code")]
    pub restart_exit_code: i32,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            bridge_join_timeout_ms: default_bridge_join_timeout_ms(),
            restart_exit_code: default_restart_exit_code(),
        }
    }
}

impl ShutdownConfig {
    pub const fn bridge_join_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge_join_timeout_ms)
    }
}

/// One HomeKit bridge and the cameras it exposes.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct BridgeConfig {
    pub name: String,
    #[serde(default)]
    pub cameras: Vec<CameraRuntimeConfig>,
}

/// Root configuration for the camera gateway.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub transcoder: TranscoderSettings,

    #[serde(default)]
    pub snapshots: SnapshotSettings,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,
}

impl Config {
    /// Every camera across all bridges.
    pub fn cameras(&self) -> impl Iterator<Item = &CameraRuntimeConfig> {
        self.bridges.iter().flat_map(|b| b.cameras.iter())
    }

    /// Checks bridge names and every camera. Camera keys must be unique across bridges.
    ///
    /// # Errors
    ///
    /// Returns `HapCamError::Configuration` describing the first problem found.
    pub fn validate(&self) -> Result<(), HapCamError> {
        let mut names = HashSet::new();
        for bridge in &self.bridges {
            if bridge.name.trim().is_empty() {
                return Err(HapCamError::Configuration("bridge name must not be empty".to_string()));
            }
            if !names.insert(bridge.name.as_str()) {
                return Err(HapCamError::Configuration(format!(
                    "bridge name '{}' is used more than once",
                    bridge.name
                )));
            }
        }
        validate_cameras(self.cameras())
    }
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads the configuration from defaults, a TOML file, and `HAPCAM_` environment variables.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file exists but contains invalid TOML syntax
/// - Environment variables are set but contain invalid values
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment =
        Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;

    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("HAPCAM_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration as a pretty-printed TOML string.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized to TOML.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    let default_config = Config::default();
    toml::to_string_pretty(&default_config)
}
