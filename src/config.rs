//! Configuration system using Figment.
//!
//! Strongly-typed configuration loaded from:
//! 1. `config/sentinel.toml` (base configuration)
//! 2. Environment variables (prefixed with `CRASH_SENTINEL_`)
//!
//! Every section carries defaults, so a missing file yields a usable
//! configuration for simulation and tests.
//!
//! # Example
//! ```no_run
//! use crash_sentinel::config::SentinelConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SentinelConfig::load()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use crate::notify::Recipient;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SentinelConfig {
    /// Application settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Telemetry transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Classification settings.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Alert guard and dispatch settings.
    #[serde(default)]
    pub alert: AlertConfig,
    /// Emergency recipients (stand-in for the external contact store).
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Telemetry transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3").
    #[serde(default = "default_port")]
    pub port: String,
    /// Communication speed.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

/// Classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Acceleration threshold in m/s² for the rule-based predictor.
    #[serde(default = "default_accel_threshold")]
    pub accel_threshold: f32,
    /// Gyroscope threshold in rad/s for the rule-based predictor.
    #[serde(default = "default_gyro_threshold")]
    pub gyro_threshold: f32,
    /// Probability cutoff above which a sample is judged a likely accident.
    #[serde(default = "default_alert_probability")]
    pub alert_probability: f32,
    /// Path to the ONNX collision model. Absent means threshold-only.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            accel_threshold: default_accel_threshold(),
            gyro_threshold: default_gyro_threshold(),
            alert_probability: default_alert_probability(),
            model_path: None,
        }
    }
}

/// Alert guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Cooldown window before the guard re-arms (e.g. "300s", "5m").
    #[serde(with = "humantime_serde", default = "default_cooldown")]
    pub cooldown: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown: default_cooldown(),
        }
    }
}

// Default value functions
fn default_name() -> String {
    "Crash Sentinel".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_accel_threshold() -> f32 {
    crate::classifier::ACCEL_THRESHOLD
}

fn default_gyro_threshold() -> f32 {
    crate::classifier::GYRO_THRESHOLD
}

fn default_alert_probability() -> f32 {
    crate::classifier::ALERT_PROBABILITY
}

fn default_cooldown() -> Duration {
    Duration::from_secs(300)
}

impl SentinelConfig {
    /// Load configuration from `config/sentinel.toml` and environment
    /// variables.
    ///
    /// Environment variables can override configuration with prefix
    /// `CRASH_SENTINEL_`, e.g. `CRASH_SENTINEL_TRANSPORT_PORT=/dev/ttyACM0`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config/sentinel.toml")
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CRASH_SENTINEL_").split("_"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.transport.port.is_empty() {
            return Err("Transport port must not be empty".to_string());
        }
        if self.transport.baud_rate == 0 {
            return Err("Transport baud_rate must be greater than zero".to_string());
        }

        if !self.detection.accel_threshold.is_finite() || self.detection.accel_threshold <= 0.0 {
            return Err(format!(
                "Invalid accel_threshold {}. Must be a positive number",
                self.detection.accel_threshold
            ));
        }
        if !self.detection.gyro_threshold.is_finite() || self.detection.gyro_threshold <= 0.0 {
            return Err(format!(
                "Invalid gyro_threshold {}. Must be a positive number",
                self.detection.gyro_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.alert_probability)
            || self.detection.alert_probability == 0.0
        {
            return Err(format!(
                "Invalid alert_probability {}. Must be in (0, 1]",
                self.detection.alert_probability
            ));
        }

        if self.alert.cooldown.is_zero() {
            return Err("Alert cooldown must be greater than zero".to_string());
        }

        Ok(())
    }
}
