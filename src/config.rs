//! System configuration parameters
//!
//! Network credentials, timing and sensing constants for the EnvGuard
//! monitor. Hazard thresholds are deliberately absent: they are fixed in
//! [`crate::classifier`].
//!
//! Defaults can be overridden at build time with a JSON document in the
//! `ENVGUARD_CONFIG_JSON` environment variable (see [`SystemConfig::from_json`]).

use heapless::String;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How long waits (alert patterns, reconnect backoff) are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Every wait is an unconditional sleep; the loop stalls until it ends.
    Blocking,
    /// Waits are state machines advanced by the main loop step.
    Cooperative,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- WiFi ---
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,

    // --- MQTT ---
    /// Broker URL, e.g. `mqtt://192.168.1.10:1883`
    pub mqtt_broker_url: String<96>,
    pub mqtt_client_id: String<32>,
    pub mqtt_username: String<32>,
    pub mqtt_password: String<64>,
    /// Prepended to every metric key (empty = bare keys)
    pub topic_prefix: String<32>,
    /// Fixed wait between reconnect attempts (milliseconds)
    pub reconnect_interval_ms: u32,

    // --- Timing ---
    /// Pipeline tick interval (milliseconds)
    pub tick_interval_ms: u32,
    /// Main loop step for cooperative mode (milliseconds)
    pub loop_step_ms: u32,
    pub execution_mode: ExecutionMode,

    // --- Bring-up ---
    /// Bring-up attempts before the supervisor halts
    pub bring_up_attempts: u8,
    pub bring_up_retry_delay_ms: u32,

    // --- Sensing ---
    /// Sea-level reference for altitude (hPa)
    pub sea_level_pressure_hpa: f32,
    /// Samples averaged for the MQ-2 R0 baseline
    pub calibration_samples: u8,
    pub calibration_interval_ms: u32,
    /// Sound level above which the transcript flags "elevated" (dB)
    pub loud_threshold_db: f32,
}

/// Upper bound on `calibration_samples` (fixed sample buffer).
pub const MAX_CALIBRATION_SAMPLES: u8 = 64;

fn text<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    // Defaults are compile-time literals well inside capacity.
    let _ = out.push_str(s);
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // WiFi
            wifi_ssid: String::new(),
            wifi_password: String::new(),

            // MQTT
            mqtt_broker_url: text("mqtt://192.168.1.10:1883"),
            mqtt_client_id: text("ESP32Client"),
            mqtt_username: String::new(),
            mqtt_password: String::new(),
            topic_prefix: String::new(),
            reconnect_interval_ms: 5000,

            // Timing
            tick_interval_ms: 10_000,
            loop_step_ms: 50,
            execution_mode: ExecutionMode::Cooperative,

            // Bring-up
            bring_up_attempts: 3,
            bring_up_retry_delay_ms: 2000,

            // Sensing
            sea_level_pressure_hpa: 1013.25,
            calibration_samples: 10,
            calibration_interval_ms: 100,
            loud_threshold_db: 70.0,
        }
    }
}

impl SystemConfig {
    /// Parse an override document. Missing fields keep their defaults.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(doc).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults merged with the `ENVGUARD_CONFIG_JSON` document captured at
    /// build time, if any.
    pub fn from_build_env() -> Self {
        Self::resolve(option_env!("ENVGUARD_CONFIG_JSON"))
    }

    /// An unusable override falls back to defaults rather than failing boot.
    pub fn resolve(doc: Option<&str>) -> Self {
        match doc.map(Self::from_json) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warn!("config: override ignored ({}), using defaults", e);
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Reject values that would break the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("reconnect_interval_ms must be > 0"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        if self.loop_step_ms == 0 || self.loop_step_ms > self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "loop_step_ms must be in 1..=tick_interval_ms",
            ));
        }
        if self.bring_up_attempts == 0 {
            return Err(ConfigError::ValidationFailed("bring_up_attempts must be > 0"));
        }
        if self.calibration_samples == 0 || self.calibration_samples > MAX_CALIBRATION_SAMPLES {
            return Err(ConfigError::ValidationFailed("calibration_samples must be in 1..=64"));
        }
        if !(800.0..=1200.0).contains(&self.sea_level_pressure_hpa) {
            return Err(ConfigError::ValidationFailed(
                "sea_level_pressure_hpa outside 800-1200",
            ));
        }
        if !(30.0..=100.0).contains(&self.loud_threshold_db) {
            return Err(ConfigError::ValidationFailed("loud_threshold_db outside 30-100"));
        }
        if self.mqtt_broker_url.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_broker_url empty"));
        }
        Ok(())
    }
}
