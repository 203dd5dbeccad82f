//! Unified error types for the EnvGuard firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! supervisor's error handling uniform. All variants are `Copy` so they can
//! be passed through the tick pipeline and into transcript events without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transducer could not be read or returned implausible data.
    Sensor(SensorError),
    /// Network or telemetry transport failure.
    Comms(CommsError),
    /// One-shot bring-up failed.
    Init(InitError),
    /// Configuration is invalid.
    Config(ConfigError),
    /// Firmware update session failed.
    Ota(OtaError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// I²C transfer to a transducer failed.
    BusError,
    /// The transducer did not finish its measurement in time.
    Timeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::BusError => write!(f, "I2C bus error"),
            Self::Timeout => write!(f, "measurement timed out"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    WifiConnectFailed,
    BrokerConnectFailed,
    NotConnected,
    MqttPublishFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::BrokerConnectFailed => write!(f, "MQTT broker connect failed"),
            Self::NotConnected => write!(f, "transport not connected"),
            Self::MqttPublishFailed => write!(f, "MQTT publish failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Bring-up errors
// ---------------------------------------------------------------------------

/// Failures of the one-shot startup contract.  Surfaced to the supervising
/// caller instead of halting inside the initialiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// Climate transducer did not answer or reported the wrong chip id.
    ClimateNotFound,
    /// Climate transducer rejected its configuration.
    ClimateConfigFailed,
    /// Pixel strip driver could not be started.
    IndicatorFailed,
    /// Gas sensor R0 baseline came out zero or non-finite.
    CalibrationFailed,
    /// Peripheral setup (ADC, GPIO) returned an ESP-IDF error code.
    Peripheral(i32),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClimateNotFound => write!(f, "climate sensor not found"),
            Self::ClimateConfigFailed => write!(f, "climate sensor configuration failed"),
            Self::IndicatorFailed => write!(f, "indicator init failed"),
            Self::CalibrationFailed => write!(f, "gas sensor calibration failed"),
            Self::Peripheral(rc) => write!(f, "peripheral init failed (rc={rc})"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Override document could not be parsed.
    Malformed,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "config document malformed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Firmware update errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// Update command could not be decoded.
    Malformed,
    AlreadyInProgress,
    /// Declared image size is zero or larger than the update partition.
    InvalidSize,
    BeginFailed,
    WriteFailed,
    /// Image digest or partition verification did not match.
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    NonSequential,
    Overflow,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "update command malformed"),
            Self::AlreadyInProgress => write!(f, "an update is already underway"),
            Self::InvalidSize => write!(f, "image size outside 1..=4 MiB"),
            Self::BeginFailed => write!(f, "cannot open the inactive app slot"),
            Self::WriteFailed => write!(f, "flash write to the app slot failed"),
            Self::VerifyFailed => write!(f, "image digest or header rejected"),
            Self::BootSetFailed => write!(f, "cannot select the new image for boot"),
            Self::IncompleteTransfer => write!(f, "image incomplete at finalize"),
            Self::NotReceiving => write!(f, "no update underway"),
            Self::NonSequential => write!(f, "chunk offset leaves a gap"),
            Self::Overflow => write!(f, "chunk runs past the announced image size"),
        }
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
