//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MonitorService (domain)
//! ```
//!
//! Driven adapters (sensors, indicators, network, telemetry, updates, sinks)
//! implement these traits.  The [`MonitorService`](super::service::MonitorService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.

use crate::drivers::alert_patterns::Rgb;
use crate::error::{CommsError, InitError, OtaError, SensorError};
use crate::sensors::climate::{ClimateSample, ClimateSetup};

use super::events::{AppEvent, PresentationView};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain raw transducer data.
pub trait SensorPort {
    /// Probe and configure the transducers.  Called once per bring-up
    /// attempt, before any read.
    fn begin(&mut self, setup: &ClimateSetup) -> Result<(), InitError>;

    /// One forced-mode climate measurement.
    fn read_climate(&mut self) -> Result<ClimateSample, SensorError>;

    /// Settle the MQ-2 channel and return its sensing resistance (kΩ).
    fn read_gas_rs(&mut self) -> Result<f32, SensorError>;

    /// Sound sample in `[0, 1023]`.
    fn read_sound_raw(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the pixel strip and buzzer.
pub trait IndicatorPort {
    /// Fill every pixel with one colour and latch it.
    fn set_pixels(&mut self, colour: Rgb);

    /// Set a single pixel, leaving the others as they are, and latch.
    fn set_pixel(&mut self, index: usize, colour: Rgb);

    fn set_buzzer(&mut self, on: bool);

    /// Pixels dark, buzzer released.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sinks (driven adapters: domain → logging / display)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.  The
/// production adapter writes them to the serial transcript.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

/// Receives the per-tick views for the local display.
pub trait PresentationSink {
    fn render(&mut self, view: &PresentationView);
}

// ───────────────────────────────────────────────────────────────
// Network + telemetry transport
// ───────────────────────────────────────────────────────────────

/// Network session (WiFi station).
pub trait NetworkPort {
    fn connect(&mut self) -> Result<(), CommsError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), CommsError>;
}

/// Telemetry transport session (MQTT).
pub trait TelemetryTransport {
    fn connect(&mut self) -> Result<(), CommsError>;
    fn is_connected(&self) -> bool;

    /// Fire-and-forget publish at the transport's default QoS.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Firmware update channel
// ───────────────────────────────────────────────────────────────

/// Where the firmware update channel stands after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtaProgress {
    #[default]
    Idle,
    Receiving { written: u32, total: u32 },
    /// The new image is verified and marked bootable.
    ReadyToReboot,
}

/// Firmware update channel, serviced from the main loop.
pub trait OtaPort {
    /// Handle whatever update work is pending and report progress.
    /// Must return promptly; at most one image chunk is written per call.
    fn poll(&mut self) -> Result<OtaProgress, OtaError>;
}
