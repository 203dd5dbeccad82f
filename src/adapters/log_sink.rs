//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART in production).  Reading blocks come out as one labelled
//! line per scalar followed by the qualitative note, which is the serial
//! transcript operators watch.

use log::{error, info, warn};

use crate::app::events::{AppEvent, BringUpStep, SensorGroup};
use crate::app::ports::EventSink;

const RULE: &str = "----------------------------";

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn step_label(step: BringUpStep) -> &'static str {
    match step {
        BringUpStep::Buzzer => "Buzzer",
        BringUpStep::Pixels => "NeoPixels",
        BringUpStep::Climate => "BME680",
        BringUpStep::Sound => "Sound sensor",
        BringUpStep::GasCalibration => "MQ-2",
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::BringUpStep(step) => {
                info!("INIT  | {} initialized", step_label(*step));
            }
            AppEvent::Calibrated { r0_kohm } => {
                info!("INIT  | MQ-2 calibrated, R0={:.2} kOhm", r0_kohm);
            }
            AppEvent::Started => {
                info!("START | monitoring");
            }
            AppEvent::BringUpFailed { attempt, error: e } => {
                error!("INIT  | attempt {} failed: {}", attempt, e);
            }
            AppEvent::SensorReadFailed { group, error: e } => {
                let name = match group {
                    SensorGroup::Climate => "BME680",
                    SensorGroup::Gas => "MQ-2",
                };
                warn!("READ  | {} reading failed: {}", name, e);
            }
            AppEvent::Gas { reading, note } => {
                info!("MQ-2 Sensor Readings:");
                info!("LPG: {:.1} ppm", reading.lpg_ppm);
                info!("CO: {:.1} ppm", reading.co_ppm);
                info!("Smoke: {:.1} ppm", reading.smoke_ppm);
                info!("Gas {}", note.text());
                info!("{}", RULE);
            }
            AppEvent::Environment(env) => {
                info!("BME680 Sensor Readings:");
                info!("Temperature: {:.1} \u{00b0}C", env.temperature_c);
                info!("Relative Humidity: {:.1} %", env.humidity_pct);
                info!("Barometric Pressure: {:.1} hPa", env.pressure_hpa);
                info!("Gas Resistance: {:.1} kOhms", env.gas_resistance_kohm);
                info!("Altitude: {:.1} m", env.altitude_m);
                info!("{}", RULE);
            }
            AppEvent::Sound { reading, note } => {
                info!("KY-038 Sound Sensor Readings:");
                info!("Sound Level: {:.1} dB", reading.level_db);
                info!("Sound {}", note.text());
                info!("{}", RULE);
            }
            AppEvent::HazardChanged { from, to } => match from {
                Some(prev) => info!("HAZARD | {} -> {}", prev, to),
                None => info!("HAZARD | initial {}", to),
            },
            AppEvent::Alert { status, outcome } => {
                info!("ALERT | {} ({:?})", status, outcome);
            }
            AppEvent::LinkChanged { from, to } => {
                info!("LINK  | {:?} -> {:?}", from, to);
            }
            AppEvent::ConnectFailed(e) => {
                warn!("LINK  | connect failed: {}", e);
            }
            AppEvent::Published { tick, summary } => {
                info!(
                    "MQTT  | tick {} published={} failed={} skipped={}",
                    tick, summary.published, summary.failed, summary.skipped
                );
            }
            AppEvent::OtaStarted { total } => {
                info!("OTA   | receiving {} byte image", total);
            }
            AppEvent::OtaReady => {
                info!("OTA   | image verified, rebooting");
            }
            AppEvent::OtaFailed(e) => {
                warn!("OTA   | update failed: {}", e);
            }
        }
    }
}
