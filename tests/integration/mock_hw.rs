//! Mock adapters for integration tests.
//!
//! Every port records what the service asked of it so tests can assert on
//! the full command history without touching GPIO, RMT or a real broker.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use envguard::app::events::{AppEvent, PresentationView};
use envguard::app::ports::{
    EventSink, IndicatorPort, NetworkPort, OtaPort, OtaProgress, PresentationSink, SensorPort,
    TelemetryTransport,
};
use envguard::config::SystemConfig;
use envguard::connectivity::ConnectivityManager;
use envguard::drivers::alert_patterns::{Rgb, OFF};
use envguard::error::{CommsError, InitError, OtaError, SensorError};
use envguard::sensors::climate::{ClimateSample, ClimateSetup};

/// MQ-2 sensing resistance that classifies Safe once R0 = 15 kΩ.
pub const RS_SAFE: f32 = 225.0;
/// Clean-air Rs (ratio 9.83): CO comes out near 30 ppm, a Warning.
pub const RS_WARNING: f32 = 147.45;
/// Heavy contamination: every species past the Danger limits.
pub const RS_DANGER: f32 = 5.0;
/// Rs during calibration: R0 = 147.45 / 9.83 = 15 kΩ.
pub const RS_CALIBRATION: f32 = 147.45;

// ── Indicator call record ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorCall {
    Fill(Rgb),
    Pixel(usize, Rgb),
    Buzzer(bool),
    AllOff,
}

// ── MockHw ────────────────────────────────────────────────────

pub struct MockHw {
    pub calls: Vec<IndicatorCall>,
    pub begin_results: VecDeque<Result<(), InitError>>,
    pub climate: VecDeque<Result<ClimateSample, SensorError>>,
    pub gas: VecDeque<Result<f32, SensorError>>,
    /// Returned once `gas` is drained.
    pub gas_default: f32,
    pub sound_raw: u16,
    pub begins: u32,
    pub gas_reads: u32,
}

#[allow(dead_code)]
impl MockHw {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            begin_results: VecDeque::new(),
            climate: VecDeque::new(),
            gas: VecDeque::new(),
            gas_default: RS_CALIBRATION,
            sound_raw: 300,
            begins: 0,
            gas_reads: 0,
        }
    }

    /// Queue the three per-tick MQ-2 reads.
    pub fn script_gas_tick(&mut self, rs: f32) {
        for _ in 0..3 {
            self.gas.push_back(Ok(rs));
        }
    }

    pub fn buzzer_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                IndicatorCall::Buzzer(on) => Some(*on),
                IndicatorCall::AllOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Colour last written to the whole strip.
    pub fn strip_colour(&self) -> Rgb {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                IndicatorCall::Fill(rgb) => Some(*rgb),
                IndicatorCall::AllOff => Some(OFF),
                _ => None,
            })
            .unwrap_or(OFF)
    }

    pub fn fills(&self) -> Vec<Rgb> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                IndicatorCall::Fill(rgb) => Some(*rgb),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockHw {
    fn default() -> Self {
        Self::new()
    }
}

pub fn climate_sample(temperature_c: f32) -> ClimateSample {
    ClimateSample {
        temperature_c,
        humidity_pct: 42.0,
        pressure_pa: 100_000.0,
        gas_resistance_ohm: 75_000.0,
    }
}

impl SensorPort for MockHw {
    fn begin(&mut self, _setup: &ClimateSetup) -> Result<(), InitError> {
        self.begins += 1;
        self.begin_results.pop_front().unwrap_or(Ok(()))
    }

    fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.climate
            .pop_front()
            .unwrap_or(Ok(climate_sample(22.5)))
    }

    fn read_gas_rs(&mut self) -> Result<f32, SensorError> {
        self.gas_reads += 1;
        self.gas.pop_front().unwrap_or(Ok(self.gas_default))
    }

    fn read_sound_raw(&mut self) -> u16 {
        self.sound_raw
    }
}

impl IndicatorPort for MockHw {
    fn set_pixels(&mut self, colour: Rgb) {
        self.calls.push(IndicatorCall::Fill(colour));
    }

    fn set_pixel(&mut self, index: usize, colour: Rgb) {
        self.calls.push(IndicatorCall::Pixel(index, colour));
    }

    fn set_buzzer(&mut self, on: bool) {
        self.calls.push(IndicatorCall::Buzzer(on));
    }

    fn all_off(&mut self) {
        self.calls.push(IndicatorCall::AllOff);
    }
}

// ── Network + transport ───────────────────────────────────────

#[derive(Default)]
pub struct MockNet {
    pub up: bool,
    pub failures_left: u32,
    pub connects: u32,
}

impl NetworkPort for MockNet {
    fn connect(&mut self) -> Result<(), CommsError> {
        self.connects += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(CommsError::WifiConnectFailed);
        }
        self.up = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.up = false;
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn set_credentials(&mut self, _ssid: &str, _password: &str) -> Result<(), CommsError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTransport {
    pub up: bool,
    pub connects: u32,
    pub messages: Vec<(String, String, bool)>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn topics(&self) -> Vec<&str> {
        self.messages.iter().map(|(t, _, _)| t.as_str()).collect()
    }

    pub fn payload(&self, topic: &str) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|(t, _, _)| t == topic)
            .map(|(_, p, _)| p.as_str())
    }
}

impl TelemetryTransport for MockTransport {
    fn connect(&mut self) -> Result<(), CommsError> {
        self.connects += 1;
        self.up = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        self.messages.push((
            topic.to_owned(),
            String::from_utf8_lossy(payload).into_owned(),
            retain,
        ));
        Ok(())
    }
}

pub type MockConn = ConnectivityManager<MockNet, MockTransport>;

/// Link manager whose WiFi fails `failures` times before coming up.
pub fn mock_conn(config: &SystemConfig, failures: u32) -> MockConn {
    let net = MockNet {
        failures_left: failures,
        ..Default::default()
    };
    ConnectivityManager::new(net, MockTransport::default(), config.reconnect_interval_ms)
}

// ── Update channel ────────────────────────────────────────────

/// Plays back scripted poll results, then holds the last progress.
#[derive(Default)]
pub struct MockOta {
    pub script: VecDeque<Result<OtaProgress, OtaError>>,
    pub polls: u32,
    current: OtaProgress,
}

impl OtaPort for MockOta {
    fn poll(&mut self) -> Result<OtaProgress, OtaError> {
        self.polls += 1;
        match self.script.pop_front() {
            Some(Ok(progress)) => {
                self.current = progress;
                Ok(progress)
            }
            Some(Err(e)) => {
                self.current = OtaProgress::Idle;
                Err(e)
            }
            None => Ok(self.current),
        }
    }
}

// ── Sinks ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

#[derive(Default)]
pub struct ViewSink {
    pub views: Vec<PresentationView>,
}

impl PresentationSink for ViewSink {
    fn render(&mut self, view: &PresentationView) {
        self.views.push(*view);
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Accumulates requested sleep time instead of sleeping.
#[derive(Default)]
pub struct CountingDelay {
    pub total_ms: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}

/// Test config: fast calibration, everything else default.
pub fn test_config() -> SystemConfig {
    SystemConfig {
        calibration_samples: 4,
        calibration_interval_ms: 10,
        ..SystemConfig::default()
    }
}
