//! EnvGuard Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter    LogEventSink   DisplayBoard   Esp32Time    │
//! │  (Sensor+Indicator) (EventSink)    (Presentation) (clock)      │
//! │  WifiAdapter        MqttTransport          OtaUpdater          │
//! │  (NetworkPort)      (TelemetryTransport)   (OtaPort)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            MonitorService (pure logic)                 │    │
//! │  │  Acquisition · Classifier · AlertSequencer · Reporter  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ConnectivityManager (WiFi + MQTT session, fixed retry)        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::TxRmtDriver;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use envguard::adapters::display::DisplayBoard;
use envguard::adapters::hardware::HardwareAdapter;
use envguard::adapters::log_sink::LogEventSink;
use envguard::adapters::mqtt::MqttTransport;
use envguard::adapters::ota::OtaUpdater;
use envguard::adapters::time::{Esp32TimeAdapter, StepTimer};
use envguard::adapters::wifi::WifiAdapter;
use envguard::app::ports::NetworkPort;
use envguard::app::service::MonitorService;
use envguard::config::{ExecutionMode, SystemConfig};
use envguard::connectivity::ConnectivityManager;
use envguard::drivers::bme680::Bme680;
use envguard::drivers::indicator::{Buzzer, PixelStrip};
use envguard::error::{Error, InitError};
use envguard::ota::confirm_running_image;
use envguard::pins;
use envguard::sensors::gas::GasSensor;
use envguard::sensors::sound::SoundSensor;
use envguard::sensors::SensorHub;

/// Park the task after an unrecoverable bring-up failure.  The error is
/// re-logged periodically so it shows on any console attached later.
fn halt(e: InitError) -> ! {
    loop {
        error!("HALTED: bring-up failed: {}", e);
        FreeRtos::delay_ms(60_000);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("EnvGuard v{}", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::from_build_env();
    info!(
        "config: mode={:?} tick={}ms step={}ms broker={}",
        config.execution_mode, config.tick_interval_ms, config.loop_step_ms, config.mqtt_broker_url
    );

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── 2. Sensors + indicators ───────────────────────────────
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let climate = Bme680::new(i2c, FreeRtos, pins::BME680_ADDRESS);
    let hub = SensorHub::new(
        GasSensor::new(pins::MQ2_ADC_GPIO),
        SoundSensor::new(pins::KY038_ADC_GPIO),
        climate,
    );

    let rmt = TxRmtDriver::new(
        peripherals.rmt.channel0,
        peripherals.pins.gpio16,
        &TransmitConfig::new().clock_divider(1),
    )?;
    let pixels = PixelStrip::new(rmt).map_err(Error::from)?;
    let mut hw = HardwareAdapter::new(hub, pixels, Buzzer::new(pins::BUZZER_GPIO));

    // ── 3. Network + telemetry ────────────────────────────────
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    let mut network = WifiAdapter::new(wifi);
    if let Err(e) = network.set_credentials(&config.wifi_ssid, &config.wifi_password) {
        warn!("WiFi credentials rejected: {}", e);
    }
    let (mut updater, update_inbox) = OtaUpdater::new();
    let transport = MqttTransport::new(&config).with_update_inbox(update_inbox);
    info!("OTA: listening on {}+", transport.update_topic_root());
    let mut conn = ConnectivityManager::new(network, transport, config.reconnect_interval_ms);

    // ── 4. Bring-up (bounded retry, then controlled halt) ─────
    let mut sink = LogEventSink::new();
    let mut display = DisplayBoard::new();
    let mut delay = FreeRtos;
    let mut service = MonitorService::new(config.clone());

    match service.bring_up_with_retry(&mut hw, &mut delay, &mut sink) {
        Ok(attempt) => info!("bring-up complete (attempt {})", attempt),
        Err(e) => halt(e),
    }
    confirm_running_image();

    // ── 5. Tick loop ──────────────────────────────────────────
    match config.execution_mode {
        ExecutionMode::Blocking => loop {
            service.tick_blocking(
                &mut hw,
                &mut conn,
                &mut updater,
                &mut delay,
                &mut sink,
                &mut display,
            );
            if service.update_ready() {
                updater.reboot();
            }
            FreeRtos::delay_ms(config.tick_interval_ms);
        },
        ExecutionMode::Cooperative => {
            let clock = Esp32TimeAdapter::new();
            let mut timer = StepTimer::start(clock.uptime_ms());
            loop {
                let delta = timer.lap(clock.uptime_ms());
                service.step(delta, &mut hw, &mut conn, &mut updater, &mut sink, &mut display);
                if service.update_ready() {
                    updater.reboot();
                }
                FreeRtos::delay_ms(config.loop_step_ms);
            }
        }
    }
}
