//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                  |
//! |------------|--------------------|------------------------------|
//! | `hardware` | SensorPort         | ESP32 ADC, BME680 over I²C   |
//! |            | IndicatorPort      | WS2812 strip (RMT), buzzer   |
//! | `log_sink` | EventSink          | Serial log output            |
//! | `display`  | PresentationSink   | Display page state           |
//! | `wifi`     | NetworkPort        | ESP-IDF WiFi STA             |
//! | `mqtt`     | TelemetryTransport | ESP-IDF MQTT client          |
//! | `ota`      | OtaPort            | Inactive OTA app partition   |
//! | `time`     | —                  | ESP32 system timer, delays   |

pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod ota;
pub mod time;
pub mod wifi;
