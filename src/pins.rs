//! GPIO / peripheral pin assignments for the EnvGuard board (ESP32-WROOM).
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I²C bus (BME680 climate sensor, SH1106 display)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
pub const I2C_FREQ_HZ: u32 = 100_000;
/// BME680 with SDO pulled high.
pub const BME680_ADDRESS: u8 = 0x77;

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1, 12-bit)
// ---------------------------------------------------------------------------

/// MQ-2 gas sensor analog output.  GPIO 39 = ADC1 channel 3.
pub const MQ2_ADC_GPIO: i32 = 39;
pub const MQ2_ADC_CHANNEL: u32 = 3;

/// KY-038 sound sensor analog output.  GPIO 34 = ADC1 channel 6.
pub const KY038_ADC_GPIO: i32 = 34;
pub const KY038_ADC_CHANNEL: u32 = 6;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// WS2812 data line (RMT channel 0).
pub const NEOPIXEL_GPIO: i32 = 16;
pub const NUM_PIXELS: usize = 5;

/// Active-high piezo buzzer.
pub const BUZZER_GPIO: i32 = 25;
