//! KY-038 sound sensor driver.
//!
//! The module's analog output is sampled through ADC1 and mapped linearly
//! from the raw domain `[0, 1023]` onto `[30, 100]` dB.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH6 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::readings::SoundReading;

#[cfg(not(target_os = "espidf"))]
static SIM_SOUND_RAW: AtomicU16 = AtomicU16::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_sound_raw(raw: u16) {
    SIM_SOUND_RAW.store(raw, Ordering::Relaxed);
}

/// Upper bound of the raw input domain.
pub const RAW_MAX: u16 = 1023;
pub const DB_MIN: f32 = 30.0;
pub const DB_MAX: f32 = 100.0;

/// Map a raw sample onto the dB scale.  Inputs above [`RAW_MAX`] are clamped.
pub fn raw_to_db(raw: u16) -> f32 {
    let raw = raw.min(RAW_MAX) as f32;
    DB_MIN + (DB_MAX - DB_MIN) * raw / RAW_MAX as f32
}

pub struct SoundSensor {
    _adc_gpio: i32,
}

impl SoundSensor {
    pub fn new(adc_gpio: i32) -> Self {
        Self { _adc_gpio: adc_gpio }
    }

    /// Raw sample scaled into `[0, 1023]`.
    pub fn read_raw(&self) -> u16 {
        self.read_adc()
    }

    pub fn read(&self) -> SoundReading {
        SoundReading {
            level_db: raw_to_db(self.read_raw()),
        }
    }

    // The 12-bit ESP32 ADC is scaled down to the 10-bit domain the
    // dB mapping is defined on.
    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_SOUND) >> 2
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_SOUND_RAW.load(Ordering::Relaxed)
    }
}
