//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`], the pixel strip and the buzzer, exposing them
//! through [`SensorPort`] and [`IndicatorPort`].  This is the only module
//! in the system that touches actual hardware.  On non-espidf targets,
//! the underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{IndicatorPort, SensorPort};
use crate::drivers::alert_patterns::Rgb;
use crate::drivers::hw_init;
use crate::drivers::indicator::{Buzzer, PixelStrip};
use crate::error::{InitError, SensorError};
use crate::pins::NUM_PIXELS;
use crate::sensors::climate::{ClimateDriver, ClimateSample, ClimateSetup};
use crate::sensors::sound::RAW_MAX;
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<C: ClimateDriver> {
    sensor_hub: SensorHub<C>,
    pixels: PixelStrip,
    buzzer: Buzzer,
}

impl<C: ClimateDriver> HardwareAdapter<C> {
    pub fn new(sensor_hub: SensorHub<C>, pixels: PixelStrip, buzzer: Buzzer) -> Self {
        Self {
            sensor_hub,
            pixels,
            buzzer,
        }
    }

    pub fn pixels(&self) -> &[Rgb; NUM_PIXELS] {
        self.pixels.frame()
    }

    pub fn buzzer_on(&self) -> bool {
        self.buzzer.is_on()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<C: ClimateDriver> SensorPort for HardwareAdapter<C> {
    fn begin(&mut self, setup: &ClimateSetup) -> Result<(), InitError> {
        hw_init::init_peripherals()?;
        self.sensor_hub.begin(setup)
    }

    fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.sensor_hub.read_climate()
    }

    fn read_gas_rs(&mut self) -> Result<f32, SensorError> {
        self.sensor_hub.gas.read_rs_kohm()
    }

    fn read_sound_raw(&mut self) -> u16 {
        self.sensor_hub.sound.read_raw().min(RAW_MAX)
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<C: ClimateDriver> IndicatorPort for HardwareAdapter<C> {
    fn set_pixels(&mut self, colour: Rgb) {
        self.pixels.fill(colour);
        self.pixels.show();
    }

    fn set_pixel(&mut self, index: usize, colour: Rgb) {
        self.pixels.set(index, colour);
        self.pixels.show();
    }

    fn set_buzzer(&mut self, on: bool) {
        self.buzzer.set(on);
    }

    fn all_off(&mut self) {
        self.buzzer.set(false);
        self.pixels.clear();
        self.pixels.show();
    }
}
