//! Climate transducer (BME680) contract and unit conversion.
//!
//! The driver itself lives in [`crate::drivers::bme680`]; this module owns
//! the startup profile, the trait the hardware adapter talks to, and the
//! conversion from a raw [`ClimateSample`] to an [`EnvironmentalReading`].

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::{InitError, SensorError};
use crate::readings::EnvironmentalReading;

// ---------------------------------------------------------------------------
// Startup profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversampling {
    Skip,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    /// Register encoding (`osrs_x` field).
    pub const fn code(self) -> u8 {
        match self {
            Self::Skip => 0,
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 3,
            Self::X8 => 4,
            Self::X16 => 5,
        }
    }
}

/// IIR filter coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSize {
    Off,
    Size1,
    Size3,
    Size7,
    Size15,
    Size31,
    Size63,
    Size127,
}

impl FilterSize {
    pub const fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Size1 => 1,
            Self::Size3 => 2,
            Self::Size7 => 3,
            Self::Size15 => 4,
            Self::Size31 => 5,
            Self::Size63 => 6,
            Self::Size127 => 7,
        }
    }
}

/// Gas-plate heater target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterProfile {
    pub temperature_c: u16,
    pub duration_ms: u16,
}

/// Configuration applied exactly once during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateSetup {
    pub temperature_os: Oversampling,
    pub humidity_os: Oversampling,
    pub pressure_os: Oversampling,
    pub filter: FilterSize,
    pub heater: HeaterProfile,
}

impl Default for ClimateSetup {
    fn default() -> Self {
        Self {
            temperature_os: Oversampling::X8,
            humidity_os: Oversampling::X2,
            pressure_os: Oversampling::X4,
            filter: FilterSize::Size3,
            heater: HeaterProfile {
                temperature_c: 320,
                duration_ms: 150,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Driver contract
// ---------------------------------------------------------------------------

/// Compensated output of one forced-mode measurement, in SI units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_pa: f32,
    pub gas_resistance_ohm: f32,
}

pub trait ClimateDriver {
    /// Probe the device.  Called once.
    fn begin(&mut self) -> Result<(), InitError>;

    /// Apply oversampling, filter and heater settings.  Called once.
    fn configure(&mut self, setup: &ClimateSetup) -> Result<(), InitError>;

    /// Trigger a measurement and wait for the result.
    fn perform_reading(&mut self) -> Result<ClimateSample, SensorError>;
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// International barometric formula.
pub fn altitude_m(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    44_330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}

impl EnvironmentalReading {
    pub fn from_sample(sample: &ClimateSample, sea_level_hpa: f32) -> Self {
        let pressure_hpa = sample.pressure_pa / 100.0;
        Self {
            temperature_c: sample.temperature_c,
            humidity_pct: sample.humidity_pct,
            pressure_hpa,
            gas_resistance_kohm: sample.gas_resistance_ohm / 1000.0,
            altitude_m: altitude_m(pressure_hpa, sea_level_hpa),
        }
    }
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

static SIM_TEMP: AtomicU32 = AtomicU32::new(0x41C8_0000); // 25.0
static SIM_HUMIDITY: AtomicU32 = AtomicU32::new(0x4220_0000); // 40.0
static SIM_PRESSURE: AtomicU32 = AtomicU32::new(0x47C5_E680); // 101325.0
static SIM_GAS: AtomicU32 = AtomicU32::new(0x47C3_5000); // 100000.0
static SIM_PRESENT: AtomicBool = AtomicBool::new(true);
static SIM_READ_FAILS: AtomicBool = AtomicBool::new(false);

/// Inject the values the simulated sensor reports.
pub fn sim_set_climate(sample: ClimateSample) {
    SIM_TEMP.store(sample.temperature_c.to_bits(), Ordering::Relaxed);
    SIM_HUMIDITY.store(sample.humidity_pct.to_bits(), Ordering::Relaxed);
    SIM_PRESSURE.store(sample.pressure_pa.to_bits(), Ordering::Relaxed);
    SIM_GAS.store(sample.gas_resistance_ohm.to_bits(), Ordering::Relaxed);
}

/// Make `begin()` fail as if the chip were absent.
pub fn sim_set_climate_present(present: bool) {
    SIM_PRESENT.store(present, Ordering::Relaxed);
}

/// Make `perform_reading()` fail until cleared.
pub fn sim_set_climate_read_fails(fails: bool) {
    SIM_READ_FAILS.store(fails, Ordering::Relaxed);
}

/// In-memory stand-in for the BME680 on host builds.
#[derive(Debug, Default)]
pub struct SimClimateSensor {
    configured: Option<ClimateSetup>,
}

impl SimClimateSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configured(&self) -> Option<&ClimateSetup> {
        self.configured.as_ref()
    }
}

impl ClimateDriver for SimClimateSensor {
    fn begin(&mut self) -> Result<(), InitError> {
        if SIM_PRESENT.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(InitError::ClimateNotFound)
        }
    }

    fn configure(&mut self, setup: &ClimateSetup) -> Result<(), InitError> {
        self.configured = Some(*setup);
        Ok(())
    }

    fn perform_reading(&mut self) -> Result<ClimateSample, SensorError> {
        if SIM_READ_FAILS.load(Ordering::Relaxed) {
            return Err(SensorError::Timeout);
        }
        Ok(ClimateSample {
            temperature_c: f32::from_bits(SIM_TEMP.load(Ordering::Relaxed)),
            humidity_pct: f32::from_bits(SIM_HUMIDITY.load(Ordering::Relaxed)),
            pressure_pa: f32::from_bits(SIM_PRESSURE.load(Ordering::Relaxed)),
            gas_resistance_ohm: f32::from_bits(SIM_GAS.load(Ordering::Relaxed)),
        })
    }
}
