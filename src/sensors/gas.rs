//! MQ-2 combustible gas / smoke sensor driver.
//!
//! The sensor's load-resistor voltage is read through ADC1 and converted
//! to the sensing resistance `Rs`.  Concentrations follow the power-law
//! curve `ppm = A · (Rs / R0)^B`, where `R0` is the clean-air baseline
//! established once at startup and `(A, B)` are fixed per gas species.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH3 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::{InitError, SensorError};

#[cfg(not(target_os = "espidf"))]
static SIM_GAS_ADC: AtomicU16 = AtomicU16::new(400);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_gas_adc(raw: u16) {
    SIM_GAS_ADC.store(raw, Ordering::Relaxed);
}

const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
/// Load resistor on the breakout board (kΩ).
const R_LOAD_KOHM: f32 = 10.0;
/// `Rs / R0` in clean air, from the MQ-2 datasheet curve.
pub const CLEAN_AIR_RATIO: f32 = 9.83;
/// Reported concentration for a saturated channel (100 % by volume).
pub const PPM_CEILING: f32 = 1_000_000.0;

// ---------------------------------------------------------------------------
// Regression curves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasSpecies {
    Lpg,
    Co,
    Smoke,
}

/// Power-law coefficients for one gas species.
#[derive(Debug, Clone, Copy)]
pub struct GasCurve {
    pub species: GasSpecies,
    pub a: f32,
    pub b: f32,
}

impl GasCurve {
    /// Evaluate the curve for a normalised resistance ratio.
    ///
    /// Every exponent is negative, so the result grows without bound as
    /// the ratio falls.  It is capped at [`PPM_CEILING`], which is also
    /// what a zero (saturated) ratio reads as.  NaN passes through so the
    /// caller can reject the sample.
    pub fn concentration(&self, ratio: f32) -> f32 {
        if ratio.is_nan() {
            return f32::NAN;
        }
        if ratio <= 0.0 {
            return PPM_CEILING;
        }
        (self.a * ratio.powf(self.b)).min(PPM_CEILING)
    }
}

pub const LPG_CURVE: GasCurve = GasCurve {
    species: GasSpecies::Lpg,
    a: 574.25,
    b: -2.222,
};

pub const CO_CURVE: GasCurve = GasCurve {
    species: GasSpecies::Co,
    a: 36974.0,
    b: -3.109,
};

pub const SMOKE_CURVE: GasCurve = GasCurve {
    species: GasSpecies::Smoke,
    a: 3616.1,
    b: -2.675,
};

/// Evaluation order on the shared channel.
pub const CURVES: [GasCurve; 3] = [LPG_CURVE, CO_CURVE, SMOKE_CURVE];

// ---------------------------------------------------------------------------
// Calibration baseline
// ---------------------------------------------------------------------------

/// Clean-air reference resistance `R0` (kΩ).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationBaseline {
    r0_kohm: f32,
}

impl CalibrationBaseline {
    /// Average `Rs / CLEAN_AIR_RATIO` over the collected samples.
    ///
    /// Fails when the result is zero or not finite, which happens with a
    /// disconnected sensor (0 V → infinite `Rs`) or an empty sample set.
    pub fn from_samples(samples: &[f32]) -> Result<Self, InitError> {
        if samples.is_empty() {
            return Err(InitError::CalibrationFailed);
        }
        let sum: f32 = samples.iter().map(|rs| rs / CLEAN_AIR_RATIO).sum();
        if !sum.is_finite() || sum == 0.0 {
            return Err(InitError::CalibrationFailed);
        }
        Ok(Self {
            r0_kohm: sum / samples.len() as f32,
        })
    }

    pub fn r0_kohm(&self) -> f32 {
        self.r0_kohm
    }

    pub fn ratio(&self, rs_kohm: f32) -> f32 {
        rs_kohm / self.r0_kohm
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Convert a raw 12-bit ADC sample to the sensing resistance (kΩ).
pub fn adc_to_rs_kohm(raw: u16) -> Result<f32, SensorError> {
    let volts = raw as f32 * V_REF / ADC_MAX;
    if volts <= 0.0 {
        return Err(SensorError::OutOfRange);
    }
    // Full scale can round a hair below zero; the curves read 0 as saturated.
    Ok(((V_REF * R_LOAD_KOHM / volts) - R_LOAD_KOHM).max(0.0))
}

pub struct GasSensor {
    _adc_gpio: i32,
}

impl GasSensor {
    pub fn new(adc_gpio: i32) -> Self {
        Self { _adc_gpio: adc_gpio }
    }

    /// Settle the channel and return the current sensing resistance.
    ///
    /// The first conversion after a channel switch is discarded.
    pub fn read_rs_kohm(&mut self) -> Result<f32, SensorError> {
        let _ = self.read_adc()?;
        adc_to_rs_kohm(self.read_adc()?)
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Result<u16, SensorError> {
        hw_init::adc1_try_read(hw_init::ADC1_CH_GAS).map_err(|_| SensorError::AdcReadFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Result<u16, SensorError> {
        Ok(SIM_GAS_ADC.load(Ordering::Relaxed))
    }
}
