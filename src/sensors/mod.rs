//! Sensor subsystem — individual drivers, the [`SensorHub`] that owns them,
//! and [`Acquisition`], which turns raw port reads into a [`Snapshot`].
//!
//! Acquisition keeps the last good value of every group.  A group whose
//! read fails this tick keeps its previous value and is marked stale; the
//! next tick simply retries.

pub mod climate;
pub mod gas;
pub mod sound;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::SensorPort;
use crate::config::MAX_CALIBRATION_SAMPLES;
use crate::error::{InitError, SensorError};
use crate::readings::{EnvironmentalReading, GasReading, Snapshot, SoundReading};
use climate::{ClimateDriver, ClimateSample, ClimateSetup};
use gas::{CalibrationBaseline, GasSensor, GasSpecies, CURVES};
use sound::SoundSensor;

// ───────────────────────────────────────────────────────────────
// SensorHub (hardware side)
// ───────────────────────────────────────────────────────────────

/// Owns every transducer driver.
pub struct SensorHub<C: ClimateDriver> {
    pub gas: GasSensor,
    pub sound: SoundSensor,
    pub climate: C,
}

impl<C: ClimateDriver> SensorHub<C> {
    /// Construct a new hub.  Pass in pre-built drivers (built in main
    /// where peripheral ownership is established).
    pub fn new(gas: GasSensor, sound: SoundSensor, climate: C) -> Self {
        Self {
            gas,
            sound,
            climate,
        }
    }

    pub fn begin(&mut self, setup: &ClimateSetup) -> Result<(), InitError> {
        self.climate.begin()?;
        self.climate.configure(setup)?;
        info!(
            "sensors: climate configured (T x{:?}, H x{:?}, P x{:?}, heater {}C/{}ms)",
            setup.temperature_os,
            setup.humidity_os,
            setup.pressure_os,
            setup.heater.temperature_c,
            setup.heater.duration_ms
        );
        Ok(())
    }

    pub fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.climate.perform_reading()
    }
}

// ───────────────────────────────────────────────────────────────
// Acquisition (domain side)
// ───────────────────────────────────────────────────────────────

/// Result of one acquisition pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acquired {
    pub snapshot: Snapshot,
    pub climate_error: Option<SensorError>,
    pub gas_error: Option<SensorError>,
}

pub struct Acquisition {
    baseline: Option<CalibrationBaseline>,
    sea_level_hpa: f32,
    environment: EnvironmentalReading,
    gas: GasReading,
    tick: u64,
}

impl Acquisition {
    pub fn new(sea_level_hpa: f32) -> Self {
        Self {
            baseline: None,
            sea_level_hpa,
            environment: EnvironmentalReading::default(),
            gas: GasReading::default(),
            tick: 0,
        }
    }

    /// Establish the MQ-2 clean-air baseline.
    ///
    /// Takes `samples` readings `interval_ms` apart.  A failed read or a
    /// zero / non-finite average fails the whole calibration.
    pub fn calibrate<D: DelayNs>(
        &mut self,
        port: &mut impl SensorPort,
        delay: &mut D,
        samples: u8,
        interval_ms: u32,
    ) -> Result<CalibrationBaseline, InitError> {
        let mut buf: heapless::Vec<f32, { MAX_CALIBRATION_SAMPLES as usize }> = heapless::Vec::new();
        for _ in 0..samples.min(MAX_CALIBRATION_SAMPLES) {
            let rs = port
                .read_gas_rs()
                .map_err(|_| InitError::CalibrationFailed)?;
            // Capacity matches the loop bound.
            let _ = buf.push(rs);
            delay.delay_ms(interval_ms);
        }
        let baseline = CalibrationBaseline::from_samples(&buf)?;
        info!("sensors: MQ-2 R0 = {:.2} kOhm", baseline.r0_kohm());
        self.baseline = Some(baseline);
        Ok(baseline)
    }

    pub fn baseline(&self) -> Option<CalibrationBaseline> {
        self.baseline
    }

    /// Pull one sample from every group and build this tick's snapshot.
    pub fn acquire(&mut self, port: &mut impl SensorPort) -> Acquired {
        self.tick += 1;

        let sound = SoundReading {
            level_db: sound::raw_to_db(port.read_sound_raw()),
        };

        let climate_error = match port.read_climate() {
            Ok(sample) => {
                self.environment = EnvironmentalReading::from_sample(&sample, self.sea_level_hpa);
                None
            }
            Err(e) => {
                warn!("sensors: climate read failed ({}), keeping previous values", e);
                Some(e)
            }
        };

        let gas_error = match self.read_gas(port) {
            Ok(reading) => {
                self.gas = reading;
                None
            }
            Err(e) => {
                warn!("sensors: gas read failed ({}), keeping previous values", e);
                Some(e)
            }
        };

        Acquired {
            snapshot: Snapshot {
                tick: self.tick,
                gas: self.gas,
                gas_fresh: gas_error.is_none(),
                environment: self.environment,
                environment_fresh: climate_error.is_none(),
                sound,
            },
            climate_error,
            gas_error,
        }
    }

    /// One settle-then-read per species on the shared channel.
    fn read_gas(&self, port: &mut impl SensorPort) -> Result<GasReading, SensorError> {
        let baseline = self.baseline.ok_or(SensorError::OutOfRange)?;
        let mut reading = GasReading::default();
        for curve in CURVES {
            let rs = port.read_gas_rs()?;
            let ratio = baseline.ratio(rs);
            if ratio.is_nan() {
                return Err(SensorError::OutOfRange);
            }
            let ppm = curve.concentration(ratio);
            debug!("sensors: {:?} rs={:.2}kOhm ppm={:.2}", curve.species, rs, ppm);
            match curve.species {
                GasSpecies::Lpg => reading.lpg_ppm = ppm,
                GasSpecies::Co => reading.co_ppm = ppm,
                GasSpecies::Smoke => reading.smoke_ppm = ppm,
            }
        }
        Ok(reading)
    }
}
