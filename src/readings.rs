//! Per-tick reading values.
//!
//! Acquisition produces one [`Snapshot`] per tick and hands it by value to
//! the classifier, alert sequencer and reporter.  Nothing downstream writes
//! to it.

/// Climate group (BME680), already converted to engineering units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentalReading {
    /// Air temperature (°C).
    pub temperature_c: f32,
    /// Relative humidity (%).
    pub humidity_pct: f32,
    /// Barometric pressure (hPa).
    pub pressure_hpa: f32,
    /// Heated-plate gas resistance (kΩ).
    pub gas_resistance_kohm: f32,
    /// Altitude estimated from pressure (m).
    pub altitude_m: f32,
}

/// Gas group (MQ-2), concentrations in ppm.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GasReading {
    pub lpg_ppm: f32,
    pub co_ppm: f32,
    pub smoke_ppm: f32,
}

/// Sound level (KY-038).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SoundReading {
    pub level_db: f32,
}

/// A point-in-time view of every sensor group.
///
/// Groups whose read failed this tick carry the last good value with the
/// matching `*_fresh` flag cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    /// Tick counter at acquisition (1-based).
    pub tick: u64,
    pub gas: GasReading,
    pub gas_fresh: bool,
    pub environment: EnvironmentalReading,
    pub environment_fresh: bool,
    pub sound: SoundReading,
}
