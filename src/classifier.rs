//! Gas hazard classification.
//!
//! Pure function of the current [`GasReading`]: no hysteresis, no memory,
//! strict `>` comparisons, first match wins.

use crate::readings::GasReading;

/// Hazard level, ordered by severity (`Safe < Warning < Danger`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum HazardStatus {
    #[default]
    Safe,
    Warning,
    Danger,
}

impl HazardStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::Danger => "DANGER",
        }
    }
}

impl core::fmt::Display for HazardStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-species limits (ppm) for one hazard tier.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub lpg: f32,
    pub co: f32,
    pub smoke: f32,
}

impl Limits {
    fn exceeded_by(&self, lpg: f32, co: f32, smoke: f32) -> bool {
        lpg > self.lpg || co > self.co || smoke > self.smoke
    }
}

pub const DANGER_LIMITS: Limits = Limits {
    lpg: 1000.0,
    co: 50.0,
    smoke: 200.0,
};

pub const WARNING_LIMITS: Limits = Limits {
    lpg: 500.0,
    co: 20.0,
    smoke: 100.0,
};

pub fn classify(lpg: f32, co: f32, smoke: f32) -> HazardStatus {
    if DANGER_LIMITS.exceeded_by(lpg, co, smoke) {
        HazardStatus::Danger
    } else if WARNING_LIMITS.exceeded_by(lpg, co, smoke) {
        HazardStatus::Warning
    } else {
        HazardStatus::Safe
    }
}

pub fn classify_reading(gas: &GasReading) -> HazardStatus {
    classify(gas.lpg_ppm, gas.co_ppm, gas.smoke_ppm)
}
