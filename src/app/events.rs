//! Outbound application events.
//!
//! The [`MonitorService`](super::service::MonitorService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them; the production adapter
//! turns them into transcript lines on the serial console.

use crate::classifier::HazardStatus;
use crate::connectivity::LinkState;
use crate::drivers::alert_patterns::TriggerOutcome;
use crate::error::{CommsError, InitError, OtaError, SensorError};
use crate::readings::{EnvironmentalReading, GasReading, SoundReading};
use crate::reporter::PublishSummary;

/// Qualitative note attached to the gas and sound transcript blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    WithinLimits,
    Elevated,
    Unsafe,
}

impl Qualifier {
    pub fn for_gas(status: HazardStatus) -> Self {
        match status {
            HazardStatus::Safe => Self::WithinLimits,
            HazardStatus::Warning => Self::Elevated,
            HazardStatus::Danger => Self::Unsafe,
        }
    }

    pub fn for_sound(level_db: f32, loud_threshold_db: f32) -> Self {
        if level_db > loud_threshold_db {
            Self::Elevated
        } else {
            Self::WithinLimits
        }
    }

    pub const fn text(self) -> &'static str {
        match self {
            Self::WithinLimits => "levels are within safe limits",
            Self::Elevated => "elevated",
            Self::Unsafe => "unsafe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorGroup {
    Climate,
    Gas,
}

/// One-shot bring-up steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpStep {
    Buzzer,
    Pixels,
    Climate,
    Sound,
    GasCalibration,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A bring-up step completed.
    BringUpStep(BringUpStep),

    /// The MQ-2 clean-air baseline was established.
    Calibrated { r0_kohm: f32 },

    /// Bring-up succeeded; the tick loop is about to start.
    Started,

    /// A bring-up attempt failed (the supervisor decides whether to retry).
    BringUpFailed { attempt: u8, error: InitError },

    /// A sensor group could not be read; its previous values are kept.
    SensorReadFailed { group: SensorGroup, error: SensorError },

    /// Transcript block for the gas group.
    Gas { reading: GasReading, note: Qualifier },

    /// Transcript block for the climate group.
    Environment(EnvironmentalReading),

    /// Transcript block for the sound level.
    Sound { reading: SoundReading, note: Qualifier },

    /// Hazard status differs from the previous tick.
    HazardChanged {
        from: Option<HazardStatus>,
        to: HazardStatus,
    },

    /// An alert pattern was requested.
    Alert {
        status: HazardStatus,
        outcome: TriggerOutcome,
    },

    /// Network / transport session state moved.
    LinkChanged { from: LinkState, to: LinkState },

    /// A connect attempt failed; retry is scheduled.
    ConnectFailed(CommsError),

    /// Telemetry for one snapshot went out.
    Published { tick: u64, summary: PublishSummary },

    /// A firmware image started arriving.
    OtaStarted { total: u32 },

    /// The new image is verified and bootable; a reboot is due.
    OtaReady,

    /// The update session was abandoned.
    OtaFailed(OtaError),
}

/// Per-tick views for the presentation sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresentationView {
    Gas(GasReading),
    Environment(EnvironmentalReading),
    Sound(SoundReading),
}
