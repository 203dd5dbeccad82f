//! Hazard alert sequencer.
//!
//! Each [`HazardStatus`] maps to an [`AlertPattern`] row: a pixel colour
//! flashed `blink_count` times, optionally followed by an alarm hold during
//! which the buzzer stays asserted.  The buzzer of an alarm pattern is
//! asserted from the first segment until the hold ends.
//!
//! Two ways to play a pattern:
//!
//! - **Cooperative** — [`AlertSequencer::trigger`] then
//!   [`AlertSequencer::advance`] from the main loop with the elapsed step.
//! - **Blocking** — [`AlertSequencer::play_blocking`] walks the segments
//!   with a `DelayNs`.
//!
//! ## Trigger policy
//!
//! | Sequencer state               | New status          | Result    |
//! |-------------------------------|---------------------|-----------|
//! | idle                          | any                 | start     |
//! | running lower severity        | higher severity     | preempt   |
//! | running equal/higher severity | any                 | queue     |
//!
//! Only one status is queued; a newer one replaces it.

use embedded_hal::delay::DelayNs;

use crate::classifier::HazardStatus;

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

pub const OFF: Rgb = (0, 0, 0);
pub const COLOUR_SAFE: Rgb = (0, 0, 255);
pub const COLOUR_WARNING: Rgb = (0, 255, 0);
pub const COLOUR_DANGER: Rgb = (255, 0, 0);

/// What the indicator hardware should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorOutput {
    /// Fill colour for every pixel.
    pub colour: Rgb,
    pub buzzer: bool,
}

impl IndicatorOutput {
    pub const IDLE: Self = Self {
        colour: OFF,
        buzzer: false,
    };
}

// ── Pattern table ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPattern {
    pub colour: Rgb,
    pub blink_count: u8,
    pub on_ms: u32,
    pub off_ms: u32,
    /// Extra buzzer time after the last flash.  Zero means silent.
    pub alarm_hold_ms: u32,
}

const ALERT_TABLE: [(HazardStatus, AlertPattern); 3] = [
    (
        HazardStatus::Safe,
        AlertPattern {
            colour: COLOUR_SAFE,
            blink_count: 3,
            on_ms: 500,
            off_ms: 500,
            alarm_hold_ms: 0,
        },
    ),
    (
        HazardStatus::Warning,
        AlertPattern {
            colour: COLOUR_WARNING,
            blink_count: 3,
            on_ms: 500,
            off_ms: 500,
            alarm_hold_ms: 0,
        },
    ),
    (
        HazardStatus::Danger,
        AlertPattern {
            colour: COLOUR_DANGER,
            blink_count: 3,
            on_ms: 500,
            off_ms: 500,
            alarm_hold_ms: 2000,
        },
    ),
];

pub fn pattern_for(status: HazardStatus) -> &'static AlertPattern {
    // The table is indexed in HazardStatus declaration order.
    &ALERT_TABLE[status as usize].1
}

impl AlertPattern {
    pub const fn sounds_alarm(&self) -> bool {
        self.alarm_hold_ms > 0
    }

    pub const fn flash_ms(&self) -> u32 {
        self.blink_count as u32 * (self.on_ms + self.off_ms)
    }

    pub const fn total_ms(&self) -> u32 {
        self.flash_ms() + self.alarm_hold_ms
    }

    /// `(output, duration_ms)` segments in play order.
    pub fn segments(&self) -> impl Iterator<Item = (IndicatorOutput, u32)> + '_ {
        let buzzer = self.sounds_alarm();
        let flashes = (0..self.blink_count).flat_map(move |_| {
            [
                (
                    IndicatorOutput {
                        colour: self.colour,
                        buzzer,
                    },
                    self.on_ms,
                ),
                (IndicatorOutput { colour: OFF, buzzer }, self.off_ms),
            ]
        });
        let hold = buzzer.then_some((IndicatorOutput { colour: OFF, buzzer }, self.alarm_hold_ms));
        flashes.chain(hold)
    }

    /// Output `elapsed_ms` into the pattern; `None` once it has finished.
    pub fn output_at(&self, elapsed_ms: u32) -> Option<IndicatorOutput> {
        let mut start = 0u32;
        for (output, duration) in self.segments() {
            if elapsed_ms < start + duration {
                return Some(output);
            }
            start += duration;
        }
        None
    }
}

// ── Sequencer ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    Preempted(HazardStatus),
    Queued,
}

#[derive(Debug, Clone, Copy)]
struct Running {
    status: HazardStatus,
    elapsed_ms: u32,
}

#[derive(Debug, Default)]
pub struct AlertSequencer {
    running: Option<Running>,
    pending: Option<HazardStatus>,
}

impl AlertSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&mut self, status: HazardStatus) -> TriggerOutcome {
        match self.running {
            None => {
                self.start(status);
                TriggerOutcome::Started
            }
            Some(r) if status > r.status => {
                self.start(status);
                TriggerOutcome::Preempted(r.status)
            }
            Some(_) => {
                self.pending = Some(status);
                TriggerOutcome::Queued
            }
        }
    }

    fn start(&mut self, status: HazardStatus) {
        self.running = Some(Running {
            status,
            elapsed_ms: 0,
        });
    }

    /// Move the running pattern forward and return the output to apply.
    ///
    /// When a pattern completes, the queued status (if any) starts at once.
    pub fn advance(&mut self, delta_ms: u32) -> IndicatorOutput {
        let Some(mut r) = self.running else {
            return IndicatorOutput::IDLE;
        };
        r.elapsed_ms = r.elapsed_ms.saturating_add(delta_ms);
        if let Some(output) = pattern_for(r.status).output_at(r.elapsed_ms) {
            self.running = Some(r);
            return output;
        }
        self.running = None;
        match self.pending.take() {
            Some(next) => {
                self.start(next);
                pattern_for(next)
                    .output_at(0)
                    .unwrap_or(IndicatorOutput::IDLE)
            }
            None => IndicatorOutput::IDLE,
        }
    }

    /// Current output without moving time forward.
    pub fn output(&self) -> IndicatorOutput {
        self.running
            .and_then(|r| pattern_for(r.status).output_at(r.elapsed_ms))
            .unwrap_or(IndicatorOutput::IDLE)
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_none()
    }

    pub fn active_status(&self) -> Option<HazardStatus> {
        self.running.map(|r| r.status)
    }

    pub fn pending_status(&self) -> Option<HazardStatus> {
        self.pending
    }

    /// Time until the running pattern completes.
    pub fn remaining_ms(&self) -> u32 {
        self.running.map_or(0, |r| {
            pattern_for(r.status).total_ms().saturating_sub(r.elapsed_ms)
        })
    }

    /// Play one pattern to completion, sleeping between segments.
    ///
    /// Any cooperative state is discarded first.  Ends with the indicator
    /// idle (pixels dark, buzzer released).
    pub fn play_blocking<D: DelayNs>(
        &mut self,
        status: HazardStatus,
        delay: &mut D,
        mut apply: impl FnMut(IndicatorOutput),
    ) {
        self.running = None;
        self.pending = None;
        for (output, duration) in pattern_for(status).segments() {
            apply(output);
            delay.delay_ms(duration);
        }
        apply(IndicatorOutput::IDLE);
    }
}
