//! Application service — the hexagonal core.
//!
//! [`MonitorService`] owns acquisition, the alert sequencer and the
//! reporter.  It exposes a clean, hardware-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │        MonitorService         │ ──▶ PresentationSink
//! IndicatorPort ◀─│ Acquire · Classify · Alert    │
//!                 └──────────────┬───────────────┘
//!                                ▼
//!                      ConnectivityManager ──▶ MQTT
//!                                               │
//!                          OtaPort ◀── update commands
//! ```
//!
//! Two ways to drive it:
//!
//! - **Cooperative** — call [`MonitorService::step`] every loop step; alert
//!   patterns, reconnect waits, the update channel and ticks are all
//!   advanced from the step.
//! - **Blocking** — call [`MonitorService::tick_blocking`]; the alert
//!   pattern and any reconnect wait run to completion inside the call.

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::classifier::{classify_reading, HazardStatus};
use crate::config::SystemConfig;
use crate::connectivity::{ConnectivityManager, LinkState};
use crate::drivers::alert_patterns::{AlertSequencer, IndicatorOutput, TriggerOutcome};
use crate::drivers::indicator::{self_test_steps, SELF_TEST_STEP_MS};
use crate::error::InitError;
use crate::readings::Snapshot;
use crate::reporter::{PublishSummary, Reporter};
use crate::sensors::climate::ClimateSetup;
use crate::sensors::{Acquired, Acquisition};

use super::events::{AppEvent, BringUpStep, Qualifier, SensorGroup};
use super::ports::{
    EventSink, IndicatorPort, NetworkPort, OtaPort, OtaProgress, PresentationSink, SensorPort,
    TelemetryTransport,
};

/// What one pipeline tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub snapshot: Snapshot,
    pub status: HazardStatus,
    pub alert: TriggerOutcome,
    /// `None` while the snapshot waits for the link (cooperative mode).
    pub published: Option<PublishSummary>,
}

// ───────────────────────────────────────────────────────────────
// MonitorService
// ───────────────────────────────────────────────────────────────

pub struct MonitorService {
    config: SystemConfig,
    acquisition: Acquisition,
    alerts: AlertSequencer,
    reporter: Reporter,
    hazard: Option<HazardStatus>,
    last_output: IndicatorOutput,
    /// Time since the last tick; starts full so the first step ticks.
    since_tick_ms: u32,
    tick_count: u64,
    last_snapshot: Option<Snapshot>,
    update: OtaProgress,
}

impl MonitorService {
    pub fn new(config: SystemConfig) -> Self {
        let acquisition = Acquisition::new(config.sea_level_pressure_hpa);
        let reporter = Reporter::new(&config.topic_prefix);
        let since_tick_ms = config.tick_interval_ms;
        Self {
            config,
            acquisition,
            alerts: AlertSequencer::new(),
            reporter,
            hazard: None,
            last_output: IndicatorOutput::IDLE,
            since_tick_ms,
            tick_count: 0,
            last_snapshot: None,
            update: OtaProgress::Idle,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// One-shot startup: buzzer, pixel self-test, climate sensor, sound
    /// input, MQ-2 calibration.  Stops at the first failing step.
    pub fn bring_up<H, D, E>(&mut self, hw: &mut H, delay: &mut D, sink: &mut E) -> Result<(), InitError>
    where
        H: SensorPort + IndicatorPort,
        D: DelayNs,
        E: EventSink,
    {
        hw.set_buzzer(false);
        sink.emit(&AppEvent::BringUpStep(BringUpStep::Buzzer));

        for (pixel, colour) in self_test_steps() {
            hw.set_pixel(pixel, colour);
            delay.delay_ms(SELF_TEST_STEP_MS);
        }
        hw.all_off();
        self.last_output = IndicatorOutput::IDLE;
        sink.emit(&AppEvent::BringUpStep(BringUpStep::Pixels));

        hw.begin(&ClimateSetup::default())?;
        sink.emit(&AppEvent::BringUpStep(BringUpStep::Climate));

        // The sound input needs no configuration beyond the ADC channel.
        sink.emit(&AppEvent::BringUpStep(BringUpStep::Sound));

        let baseline = self.acquisition.calibrate(
            hw,
            delay,
            self.config.calibration_samples,
            self.config.calibration_interval_ms,
        )?;
        sink.emit(&AppEvent::Calibrated {
            r0_kohm: baseline.r0_kohm(),
        });
        sink.emit(&AppEvent::BringUpStep(BringUpStep::GasCalibration));

        sink.emit(&AppEvent::Started);
        info!("MonitorService started");
        Ok(())
    }

    /// Run [`bring_up`](Self::bring_up) up to `config.bring_up_attempts`
    /// times, waiting `bring_up_retry_delay_ms` between attempts.
    ///
    /// Returns the last error once every attempt has failed; the caller
    /// is expected to halt.
    pub fn bring_up_with_retry<H, D, E>(
        &mut self,
        hw: &mut H,
        delay: &mut D,
        sink: &mut E,
    ) -> Result<u8, InitError>
    where
        H: SensorPort + IndicatorPort,
        D: DelayNs,
        E: EventSink,
    {
        let attempts = self.config.bring_up_attempts.max(1);
        let mut last = InitError::CalibrationFailed;
        for attempt in 1..=attempts {
            match self.bring_up(hw, delay, sink) {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    error!("bring-up attempt {}/{} failed: {}", attempt, attempts, e);
                    sink.emit(&AppEvent::BringUpFailed { attempt, error: e });
                    hw.all_off();
                    last = e;
                    if attempt < attempts {
                        delay.delay_ms(self.config.bring_up_retry_delay_ms);
                    }
                }
            }
        }
        Err(last)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Acquire, classify, write the transcript and the display.
    fn sense<S, E, P>(&mut self, hw: &mut S, sink: &mut E, display: &mut P) -> (Snapshot, HazardStatus)
    where
        S: SensorPort,
        E: EventSink,
        P: PresentationSink,
    {
        let Acquired {
            snapshot,
            climate_error,
            gas_error,
        } = self.acquisition.acquire(hw);
        if let Some(error) = climate_error {
            sink.emit(&AppEvent::SensorReadFailed {
                group: SensorGroup::Climate,
                error,
            });
        }
        if let Some(error) = gas_error {
            sink.emit(&AppEvent::SensorReadFailed {
                group: SensorGroup::Gas,
                error,
            });
        }

        let status = classify_reading(&snapshot.gas);

        sink.emit(&AppEvent::Sound {
            reading: snapshot.sound,
            note: Qualifier::for_sound(snapshot.sound.level_db, self.config.loud_threshold_db),
        });
        if snapshot.environment_fresh {
            sink.emit(&AppEvent::Environment(snapshot.environment));
        }
        if snapshot.gas_fresh {
            sink.emit(&AppEvent::Gas {
                reading: snapshot.gas,
                note: Qualifier::for_gas(status),
            });
        }

        if self.hazard != Some(status) {
            if status == HazardStatus::Danger {
                warn!("hazard: {:?} -> {}", self.hazard, status);
            } else {
                info!("hazard: {:?} -> {}", self.hazard, status);
            }
            sink.emit(&AppEvent::HazardChanged {
                from: self.hazard,
                to: status,
            });
            self.hazard = Some(status);
        }

        self.reporter.render(&snapshot, display);
        self.tick_count += 1;
        self.last_snapshot = Some(snapshot);
        (snapshot, status)
    }

    /// One full tick with blocking waits: the update channel gets one
    /// poll, the alert pattern plays to the end, then the link is brought
    /// up (however long that takes) and the snapshot is published.
    pub fn tick_blocking<H, N, T, U, D, E, P>(
        &mut self,
        hw: &mut H,
        conn: &mut ConnectivityManager<N, T>,
        ota: &mut U,
        delay: &mut D,
        sink: &mut E,
        display: &mut P,
    ) -> TickReport
    where
        H: SensorPort + IndicatorPort,
        N: NetworkPort,
        T: TelemetryTransport,
        U: OtaPort,
        D: DelayNs,
        E: EventSink,
        P: PresentationSink,
    {
        self.poll_update(ota, sink);
        let (snapshot, status) = self.sense(hw, sink, display);

        let alert = TriggerOutcome::Started;
        sink.emit(&AppEvent::Alert { status, outcome: alert });
        self.alerts
            .play_blocking(status, delay, |out| apply_output(hw, out));
        self.last_output = IndicatorOutput::IDLE;

        let before = conn.state();
        let summary = self.reporter.publish(&snapshot, conn, delay);
        let after = conn.state();
        if before != after {
            sink.emit(&AppEvent::LinkChanged {
                from: before,
                to: after,
            });
        }
        sink.emit(&AppEvent::Published {
            tick: snapshot.tick,
            summary,
        });

        TickReport {
            snapshot,
            status,
            alert,
            published: Some(summary),
        }
    }

    /// One cooperative tick: start (or queue) the alert pattern and publish
    /// if the link is up, otherwise leave the snapshot queued.
    pub fn tick<H, N, T, E, P>(
        &mut self,
        hw: &mut H,
        conn: &mut ConnectivityManager<N, T>,
        sink: &mut E,
        display: &mut P,
    ) -> TickReport
    where
        H: SensorPort + IndicatorPort,
        N: NetworkPort,
        T: TelemetryTransport,
        E: EventSink,
        P: PresentationSink,
    {
        let (snapshot, status) = self.sense(hw, sink, display);

        let alert = self.alerts.trigger(status);
        sink.emit(&AppEvent::Alert { status, outcome: alert });
        let out = self.alerts.output();
        self.apply(hw, out);

        self.poll_link(conn, 0, sink);
        let published = self.reporter.try_publish(&snapshot, conn).map(|(tick, summary)| {
            sink.emit(&AppEvent::Published { tick, summary });
            summary
        });

        TickReport {
            snapshot,
            status,
            alert,
            published,
        }
    }

    /// Move the alert pattern and the link state machine forward by
    /// `delta_ms`, service the update channel and flush any queued
    /// snapshot.  Returns `true` when the next tick is due.
    pub fn advance<I, N, T, U, E>(
        &mut self,
        delta_ms: u32,
        hw: &mut I,
        conn: &mut ConnectivityManager<N, T>,
        ota: &mut U,
        sink: &mut E,
    ) -> bool
    where
        I: IndicatorPort,
        N: NetworkPort,
        T: TelemetryTransport,
        U: OtaPort,
        E: EventSink,
    {
        let out = self.alerts.advance(delta_ms);
        self.apply(hw, out);
        self.poll_update(ota, sink);

        self.poll_link(conn, delta_ms, sink);
        if let Some((tick, summary)) = self.reporter.flush(conn) {
            sink.emit(&AppEvent::Published { tick, summary });
        }

        self.since_tick_ms = self.since_tick_ms.saturating_add(delta_ms);
        self.since_tick_ms >= self.config.tick_interval_ms
    }

    /// One main-loop step in cooperative mode.
    pub fn step<H, N, T, U, E, P>(
        &mut self,
        delta_ms: u32,
        hw: &mut H,
        conn: &mut ConnectivityManager<N, T>,
        ota: &mut U,
        sink: &mut E,
        display: &mut P,
    ) -> Option<TickReport>
    where
        H: SensorPort + IndicatorPort,
        N: NetworkPort,
        T: TelemetryTransport,
        U: OtaPort,
        E: EventSink,
        P: PresentationSink,
    {
        if !self.advance(delta_ms, hw, conn, ota, sink) {
            return None;
        }
        self.since_tick_ms = 0;
        Some(self.tick(hw, conn, sink, display))
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn hazard(&self) -> Option<HazardStatus> {
        self.hazard
    }

    /// Total pipeline ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn alerts(&self) -> &AlertSequencer {
        &self.alerts
    }

    pub fn has_queued_telemetry(&self) -> bool {
        self.reporter.has_pending()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Update channel progress as of the last poll.
    pub fn update_progress(&self) -> OtaProgress {
        self.update
    }

    /// A verified image is waiting; the caller should reboot into it.
    pub fn update_ready(&self) -> bool {
        self.update == OtaProgress::ReadyToReboot
    }

    // ── Internal ──────────────────────────────────────────────

    /// Write to the indicator only when the output changed.
    fn apply(&mut self, hw: &mut impl IndicatorPort, out: IndicatorOutput) {
        if out != self.last_output {
            apply_output(hw, out);
            self.last_output = out;
        }
    }

    /// Poll the update channel; report session start, failure and
    /// completion once each.
    fn poll_update<U, E>(&mut self, ota: &mut U, sink: &mut E)
    where
        U: OtaPort,
        E: EventSink,
    {
        let now = match ota.poll() {
            Ok(progress) => progress,
            Err(e) => {
                warn!("update abandoned: {}", e);
                sink.emit(&AppEvent::OtaFailed(e));
                OtaProgress::Idle
            }
        };
        match (self.update, now) {
            (OtaProgress::Receiving { .. }, OtaProgress::Receiving { .. })
            | (OtaProgress::ReadyToReboot, OtaProgress::ReadyToReboot) => {}
            (_, OtaProgress::Receiving { total, .. }) => {
                sink.emit(&AppEvent::OtaStarted { total });
            }
            (_, OtaProgress::ReadyToReboot) => sink.emit(&AppEvent::OtaReady),
            (_, OtaProgress::Idle) => {}
        }
        self.update = now;
    }

    fn poll_link<N, T, E>(&mut self, conn: &mut ConnectivityManager<N, T>, delta_ms: u32, sink: &mut E)
    where
        N: NetworkPort,
        T: TelemetryTransport,
        E: EventSink,
    {
        let before = conn.state();
        let failures = conn.failed_attempts();
        let after = conn.poll(delta_ms);
        if conn.failed_attempts() > failures {
            if let Some(e) = conn.last_error() {
                sink.emit(&AppEvent::ConnectFailed(e));
            }
        }
        let moved = match (before, after) {
            (LinkState::WaitingRetry { .. }, LinkState::WaitingRetry { .. }) => false,
            (a, b) => a != b,
        };
        if moved {
            sink.emit(&AppEvent::LinkChanged {
                from: before,
                to: after,
            });
        }
    }
}

fn apply_output(hw: &mut impl IndicatorPort, out: IndicatorOutput) {
    hw.set_pixels(out.colour);
    hw.set_buzzer(out.buzzer);
}
