//! MonitorService end-to-end behaviour against mock adapters.

use envguard::app::events::{AppEvent, BringUpStep, PresentationView, Qualifier, SensorGroup};
use envguard::app::service::MonitorService;
use envguard::classifier::HazardStatus;
use envguard::config::ExecutionMode;
use envguard::connectivity::LinkState;
use envguard::drivers::alert_patterns::{TriggerOutcome, COLOUR_DANGER, COLOUR_SAFE, OFF};
use envguard::drivers::indicator::SELF_TEST_STEP_MS;
use envguard::error::{InitError, SensorError};
use envguard::app::ports::NetworkPort;
use envguard::pins::NUM_PIXELS;

use crate::mock_hw::*;

fn started() -> (MonitorService, MockHw, RecordingSink) {
    let mut app = MonitorService::new(test_config());
    let mut hw = MockHw::new();
    let mut sink = RecordingSink::default();
    app.bring_up(&mut hw, &mut CountingDelay::default(), &mut sink)
        .unwrap();
    hw.calls.clear();
    sink.clear();
    (app, hw, sink)
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn bring_up_runs_steps_in_order() {
    let mut app = MonitorService::new(test_config());
    let mut hw = MockHw::new();
    let mut sink = RecordingSink::default();
    let mut delay = CountingDelay::default();

    app.bring_up(&mut hw, &mut delay, &mut sink).unwrap();

    let steps: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::BringUpStep(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        steps,
        [
            BringUpStep::Buzzer,
            BringUpStep::Pixels,
            BringUpStep::Climate,
            BringUpStep::Sound,
            BringUpStep::GasCalibration,
        ]
    );
    assert_eq!(sink.events.last(), Some(&AppEvent::Started));

    // Self-test: every pixel through red, green, blue.
    let pixel_writes = hw
        .calls
        .iter()
        .filter(|c| matches!(c, IndicatorCall::Pixel(..)))
        .count();
    assert_eq!(pixel_writes, NUM_PIXELS * 3);
    assert_eq!(hw.calls.first(), Some(&IndicatorCall::Buzzer(false)));
    assert!(!hw.buzzer_on());
    assert_eq!(hw.strip_colour(), OFF);

    // 15 self-test steps plus 4 calibration samples.
    assert_eq!(
        delay.total_ms,
        u64::from(SELF_TEST_STEP_MS) * 15 + 4 * 10
    );
    assert_eq!(hw.gas_reads, 4);
}

#[test]
fn bring_up_reports_calibrated_baseline() {
    let mut app = MonitorService::new(test_config());
    let mut sink = RecordingSink::default();
    app.bring_up(&mut MockHw::new(), &mut CountingDelay::default(), &mut sink)
        .unwrap();
    let r0 = sink.events.iter().find_map(|e| match e {
        AppEvent::Calibrated { r0_kohm } => Some(*r0_kohm),
        _ => None,
    });
    assert!((r0.unwrap() - 15.0).abs() < 1e-3);
}

#[test]
fn calibration_read_failure_fails_bring_up() {
    let mut app = MonitorService::new(test_config());
    let mut hw = MockHw::new();
    hw.gas.push_back(Ok(RS_CALIBRATION));
    hw.gas.push_back(Err(SensorError::AdcReadFailed));
    let mut sink = RecordingSink::default();

    let result = app.bring_up(&mut hw, &mut CountingDelay::default(), &mut sink);
    assert_eq!(result, Err(InitError::CalibrationFailed));
    assert!(!sink.events.contains(&AppEvent::Started));
}

#[test]
fn bring_up_retries_then_succeeds() {
    let mut app = MonitorService::new(test_config());
    let mut hw = MockHw::new();
    hw.begin_results.push_back(Err(InitError::ClimateNotFound));
    hw.begin_results.push_back(Err(InitError::ClimateNotFound));
    let mut sink = RecordingSink::default();
    let mut delay = CountingDelay::default();

    let attempt = app.bring_up_with_retry(&mut hw, &mut delay, &mut sink);
    assert_eq!(attempt, Ok(3));
    assert_eq!(hw.begins, 3);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::BringUpFailed { .. })),
        2
    );
    assert_eq!(sink.count(|e| *e == AppEvent::Started), 1);

    // Three self-tests, one calibration, two retry waits.
    let self_test = u64::from(SELF_TEST_STEP_MS) * 15;
    assert_eq!(delay.total_ms, self_test * 3 + 40 + 2 * 2000);
}

#[test]
fn bring_up_gives_up_after_configured_attempts() {
    let mut app = MonitorService::new(test_config());
    let mut hw = MockHw::new();
    for _ in 0..3 {
        hw.begin_results.push_back(Err(InitError::ClimateNotFound));
    }
    let mut sink = RecordingSink::default();

    let result = app.bring_up_with_retry(&mut hw, &mut CountingDelay::default(), &mut sink);
    assert_eq!(result, Err(InitError::ClimateNotFound));
    assert_eq!(hw.begins, 3);
    assert!(sink.events.contains(&AppEvent::BringUpFailed {
        attempt: 3,
        error: InitError::ClimateNotFound,
    }));
    assert!(!hw.buzzer_on());
}

// ── Blocking ticks ────────────────────────────────────────────

#[test]
fn danger_tick_plays_red_with_alarm_then_publishes() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    let mut delay = CountingDelay::default();
    hw.script_gas_tick(RS_DANGER);

    let report = app.tick_blocking(&mut hw, &mut conn, &mut ota, &mut delay, &mut sink, &mut views);

    assert_eq!(report.status, HazardStatus::Danger);
    // 3 x (500 on + 500 off) + 2000 ms alarm hold.
    assert_eq!(delay.total_ms, 5000);
    let reds = hw.fills().iter().filter(|c| **c == COLOUR_DANGER).count();
    assert_eq!(reds, 3);
    assert!(hw.calls.contains(&IndicatorCall::Buzzer(true)));
    assert!(!hw.buzzer_on());
    assert_eq!(hw.strip_colour(), OFF);

    let summary = report.published.unwrap();
    assert_eq!(summary.published, 9);
    assert_eq!(summary.skipped, 0);
    assert!(conn.transport().messages.iter().all(|(_, _, retain)| *retain));

    assert!(sink.events.contains(&AppEvent::HazardChanged {
        from: None,
        to: HazardStatus::Danger,
    }));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::Gas { note: Qualifier::Unsafe, .. })),
        1
    );
    assert_eq!(views.views.len(), 3);
}

#[test]
fn safe_tick_is_silent_blue() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut delay = CountingDelay::default();
    hw.script_gas_tick(RS_SAFE);

    let report = app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut delay,
        &mut sink,
        &mut ViewSink::default(),
    );

    assert_eq!(report.status, HazardStatus::Safe);
    assert_eq!(delay.total_ms, 3000);
    assert!(hw.fills().contains(&COLOUR_SAFE));
    assert!(!hw.calls.contains(&IndicatorCall::Buzzer(true)));
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::Gas {
                note: Qualifier::WithinLimits,
                ..
            }
        )),
        1
    );
}

#[test]
fn blocking_publish_waits_for_link() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 2);
    let mut ota = MockOta::default();
    let mut delay = CountingDelay::default();
    hw.script_gas_tick(RS_SAFE);

    let report = app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut delay,
        &mut sink,
        &mut ViewSink::default(),
    );

    // Pattern, then two failed attempts each followed by the fixed wait.
    assert_eq!(delay.total_ms, 3000 + 2 * 5000);
    assert_eq!(conn.network().connects, 3);
    assert_eq!(report.published.unwrap().published, 9);
    assert!(sink.events.contains(&AppEvent::LinkChanged {
        from: LinkState::Disconnected,
        to: LinkState::Connected,
    }));
}

#[test]
fn failed_climate_read_skips_environment_metrics() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_SAFE);
    hw.climate.push_back(Err(SensorError::Timeout));

    let report = app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut views,
    );

    let summary = report.published.unwrap();
    assert_eq!(summary.published, 4);
    assert_eq!(summary.skipped, 5);
    let topics = conn.transport().topics();
    for key in ["temperature", "humidity", "pressure", "gas", "altitude"] {
        assert!(!topics.contains(&key), "{key} published from stale data");
    }
    assert!(topics.contains(&"sound"));
    assert!(sink.events.contains(&AppEvent::SensorReadFailed {
        group: SensorGroup::Climate,
        error: SensorError::Timeout,
    }));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Environment(_))), 0);
    assert!(!views
        .views
        .iter()
        .any(|v| matches!(v, PresentationView::Environment(_))));
}

#[test]
fn payloads_use_two_decimals() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    hw.script_gas_tick(RS_SAFE);
    hw.climate.push_back(Ok(climate_sample(21.456)));

    app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut ViewSink::default(),
    );

    assert_eq!(conn.transport().payload("temperature"), Some("21.46"));
    assert_eq!(conn.transport().payload("pressure"), Some("1000.00"));
}

#[test]
fn hazard_change_emitted_only_on_transition() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut delay = CountingDelay::default();
    let mut views = ViewSink::default();

    for rs in [RS_SAFE, RS_SAFE, RS_WARNING] {
        hw.script_gas_tick(rs);
        app.tick_blocking(&mut hw, &mut conn, &mut ota, &mut delay, &mut sink, &mut views);
    }

    let changes: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::HazardChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        [
            (None, HazardStatus::Safe),
            (Some(HazardStatus::Safe), HazardStatus::Warning),
        ]
    );
    assert_eq!(app.hazard(), Some(HazardStatus::Warning));
    assert_eq!(app.tick_count(), 3);
}

#[test]
fn loud_sound_is_flagged_elevated() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    hw.script_gas_tick(RS_SAFE);
    hw.sound_raw = 1023;

    app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut ViewSink::default(),
    );

    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::Sound {
                note: Qualifier::Elevated,
                ..
            }
        )),
        1
    );
    assert_eq!(conn.transport().payload("sound"), Some("100.00"));
}

// ── Cooperative steps ─────────────────────────────────────────

#[test]
fn first_step_ticks_immediately() {
    let (mut app, mut hw, mut sink) = started();
    assert_eq!(app.config().execution_mode, ExecutionMode::Cooperative);
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_DANGER);

    let report = app
        .step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
        .unwrap();
    assert_eq!(report.alert, TriggerOutcome::Started);
    assert_eq!(report.published.unwrap().published, 9);
    assert_eq!(hw.strip_colour(), COLOUR_DANGER);
    assert!(hw.buzzer_on());

    // Next tick is not due until the interval has passed.
    assert!(app
        .step(500, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
        .is_none());
    assert_eq!(hw.strip_colour(), OFF);
    assert!(hw.buzzer_on());

    // Pattern over: idle indicator.
    app.step(4500, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    assert!(app.alerts().is_idle());
    assert!(!hw.buzzer_on());
}

#[test]
fn cooperative_snapshot_waits_for_link_then_flushes() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 1);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_SAFE);

    let report = app
        .step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
        .unwrap();
    assert_eq!(report.published, None);
    assert!(app.has_queued_telemetry());
    assert_eq!(conn.state(), LinkState::WaitingRetry { remaining_ms: 5000 });
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ConnectFailed(_))),
        1
    );

    assert!(app
        .step(4000, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
        .is_none());
    assert!(app.has_queued_telemetry());
    assert!(conn.transport().messages.is_empty());

    app.step(1000, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    assert!(!app.has_queued_telemetry());
    assert_eq!(conn.transport().messages.len(), 9);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Published { tick: 1, .. }
    )));
}

#[test]
fn higher_severity_preempts_and_lower_queues() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();

    hw.script_gas_tick(RS_WARNING);
    let first = app.tick(&mut hw, &mut conn, &mut sink, &mut views);
    assert_eq!(first.alert, TriggerOutcome::Started);

    app.advance(1000, &mut hw, &mut conn, &mut ota, &mut sink);
    hw.script_gas_tick(RS_DANGER);
    let second = app.tick(&mut hw, &mut conn, &mut sink, &mut views);
    assert_eq!(second.alert, TriggerOutcome::Preempted(HazardStatus::Warning));
    assert_eq!(hw.strip_colour(), COLOUR_DANGER);

    hw.script_gas_tick(RS_SAFE);
    let third = app.tick(&mut hw, &mut conn, &mut sink, &mut views);
    assert_eq!(third.alert, TriggerOutcome::Queued);
    assert_eq!(app.alerts().active_status(), Some(HazardStatus::Danger));
    assert_eq!(app.alerts().pending_status(), Some(HazardStatus::Safe));

    // Danger runs to completion, then the queued Safe pattern starts.
    app.advance(5000, &mut hw, &mut conn, &mut ota, &mut sink);
    assert_eq!(app.alerts().active_status(), Some(HazardStatus::Safe));
    assert_eq!(hw.strip_colour(), COLOUR_SAFE);
    assert!(!hw.buzzer_on());
}

#[test]
fn lost_link_is_reported_and_recovered() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_SAFE);
    app.step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    assert_eq!(conn.state(), LinkState::Connected);

    conn.network_mut().disconnect();
    sink.clear();
    app.advance(50, &mut hw, &mut conn, &mut ota, &mut sink);
    assert!(sink.events.contains(&AppEvent::LinkChanged {
        from: LinkState::Connected,
        to: LinkState::Disconnected,
    }));

    app.advance(50, &mut hw, &mut conn, &mut ota, &mut sink);
    assert_eq!(conn.state(), LinkState::Connected);
    assert_eq!(conn.network().connects, 2);
}
