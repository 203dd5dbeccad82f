//! Telemetry fan-out and link management seen through the service.

use envguard::app::events::AppEvent;
use envguard::app::service::MonitorService;
use envguard::config::SystemConfig;
use envguard::connectivity::LinkState;

use crate::mock_hw::*;

fn prefixed_config(prefix: &str) -> SystemConfig {
    let mut config = test_config();
    config.topic_prefix.clear();
    config.topic_prefix.push_str(prefix).unwrap();
    config
}

fn start(config: SystemConfig) -> (MonitorService, MockHw, RecordingSink) {
    let mut app = MonitorService::new(config);
    let mut hw = MockHw::new();
    let mut sink = RecordingSink::default();
    app.bring_up(&mut hw, &mut CountingDelay::default(), &mut sink)
        .unwrap();
    sink.clear();
    (app, hw, sink)
}

#[test]
fn bare_keys_without_prefix() {
    let (mut app, mut hw, mut sink) = start(test_config());
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    hw.script_gas_tick(RS_SAFE);

    app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut ViewSink::default(),
    );

    assert_eq!(
        conn.transport().topics(),
        [
            "temperature",
            "humidity",
            "pressure",
            "gas",
            "altitude",
            "lpg",
            "co",
            "smoke",
            "sound"
        ]
    );
}

#[test]
fn prefix_is_joined_with_slash() {
    let (mut app, mut hw, mut sink) = start(prefixed_config("home/lab"));
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    hw.script_gas_tick(RS_SAFE);

    app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut ViewSink::default(),
    );

    let topics = conn.transport().topics();
    assert_eq!(topics.len(), 9);
    assert!(topics.iter().all(|t| t.starts_with("home/lab/")));
    assert!(topics.contains(&"home/lab/smoke"));
}

#[test]
fn failed_gas_read_skips_gas_metrics() {
    let (mut app, mut hw, mut sink) = start(test_config());
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    hw.gas.push_back(Ok(RS_SAFE));
    hw.gas.push_back(Err(envguard::error::SensorError::AdcReadFailed));

    let report = app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut ViewSink::default(),
    );

    let summary = report.published.unwrap();
    assert_eq!(summary.published, 6);
    assert_eq!(summary.skipped, 3);
    let topics = conn.transport().topics();
    assert!(!topics.contains(&"lpg"));
    assert!(!topics.contains(&"co"));
    assert!(!topics.contains(&"smoke"));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Gas { .. })), 0);
}

#[test]
fn queued_snapshot_is_replaced_by_newer_one() {
    let (mut app, mut hw, mut sink) = start(test_config());
    let mut conn = mock_conn(app.config(), 10);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();

    hw.script_gas_tick(RS_SAFE);
    app.step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    hw.script_gas_tick(RS_SAFE);
    let second = app
        .step(10_000, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
        .unwrap();
    assert_eq!(second.snapshot.tick, 2);
    assert_eq!(second.published, None);
    assert!(app.has_queued_telemetry());

    conn.network_mut().failures_left = 0;
    app.step(5000, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);

    assert_eq!(conn.transport().messages.len(), 9);
    let published: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Published { tick, .. } => Some(*tick),
            _ => None,
        })
        .collect();
    assert_eq!(published, [2]);
}

#[test]
fn retry_interval_is_fixed() {
    let (mut app, mut hw, mut sink) = start(test_config());
    let mut conn = mock_conn(app.config(), 10);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_SAFE);
    app.step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);

    // Every wait is the same 5 s regardless of how many attempts failed.
    for expected_failures in 2..=5 {
        app.step(4999, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
        assert_eq!(conn.state(), LinkState::WaitingRetry { remaining_ms: 1 });
        app.step(1, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
        assert_eq!(conn.failed_attempts(), expected_failures);
        assert_eq!(conn.state(), LinkState::WaitingRetry { remaining_ms: 5000 });
    }
}

#[test]
fn transport_session_loss_reconnects_transport_only() {
    let (mut app, mut hw, mut sink) = start(test_config());
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_SAFE);
    app.step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    assert_eq!(conn.transport().connects, 1);

    conn.transport_mut().up = false;
    app.step(50, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    app.step(50, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);

    assert_eq!(conn.state(), LinkState::Connected);
    assert_eq!(conn.transport().connects, 2);
    assert_eq!(conn.network().connects, 1);
}
