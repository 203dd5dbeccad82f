//! Firmware update channel as the service drives it.

use envguard::adapters::ota::{deliver, OtaUpdater};
use envguard::app::events::AppEvent;
use envguard::app::ports::OtaProgress;
use envguard::app::service::MonitorService;
use envguard::classifier::HazardStatus;
use envguard::connectivity::LinkState;
use envguard::error::OtaError;

use crate::mock_hw::*;

fn started() -> (MonitorService, MockHw, RecordingSink) {
    let mut app = MonitorService::new(test_config());
    let mut hw = MockHw::new();
    let mut sink = RecordingSink::default();
    app.bring_up(&mut hw, &mut CountingDelay::default(), &mut sink)
        .unwrap();
    sink.clear();
    (app, hw, sink)
}

fn update_events(sink: &RecordingSink) -> Vec<AppEvent> {
    sink.events
        .iter()
        .filter(|e| {
            matches!(
                e,
                AppEvent::OtaStarted { .. } | AppEvent::OtaReady | AppEvent::OtaFailed(_)
            )
        })
        .cloned()
        .collect()
}

fn receiving(written: u32, total: u32) -> Result<OtaProgress, OtaError> {
    Ok(OtaProgress::Receiving { written, total })
}

#[test]
fn update_is_serviced_while_alarm_pattern_plays() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_DANGER);
    app.step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
        .unwrap();
    assert_eq!(ota.polls, 1);

    ota.script.extend([
        receiving(0, 1024),
        receiving(512, 1024),
        receiving(1024, 1024),
        Ok(OtaProgress::ReadyToReboot),
    ]);
    for _ in 0..4 {
        assert!(app
            .step(500, &mut hw, &mut conn, &mut ota, &mut sink, &mut views)
            .is_none());
    }

    assert_eq!(app.alerts().active_status(), Some(HazardStatus::Danger));
    assert_eq!(ota.polls, 5);
    assert_eq!(
        update_events(&sink),
        [AppEvent::OtaStarted { total: 1024 }, AppEvent::OtaReady]
    );
    assert!(app.update_ready());
}

#[test]
fn update_is_serviced_during_reconnect_wait() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 10);
    let mut ota = MockOta::default();
    let mut views = ViewSink::default();
    hw.script_gas_tick(RS_SAFE);
    app.step(0, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    assert_eq!(conn.state(), LinkState::WaitingRetry { remaining_ms: 5000 });

    ota.script
        .extend([receiving(0, 2048), receiving(512, 2048), receiving(1024, 2048)]);
    for _ in 0..3 {
        app.step(1000, &mut hw, &mut conn, &mut ota, &mut sink, &mut views);
    }

    assert_eq!(conn.state(), LinkState::WaitingRetry { remaining_ms: 2000 });
    assert_eq!(ota.polls, 4);
    assert_eq!(
        app.update_progress(),
        OtaProgress::Receiving {
            written: 1024,
            total: 2048
        }
    );
    assert_eq!(update_events(&sink), [AppEvent::OtaStarted { total: 2048 }]);
}

#[test]
fn failed_session_is_reported_and_a_new_one_starts() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    ota.script.extend([
        receiving(0, 8),
        Err(OtaError::VerifyFailed),
        receiving(0, 8),
    ]);

    for _ in 0..3 {
        app.advance(10, &mut hw, &mut conn, &mut ota, &mut sink);
    }

    assert_eq!(
        update_events(&sink),
        [
            AppEvent::OtaStarted { total: 8 },
            AppEvent::OtaFailed(OtaError::VerifyFailed),
            AppEvent::OtaStarted { total: 8 },
        ]
    );
    assert!(!app.update_ready());
}

#[test]
fn blocking_tick_polls_update_once() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut ota = MockOta::default();
    ota.script.push_back(receiving(0, 64));
    hw.script_gas_tick(RS_SAFE);

    app.tick_blocking(
        &mut hw,
        &mut conn,
        &mut ota,
        &mut CountingDelay::default(),
        &mut sink,
        &mut ViewSink::default(),
    );

    assert_eq!(ota.polls, 1);
    assert_eq!(update_events(&sink), [AppEvent::OtaStarted { total: 64 }]);
}

#[test]
fn image_delivered_over_inbox_becomes_bootable() {
    let (mut app, mut hw, mut sink) = started();
    let mut conn = mock_conn(app.config(), 0);
    let mut views = ViewSink::default();
    let (mut updater, inbox) = OtaUpdater::new();

    let image = b"envguard firmware image";
    let mut begin = (image.len() as u32).to_le_bytes().to_vec();
    begin.extend_from_slice(&hmac_sha256::Hash::hash(image));
    let mut first = 0u32.to_le_bytes().to_vec();
    first.extend_from_slice(&image[..12]);
    let mut rest = 12u32.to_le_bytes().to_vec();
    rest.extend_from_slice(&image[12..]);

    assert!(deliver(&inbox, "begin", &begin));
    assert!(deliver(&inbox, "chunk", &first));
    assert!(deliver(&inbox, "chunk", &rest));
    assert!(deliver(&inbox, "finalize", &[]));

    hw.script_gas_tick(RS_SAFE);
    app.step(0, &mut hw, &mut conn, &mut updater, &mut sink, &mut views);
    assert_eq!(
        app.update_progress(),
        OtaProgress::Receiving {
            written: 0,
            total: image.len() as u32
        }
    );
    for _ in 0..3 {
        app.step(100, &mut hw, &mut conn, &mut updater, &mut sink, &mut views);
    }

    assert!(app.update_ready());
    assert_eq!(
        update_events(&sink),
        [
            AppEvent::OtaStarted {
                total: image.len() as u32
            },
            AppEvent::OtaReady,
        ]
    );
}
