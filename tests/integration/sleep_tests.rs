//! Inactive window: sleep entry, event log reset and wake computation.

use core::time::Duration;

use irrigator::app::events::AppEvent;
use irrigator::app::service::TickOutcome;
use irrigator::config::DeviceConfig;
use irrigator::events::EventKind;
use irrigator::fsm::StateId;
use super::mock_hw::{at, Rig, SOIL_DRY};

#[test]
fn entering_the_window_leaves_only_sleep_event() {
    let mut rig = Rig::started_at(
        DeviceConfig::default(),
        at(2, (2026, 6, 1), (15, 59, 58)),
        true,
    );
    assert_eq!(rig.step(1_000), TickOutcome::Continue);

    let outcome = rig.step(1_000);
    assert_eq!(rig.app.state(), StateId::Sleeping);
    assert_eq!(rig.kinds(), vec![EventKind::SleepNocturno]);
    assert_eq!(rig.net.last_events(), vec!["sleep_nocturno"]);
    assert_eq!(
        outcome,
        TickOutcome::Sleep {
            wake_at: at(2, (2026, 6, 2), (8, 0, 0)),
            duration: Duration::from_secs(16 * 3600),
        }
    );
}

#[test]
fn window_cuts_a_running_cycle_short() {
    let mut rig = Rig::started_at(
        DeviceConfig::default(),
        at(2, (2026, 6, 1), (15, 59, 50)),
        true,
    );
    rig.hw.moisture_raw = SOIL_DRY;
    rig.run_window();
    assert!(rig.hw.pump_on());

    rig.step(4_000);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.app.state(), StateId::Sleeping);
    assert_eq!(rig.kinds(), vec![EventKind::SleepNocturno]);
}

#[test]
fn boot_inside_window_sleeps_on_first_tick() {
    let mut rig = Rig::started_at(
        DeviceConfig::default(),
        at(2, (2026, 6, 2), (6, 30, 0)),
        true,
    );
    match rig.step(10) {
        TickOutcome::Sleep { wake_at, duration } => {
            assert_eq!(wake_at, at(2, (2026, 6, 2), (8, 0, 0)));
            assert!(duration < Duration::from_secs(90 * 60));
        }
        other => panic!("expected sleep, got {other:?}"),
    }
}

#[test]
fn sleep_is_announced_once() {
    let mut rig = Rig::started_at(
        DeviceConfig::default(),
        at(2, (2026, 6, 1), (20, 0, 0)),
        true,
    );
    rig.step(10);
    rig.step(10);
    rig.step(10);
    let announced = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::SleepScheduled { .. }))
        .count();
    assert_eq!(announced, 1);
}

#[test]
fn unsynced_clock_reports_ntp_error_and_keeps_running() {
    let mut rig = Rig::started_at(
        DeviceConfig::default(),
        at(0, (1970, 1, 1), (10, 0, 0)),
        false,
    );
    assert_eq!(rig.kinds(), vec![EventKind::NtpError]);
    assert_eq!(rig.net.last_events(), vec!["ntp_error"]);
    assert_eq!(rig.step(10), TickOutcome::Continue);
}

#[test]
fn synced_clock_starts_with_init_ok() {
    let rig = Rig::new(DeviceConfig::default());
    assert_eq!(rig.kinds(), vec![EventKind::InitOk]);
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Started { clock_synced: true })));
}
