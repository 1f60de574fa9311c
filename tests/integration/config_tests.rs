//! Remote configuration over the config topic, and persistence across
//! restarts.

use irrigator::adapters::nvs::NvsAdapter;
use irrigator::app::events::AppEvent;
use irrigator::app::ports::ConfigPort;
use irrigator::app::service::AppService;
use irrigator::config::DeviceConfig;
use irrigator::fsm::StateId;
use irrigator::scheduler::SleepScheduler;

use super::mock_hw::{MockChannel, MockHardware, RecordingSink, Rig, SOIL_DRY, morning};

#[test]
fn threshold_update_applies_and_persists() {
    let mut rig = Rig::new(DeviceConfig::default());
    rig.net.push_inbound(r#"{"umbral": 55.5}"#);
    rig.step(10);

    assert!((rig.app.config().threshold_percent - 55.5).abs() < f32::EPSILON);
    assert!((rig.store.stored.borrow().threshold_percent - 55.5).abs() < f32::EPSILON);
    assert_eq!(*rig.store.writes.borrow(), 1);
    assert!(rig.sink.events.iter().any(|e| matches!(e, AppEvent::ConfigApplied(_))));
}

#[test]
fn both_fields_apply_in_one_payload() {
    let mut rig = Rig::new(DeviceConfig::default());
    rig.net.push_inbound(r#"{"umbral": 40, "duracion": 15000}"#);
    rig.step(10);
    assert_eq!(rig.app.config().irrigation_duration_ms, 15_000);
    assert!((rig.app.config().threshold_percent - 40.0).abs() < f32::EPSILON);
    assert_eq!(*rig.store.writes.borrow(), 2);
}

#[test]
fn malformed_and_invalid_payloads_change_nothing() {
    let mut rig = Rig::new(DeviceConfig::default());
    for bad in [
        "not json",
        r#"{"umbral": "high"}"#,
        r#"{"umbral": 150}"#,
        r#"{"duracion": 0}"#,
        r#"{"umbral": 50, "duracion": 0}"#,
    ] {
        rig.net.push_inbound(bad);
    }
    rig.step(10);

    assert_eq!(rig.app.config(), DeviceConfig::default());
    assert_eq!(*rig.store.writes.borrow(), 0);
    let rejected = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::ConfigRejected))
        .count();
    assert_eq!(rejected, 5);
}

#[test]
fn empty_object_is_a_noop() {
    let mut rig = Rig::new(DeviceConfig::default());
    rig.net.push_inbound("{}");
    rig.step(10);
    assert_eq!(*rig.store.writes.borrow(), 0);
    assert!(!rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::ConfigApplied(_) | AppEvent::ConfigRejected
    )));
}

#[test]
fn raised_threshold_turns_wet_enough_soil_dry() {
    let mut rig = Rig::new(DeviceConfig::default());
    // ~52 % humidity: above a 40 % threshold, below 60 %.
    rig.hw.moisture_raw = 2_500;
    rig.net.push_inbound(r#"{"umbral": 40}"#);
    rig.run_window();
    assert_eq!(rig.app.state(), StateId::Monitoring);

    rig.net.push_inbound(r#"{"umbral": 60}"#);
    rig.run_window();
    assert_eq!(rig.app.state(), StateId::Irrigating);
}

#[test]
fn duration_change_mid_cycle_applies_to_the_next_cycle() {
    let mut rig = Rig::new(DeviceConfig {
        threshold_percent: 70.0,
        irrigation_duration_ms: 10_000,
    });
    rig.hw.moisture_raw = SOIL_DRY;
    rig.run_window();
    assert!(rig.hw.pump_on());

    rig.net.push_inbound(r#"{"duracion": 1000}"#);
    rig.step(2_000);
    assert!(rig.hw.pump_on(), "running cycle keeps its captured duration");
    rig.step(8_000);
    assert!(!rig.hw.pump_on());
}

#[test]
fn threshold_survives_restart() {
    let nvs = NvsAdapter::new().unwrap();

    {
        let mut app = AppService::new(nvs.load().unwrap(), SleepScheduler::default());
        let mut hw = MockHardware::new();
        let mut net = MockChannel::new();
        let mut sink = RecordingSink::new();
        app.start(true, 0, morning(), &mut net, &mut sink);
        net.push_inbound(r#"{"umbral": 33.0}"#);
        app.tick(10, morning(), &mut hw, &mut net, &nvs, &mut sink);
        assert!((app.config().threshold_percent - 33.0).abs() < f32::EPSILON);
    }

    // Deep sleep wipes RAM; only the store survives.
    let reloaded = nvs.load().unwrap();
    assert!((reloaded.threshold_percent - 33.0).abs() < f32::EPSILON);
    assert_eq!(reloaded.irrigation_duration_ms, 60_000);
}
