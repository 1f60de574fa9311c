//! End-to-end control loop: sensors → water interlock → debouncer → pump
//! → relay → event log and telemetry on the channel.

use irrigator::app::events::AppEvent;
use irrigator::app::ports::Topic;
use irrigator::config::DeviceConfig;
use irrigator::events::EventKind;
use irrigator::fsm::StateId;
use irrigator::safety::WaterTransition;

use super::mock_hw::{ActuatorCall, Rig, SOIL_DRY, SOIL_WET, WATER_EMPTY, WATER_FULL};

fn short_cycle() -> DeviceConfig {
    DeviceConfig {
        threshold_percent: 70.0,
        irrigation_duration_ms: 10_000,
    }
}

// ── Irrigation cycle ──────────────────────────────────────────

#[test]
fn dry_soil_runs_one_full_cycle() {
    let mut rig = Rig::new(short_cycle());
    rig.hw.moisture_raw = SOIL_DRY;

    rig.run_window();
    assert_eq!(rig.app.state(), StateId::Irrigating);
    assert!(rig.hw.pump_on(), "relay closes in the deciding tick");
    assert!(rig.kinds().contains(&EventKind::PumpOn));
    assert!(rig.net.last_events().contains(&"pump_on".to_string()));

    // Just short of the run length: still pumping.
    rig.step(9_999);
    assert!(rig.hw.pump_on());

    rig.step(1);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.app.state(), StateId::Monitoring);
    assert!(rig.kinds().contains(&EventKind::PumpOffDone));
    assert!(!rig.kinds().contains(&EventKind::PumpOn));
    assert_eq!(rig.hw.calls, vec![ActuatorCall::SetPump(true), ActuatorCall::SetPump(false)]);
}

#[test]
fn wet_soil_never_pumps() {
    let mut rig = Rig::new(short_cycle());
    rig.hw.moisture_raw = SOIL_WET;
    for _ in 0..5 {
        rig.run_window();
    }
    assert!(rig.hw.calls.is_empty());
    assert_eq!(rig.app.state(), StateId::Monitoring);
    assert_eq!(rig.kinds(), vec![EventKind::InitOk]);
}

#[test]
fn one_wet_sample_in_the_window_vetoes() {
    let mut rig = Rig::new(short_cycle());
    rig.hw.moisture_raw = SOIL_DRY;
    rig.step(0);
    rig.step(2_000);
    rig.hw.moisture_raw = SOIL_WET;
    rig.step(2_000);
    rig.hw.moisture_raw = SOIL_DRY;
    rig.step(2_000);
    assert_eq!(rig.app.state(), StateId::Monitoring);
    assert_eq!(rig.hw.switch_ons(), 0);
}

#[test]
fn dry_window_with_empty_reservoir_is_blocked() {
    let mut rig = Rig::new(short_cycle());
    rig.hw.moisture_raw = SOIL_DRY;
    rig.hw.water_raw = WATER_EMPTY;

    rig.run_window();
    assert_eq!(rig.app.state(), StateId::Monitoring);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.hw.switch_ons(), 0);
    assert!(rig.kinds().contains(&EventKind::PumpBlockedNoWater));
    assert!(
        rig.net.last_events().contains(&"pump_blocked_no_water".to_string())
    );
}

#[test]
fn reservoir_running_dry_stops_pump_in_the_same_tick() {
    let mut rig = Rig::new(short_cycle());
    rig.hw.moisture_raw = SOIL_DRY;
    rig.run_window();
    assert!(rig.hw.pump_on());

    rig.hw.water_raw = WATER_EMPTY;
    rig.step(100);
    assert!(!rig.hw.pump_on());
    assert!(rig.app.water().lockout);
    assert!(rig.kinds().contains(&EventKind::PumpOffNoWater));
    assert!(!rig.kinds().contains(&EventKind::PumpOn));
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::WaterChanged(WaterTransition::WentAbsent))));

    // Still dry soil, but no restart until water comes back.
    for _ in 0..3 {
        rig.run_window();
    }
    assert_eq!(rig.hw.switch_ons(), 1);
}

#[test]
fn refilled_reservoir_clears_lockout_and_irrigation_resumes() {
    let mut rig = Rig::new(short_cycle());
    rig.hw.moisture_raw = SOIL_DRY;
    rig.hw.water_raw = WATER_EMPTY;
    rig.run_window();
    assert!(rig.app.water().lockout);

    rig.hw.water_raw = WATER_FULL;
    rig.run_window();
    assert!(!rig.app.water().lockout);
    assert_eq!(rig.app.state(), StateId::Irrigating);
    assert!(!rig.kinds().contains(&EventKind::PumpBlockedNoWater));
}

#[test]
fn ambiguous_water_reading_changes_nothing() {
    let mut rig = Rig::new(short_cycle());
    rig.step(0);
    assert!(rig.app.water().present);
    let events_before = rig.sink.events.len();

    rig.hw.water_raw = 2_000;
    rig.step(100);
    assert!(rig.app.water().present);
    assert!(!rig.app.water().lockout);
    assert!(!rig.sink.events[events_before..]
        .iter()
        .any(|e| matches!(e, AppEvent::WaterChanged(_))));
}

// ── Channel output ────────────────────────────────────────────

#[test]
fn telemetry_every_five_seconds_with_wire_fields() {
    let mut rig = Rig::new(short_cycle());
    for _ in 0..10 {
        rig.step(1_000);
    }
    let telemetry = rig.net.on(Topic::Telemetry);
    assert_eq!(telemetry.len(), 2);
    assert!(telemetry.iter().all(|p| !p.retain));

    let v: serde_json::Value = serde_json::from_str(&telemetry[1].payload).unwrap();
    assert_eq!(v["umbral"], 70.0);
    assert_eq!(v["duracion"], 10_000);
    assert_eq!(v["nivel_agua"], true);
    assert_eq!(v["temperatura"], 21.5);
    assert!(v["humedad"].is_number());
}

#[test]
fn event_log_is_published_retained_and_only_on_change() {
    let mut rig = Rig::new(short_cycle());
    let at_start = rig.net.on(Topic::Events).len();
    assert_eq!(at_start, 1, "start publishes the seeded log");
    assert!(rig.net.on(Topic::Events).iter().all(|p| p.retain));
    assert_eq!(rig.net.last_events(), vec!["init_ok"]);

    for _ in 0..20 {
        rig.step(500);
    }
    assert_eq!(rig.net.on(Topic::Events).len(), at_start);
}

#[test]
fn reconnect_republishes_current_log() {
    let mut rig = Rig::new(short_cycle());
    rig.net.connected = false;
    rig.hw.moisture_raw = SOIL_DRY;
    rig.run_window();
    assert!(rig.kinds().contains(&EventKind::PumpOn));
    let published = rig.net.on(Topic::Events).len();

    rig.net.reconnect();
    rig.step(10);
    assert_eq!(rig.net.on(Topic::Events).len(), published + 1);
    assert_eq!(rig.net.last_events(), vec!["init_ok", "pump_on"]);
}

#[test]
fn offline_channel_does_not_stop_irrigation() {
    let mut rig = Rig::new(short_cycle());
    rig.net.connected = false;
    rig.hw.moisture_raw = SOIL_DRY;
    rig.run_window();
    assert!(rig.hw.pump_on());
    rig.step(10_000);
    assert!(!rig.hw.pump_on());
}
