//! Mock adapters for integration tests.
//!
//! Records every actuator call, publish and emitted event so tests can
//! assert on the full history without touching real GPIO or a broker.

use std::cell::RefCell;
use std::collections::VecDeque;

use irrigator::app::events::AppEvent;
use irrigator::app::ports::{
    ActuatorPort, ChannelError, ChannelPort, ConfigError, ConfigPort, EventSink, INBOUND_MAX,
    SensorPort, Topic,
};
use irrigator::app::service::{AppService, TickOutcome};
use irrigator::config::{validate_duration, validate_threshold, DeviceConfig};
use irrigator::events::EventKind;
use irrigator::scheduler::SleepScheduler;
use chrono::{DateTime, FixedOffset, TimeZone};

/// Raw readings that sit well inside each calibration band.
pub const SOIL_DRY: u16 = 4095;
pub const SOIL_WET: u16 = 1000;
pub const WATER_FULL: u16 = 20;
pub const WATER_EMPTY: u16 = 4095;

/// Local time at a whole-hour UTC offset.
pub fn at(
    offset_h: i32,
    (y, mo, d): (i32, u32, u32),
    (h, mi, s): (u32, u32, u32),
) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(offset_h * 3600)
        .expect("offset in range")
        .with_ymd_and_hms(y, mo, d, h, mi, s)
        .single()
        .expect("valid local time")
}

/// Mid-morning, well outside the inactive window.
pub fn morning() -> DateTime<FixedOffset> {
    at(2, (2026, 6, 1), (10, 0, 0))
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    SetPump(bool),
}

pub struct MockHardware {
    pub moisture_raw: u16,
    pub water_raw: u16,
    pub temperature_c: Option<f32>,
    pub calls: Vec<ActuatorCall>,
    relay: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            moisture_raw: SOIL_WET,
            water_raw: WATER_FULL,
            temperature_c: Some(21.5),
            calls: Vec::new(),
            relay: false,
        }
    }

    pub fn pump_on(&self) -> bool {
        self.relay
    }

    pub fn switch_ons(&self) -> usize {
        self.calls.iter().filter(|c| **c == ActuatorCall::SetPump(true)).count()
    }
}

impl SensorPort for MockHardware {
    fn read_moisture_raw(&mut self) -> u16 {
        self.moisture_raw
    }

    fn read_water_level_raw(&mut self) -> u16 {
        self.water_raw
    }

    fn read_temperature_c(&mut self) -> Option<f32> {
        self.temperature_c
    }
}

impl ActuatorPort for MockHardware {
    fn set_pump(&mut self, on: bool) {
        self.calls.push(ActuatorCall::SetPump(on));
        self.relay = on;
    }

    fn is_pump_on(&self) -> bool {
        self.relay
    }
}

// ── MockChannel ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: Topic,
    pub payload: String,
    pub retain: bool,
}

pub struct MockChannel {
    pub connected: bool,
    pub published: Vec<Published>,
    inbound: VecDeque<heapless::Vec<u8, INBOUND_MAX>>,
    reconnected: bool,
}

#[allow(dead_code)]
impl MockChannel {
    pub fn new() -> Self {
        Self {
            connected: true,
            published: Vec::new(),
            inbound: VecDeque::new(),
            reconnected: false,
        }
    }

    pub fn push_inbound(&mut self, payload: &str) {
        let mut buf = heapless::Vec::new();
        buf.extend_from_slice(payload.as_bytes())
            .expect("test payload fits");
        self.inbound.push_back(buf);
    }

    /// Simulate the broker session coming back.
    pub fn reconnect(&mut self) {
        self.connected = true;
        self.reconnected = true;
    }

    pub fn on(&self, topic: Topic) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    /// Event names from the most recent events publish.
    pub fn last_events(&self) -> Vec<String> {
        let Some(last) = self.on(Topic::Events).last().copied() else {
            return Vec::new();
        };
        let v: serde_json::Value = serde_json::from_str(&last.payload).expect("valid JSON");
        v.as_array()
            .expect("array")
            .iter()
            .map(|e| e["evento"].as_str().expect("evento").to_owned())
            .collect()
    }
}

impl ChannelPort for MockChannel {
    fn publish(&mut self, topic: Topic, payload: &[u8], retain: bool) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        self.published.push(Published {
            topic,
            payload: String::from_utf8(payload.to_vec()).expect("utf-8"),
            retain,
        });
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<heapless::Vec<u8, INBOUND_MAX>> {
        self.inbound.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn take_reconnected(&mut self) -> bool {
        core::mem::take(&mut self.reconnected)
    }

    fn service(&mut self, _now_ms: u64) {}
}

// ── MockConfigStore ───────────────────────────────────────────

/// ConfigPort that validates like the NVS adapter and records writes.
pub struct MockConfigStore {
    pub stored: RefCell<DeviceConfig>,
    pub writes: RefCell<u32>,
}

#[allow(dead_code)]
impl MockConfigStore {
    pub fn new() -> Self {
        Self {
            stored: RefCell::new(DeviceConfig::default()),
            writes: RefCell::new(0),
        }
    }
}

impl ConfigPort for MockConfigStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(*self.stored.borrow())
    }

    fn save_threshold(&self, percent: f32) -> Result<(), ConfigError> {
        validate_threshold(percent)?;
        self.stored.borrow_mut().threshold_percent = percent;
        *self.writes.borrow_mut() += 1;
        Ok(())
    }

    fn save_duration(&self, duration_ms: u32) -> Result<(), ConfigError> {
        validate_duration(duration_ms)?;
        self.stored.borrow_mut().irrigation_duration_ms = duration_ms;
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Service plus mocks, with a simulated clock.
pub struct Rig {
    pub app: AppService,
    pub hw: MockHardware,
    pub net: MockChannel,
    pub store: MockConfigStore,
    pub sink: RecordingSink,
    pub now_ms: u64,
    pub wall: DateTime<FixedOffset>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: DeviceConfig) -> Self {
        Self::started_at(config, morning(), true)
    }

    pub fn started_at(config: DeviceConfig, wall: DateTime<FixedOffset>, clock_synced: bool) -> Self {
        let mut rig = Self {
            app: AppService::new(config, SleepScheduler::default()),
            hw: MockHardware::new(),
            net: MockChannel::new(),
            store: MockConfigStore::new(),
            sink: RecordingSink::new(),
            now_ms: 0,
            wall,
        };
        rig.app
            .start(clock_synced, rig.now_ms, rig.wall, &mut rig.net, &mut rig.sink);
        rig
    }

    /// Advance both clocks by `ms` and run one tick.
    pub fn step(&mut self, ms: u64) -> TickOutcome {
        self.now_ms += ms;
        self.wall += chrono::TimeDelta::milliseconds(ms as i64);
        self.app.tick(
            self.now_ms,
            self.wall,
            &mut self.hw,
            &mut self.net,
            &self.store,
            &mut self.sink,
        )
    }

    /// Tick until a sampling window completes: one tick to open it,
    /// then three samples 2 s apart.
    pub fn run_window(&mut self) {
        self.step(0);
        for _ in 0..3 {
            self.step(2_000);
        }
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.app.events().kinds().to_vec()
    }
}
