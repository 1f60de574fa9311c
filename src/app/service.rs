//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, its context and the sleep scheduler.  All
//! I/O flows through port traits injected at call sites, so the whole
//! control loop runs against mock adapters in tests.
//!
//! ```text
//!  SensorPort ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                 │       AppService         │
//! ActuatorPort ◀──│  Water · FSM · Schedule  │ ◀─▶ ChannelPort
//!                 └─────────────────────────┘ ──▶ ConfigPort
//! ```
//!
//! One [`AppService::tick`] is one cooperative loop iteration:
//!
//! 1. read sensors, update the reservoir monitor
//! 2. check the inactive window
//! 3. apply inbound config
//! 4. FSM tick (pump abort, pump completion, moisture sampling)
//! 5. drive the relay
//! 6. publish the event log if it changed (or the link came back)
//! 7. publish telemetry on its interval

use core::time::Duration;

use chrono::{DateTime, FixedOffset};
use log::{debug, info, warn};

use crate::config::{DeviceConfig, TELEMETRY_INTERVAL_MS};
use crate::events::{EventKind, EventLog};
use crate::fsm::context::{FsmContext, SensorSnapshot};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::safety::{WaterState, WaterTransition};
use crate::scheduler::SleepScheduler;

use super::commands::{parse_config_payload, AppCommand};
use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, ChannelPort, ConfigPort, EventSink, SensorPort, Topic};

/// What the caller must do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep looping.
    Continue,
    /// Flush the channel, then deep-sleep for `duration`.
    Sleep {
        wake_at: DateTime<FixedOffset>,
        duration: Duration,
    },
}

impl TickOutcome {
    /// Deep-sleep length, or `None` when there is nothing to sleep.  A zero
    /// duration means the wake instant has already passed.
    pub fn sleep_for(&self) -> Option<Duration> {
        match *self {
            Self::Sleep { duration, .. } if !duration.is_zero() => Some(duration),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    scheduler: SleepScheduler,
    last_telemetry_ms: u64,
    tick_count: u64,
}

impl AppService {
    /// Construct the service.  Does **not** start the FSM; call
    /// [`start`](Self::start) next.
    pub fn new(config: DeviceConfig, scheduler: SleepScheduler) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Monitoring),
            ctx: FsmContext::new(config),
            scheduler,
            last_telemetry_ms: 0,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM and seed the event log with the boot outcome:
    /// a synced clock replaces the log with `init_ok`, otherwise
    /// `ntp_error` is added.
    pub fn start(
        &mut self,
        clock_synced: bool,
        now_ms: u64,
        wall: DateTime<FixedOffset>,
        net: &mut impl ChannelPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        self.ctx.wall = wall;
        self.last_telemetry_ms = now_ms;
        self.fsm.start(&mut self.ctx);

        if clock_synced {
            self.ctx.log_clear();
            self.ctx.log_add(EventKind::InitOk);
        } else {
            warn!("Clock not synced, sleep window may be off");
            self.ctx.log_add(EventKind::NtpError);
        }
        self.ctx.take_events_changed();
        self.publish_events(net, sink);

        sink.emit(&AppEvent::Started { clock_synced });
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one loop iteration.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        wall: DateTime<FixedOffset>,
        hw: &mut (impl SensorPort + ActuatorPort),
        net: &mut impl ChannelPort,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.tick_count += 1;
        self.ctx.now_ms = now_ms;
        self.ctx.wall = wall;
        let prev_state = self.fsm.current_state();

        // 1. Sensors and reservoir interlock
        self.ctx.sensors = hw.read_all();
        let transition = self.ctx.water.update(self.ctx.sensors.water_raw);
        if transition != WaterTransition::Unchanged {
            sink.emit(&AppEvent::WaterChanged(transition));
        }

        // 2. Inactive window
        self.ctx.sleep_requested = self.scheduler.is_inactive(wall);

        // 3. Network and inbound config
        net.service(now_ms);
        while let Some(payload) = net.poll_inbound() {
            self.handle_payload(&payload, store, sink);
        }

        // 4. FSM
        self.fsm.tick(&mut self.ctx);

        // 5. Relay, before anything is published
        self.apply_actuators(hw);

        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }

        // 6. Event log
        let reconnected = net.take_reconnected();
        if self.ctx.take_events_changed() || reconnected {
            self.publish_events(net, sink);
        }

        // 7. Telemetry
        if now_ms.saturating_sub(self.last_telemetry_ms) >= TELEMETRY_INTERVAL_MS {
            self.last_telemetry_ms = now_ms;
            self.publish_telemetry(net, sink);
        }

        if new_state == StateId::Sleeping {
            let wake_at = self.scheduler.next_wake_time(wall);
            let duration = self.scheduler.sleep_duration(wall);
            if prev_state != StateId::Sleeping {
                sink.emit(&AppEvent::SleepScheduled { wake_at, duration });
            }
            return TickOutcome::Sleep { wake_at, duration };
        }
        TickOutcome::Continue
    }

    // ── Command handling ──────────────────────────────────────

    /// Parse and apply one config-topic payload.  Malformed or invalid
    /// payloads change nothing.
    pub fn handle_payload(&mut self, payload: &[u8], store: &impl ConfigPort, sink: &mut impl EventSink) {
        match parse_config_payload(payload) {
            Ok(cmd) => self.handle_command(cmd, store, sink),
            Err(e) => {
                warn!("CONFIG: dropped inbound payload ({})", e);
                sink.emit(&AppEvent::ConfigRejected);
            }
        }
    }

    /// Apply a validated command.  Each present field takes effect
    /// immediately and is persisted on its own.
    pub fn handle_command(&mut self, cmd: AppCommand, store: &impl ConfigPort, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::ApplyConfig(update) => {
                if update.is_empty() {
                    return;
                }
                if let Some(t) = update.threshold_percent {
                    self.ctx.config.threshold_percent = t;
                    if let Err(e) = store.save_threshold(t) {
                        warn!("CONFIG: threshold not persisted: {}", e);
                    }
                }
                if let Some(d) = update.irrigation_duration_ms {
                    self.ctx.config.irrigation_duration_ms = d;
                    if let Err(e) = store.save_duration(d) {
                        warn!("CONFIG: duration not persisted: {}", e);
                    }
                }
                info!(
                    "CONFIG: threshold {:.1}%, duration {} ms",
                    self.ctx.config.threshold_percent, self.ctx.config.irrigation_duration_ms
                );
                sink.emit(&AppEvent::ConfigApplied(self.ctx.config));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current context.
    pub fn build_telemetry(&self) -> TelemetryData {
        TelemetryData {
            humidity_percent: self.ctx.debouncer.last_humidity().unwrap_or(0.0),
            temperature_c: self.ctx.sensors.temperature_c,
            threshold_percent: self.ctx.config.threshold_percent,
            irrigation_duration_ms: self.ctx.config.irrigation_duration_ms,
            water_present: self.ctx.water.is_present(),
        }
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn config(&self) -> DeviceConfig {
        self.ctx.config
    }

    pub fn water(&self) -> WaterState {
        self.ctx.water.state()
    }

    pub fn events(&self) -> &EventLog {
        &self.ctx.events
    }

    pub fn sensors(&self) -> SensorSnapshot {
        self.ctx.sensors
    }

    pub fn is_pump_commanded(&self) -> bool {
        self.ctx.commands.pump_on
    }

    /// Total loop iterations executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_actuators(&self, hw: &mut impl ActuatorPort) {
        let want = self.ctx.commands.pump_on;
        if hw.is_pump_on() != want {
            hw.set_pump(want);
        }
    }

    fn publish_events(&mut self, net: &mut impl ChannelPort, sink: &mut impl EventSink) {
        let json = match self.ctx.events.to_json() {
            Ok(j) => j,
            Err(e) => {
                warn!("EVENTS: serialisation failed: {}", e);
                return;
            }
        };
        match net.publish(Topic::Events, json.as_bytes(), true) {
            Ok(()) => sink.emit(&AppEvent::EventsPublished(self.ctx.events.len())),
            // Republished on the next connection.
            Err(e) => debug!("EVENTS: not published ({})", e),
        }
    }

    fn publish_telemetry(&self, net: &mut impl ChannelPort, sink: &mut impl EventSink) {
        let data = self.build_telemetry();
        sink.emit(&AppEvent::Telemetry(data));
        match data.to_json() {
            Ok(json) => {
                if let Err(e) = net.publish(Topic::Telemetry, json.as_bytes(), false) {
                    debug!("TELEMETRY: not published ({})", e);
                }
            }
            Err(e) => warn!("TELEMETRY: serialisation failed: {}", e),
        }
    }
}
