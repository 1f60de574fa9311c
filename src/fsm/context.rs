//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the blackboard the state handlers read from and write
//! to: the latest sensor snapshot, the actuator command output, operator
//! config, the water interlock, the control primitives and the pending
//! event log.  The application service fills in the inputs before each
//! tick and applies `commands` and `events` afterwards.

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::DeviceConfig;
use crate::control::debouncer::MoistureDebouncer;
use crate::control::pump::PumpController;
use crate::events::{EventKind, EventLog};
use crate::safety::WaterLevelMonitor;

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to state handlers; written by the service)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of every sensor in the system.
#[derive(Debug, Clone, Copy)]
pub struct SensorSnapshot {
    /// Raw capacitive moisture reading (0 – 4095, lower is wetter).
    pub moisture_raw: u16,
    /// Raw reservoir sensor reading (0 – 4095, low means water present).
    pub water_raw: u16,
    /// Ambient temperature (°C); `None` when no sensor answers.
    pub temperature_c: Option<f32>,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        // Dry soil and an empty reservoir until the first real read.
        Self {
            moisture_raw: u16::MAX,
            water_raw: u16::MAX,
            temperature_c: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator commands (written by state handlers; consumed by the service)
// ---------------------------------------------------------------------------

/// Commands that state handlers write to request actuator actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorCommands {
    /// Pump relay energised.
    pub pump_on: bool,
}

impl ActuatorCommands {
    /// All actuators off.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    // -- Timing --
    /// Monotonic milliseconds since boot.
    pub now_ms: u64,
    /// Local wall-clock time, used for event timestamps.
    pub wall: DateTime<FixedOffset>,
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,

    // -- Inputs --
    pub sensors: SensorSnapshot,
    pub config: DeviceConfig,
    /// Set by the service when the wall clock is inside the inactive window.
    pub sleep_requested: bool,

    // -- Outputs --
    pub commands: ActuatorCommands,
    /// Pending status events, published retained whenever they change.
    pub events: EventLog,
    /// True when `events` changed during the current tick.
    pub events_changed: bool,

    // -- Control state --
    pub water: WaterLevelMonitor,
    pub debouncer: MoistureDebouncer,
    pub pump: PumpController,
}

impl FsmContext {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            now_ms: 0,
            wall: DateTime::<Utc>::UNIX_EPOCH.fixed_offset(),
            ticks_in_state: 0,
            total_ticks: 0,
            sensors: SensorSnapshot::default(),
            config,
            sleep_requested: false,
            commands: ActuatorCommands::all_off(),
            events: EventLog::new(),
            events_changed: false,
            water: WaterLevelMonitor::new(),
            debouncer: MoistureDebouncer::new(),
            pump: PumpController::new(),
        }
    }

    // ── Event log helpers (track whether a republish is due) ──────────

    pub fn log_add(&mut self, kind: EventKind) {
        let at = self.wall;
        self.events_changed |= self.events.add(kind, at);
    }

    pub fn log_remove(&mut self, kind: EventKind) {
        self.events_changed |= self.events.remove(kind);
    }

    pub fn log_remove_all(&mut self, group: &[EventKind]) {
        self.events_changed |= self.events.remove_all(group);
    }

    pub fn log_clear(&mut self) {
        self.events_changed |= self.events.clear();
    }

    /// Return and reset the change flag.
    pub fn take_events_changed(&mut self) -> bool {
        core::mem::take(&mut self.events_changed)
    }
}
