//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, count, ignore).

use core::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::config::DeviceConfig;
use crate::fsm::StateId;
use crate::safety::WaterTransition;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started.
    Started { clock_synced: bool },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// The reservoir monitor changed state.
    WaterChanged(WaterTransition),

    /// A config update was applied (and persisted where possible).
    ConfigApplied(DeviceConfig),

    /// An inbound config payload was dropped.
    ConfigRejected,

    /// The pending event log was published; carries the entry count.
    EventsPublished(usize),

    /// The device is about to enter deep sleep.
    SleepScheduled {
        wake_at: DateTime<FixedOffset>,
        duration: Duration,
    },
}

/// A point-in-time telemetry snapshot, serialised as the telemetry payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryData {
    /// Last sampled humidity (%), 0 before the first sample.
    #[serde(rename = "humedad")]
    pub humidity_percent: f32,
    #[serde(rename = "temperatura")]
    pub temperature_c: Option<f32>,
    #[serde(rename = "umbral")]
    pub threshold_percent: f32,
    #[serde(rename = "duracion")]
    pub irrigation_duration_ms: u32,
    #[serde(rename = "nivel_agua")]
    pub water_present: bool,
}

impl TelemetryData {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
