//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production, stderr on the host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::safety::WaterTransition;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn opt(v: Option<f32>) -> heapless::String<12> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = match v {
        Some(x) => write!(s, "{:.1}", x),
        None => write!(s, "--"),
    };
    s
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { clock_synced } => {
                info!("START | clock={}", if *clock_synced { "synced" } else { "unsynced" });
            }
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | hum={:.1}% | T={}\u{00b0}C | thr={:.1}% | dur={}ms | water={}",
                    t.humidity_percent,
                    opt(t.temperature_c),
                    t.threshold_percent,
                    t.irrigation_duration_ms,
                    if t.water_present { "OK" } else { "LOW" },
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            AppEvent::WaterChanged(WaterTransition::WentAbsent) => {
                warn!("WATER | reservoir empty, pump locked out");
            }
            AppEvent::WaterChanged(WaterTransition::Restored) => {
                info!("WATER | reservoir refilled, lockout cleared");
            }
            AppEvent::WaterChanged(other) => {
                info!("WATER | {:?}", other);
            }
            AppEvent::ConfigApplied(c) => {
                info!(
                    "CONFIG | threshold={:.1}% duration={}ms",
                    c.threshold_percent, c.irrigation_duration_ms
                );
            }
            AppEvent::ConfigRejected => {
                warn!("CONFIG | inbound payload rejected");
            }
            AppEvent::EventsPublished(n) => {
                info!("EVENTS | published {} pending", n);
            }
            AppEvent::SleepScheduled { wake_at, duration } => {
                info!("SLEEP | wake at {} (in {} s)", wake_at, duration.as_secs());
            }
        }
    }
}
