//! Pump cycle controller.
//!
//! Pure timing and interlock logic; the relay itself is driven by
//! [`crate::drivers::pump::PumpRelay`] through the actuator port.
//!
//! While running, every iteration checks, in order:
//!
//! 1. **Safety abort**: the reservoir reads empty → stop now.
//! 2. **Completion**: the captured run length has elapsed → stop.
//!
//! The run length is captured when the cycle starts, so a config change
//! mid-cycle only affects the next one.

use log::{info, warn};

use crate::config::WATER_ABSENT_ABOVE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Off,
    On { started_ms: u64, duration_ms: u32 },
}

/// Why a running cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Reservoir ran dry mid-cycle.
    SafetyAbort,
    /// Configured run length elapsed.
    Completed,
}

#[derive(Debug, Clone)]
pub struct PumpController {
    state: PumpState,
}

impl Default for PumpController {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpController {
    pub const fn new() -> Self {
        Self { state: PumpState::Off }
    }

    /// Begin a cycle.  Returns `false` if one is already running.
    pub fn start(&mut self, now_ms: u64, duration_ms: u32) -> bool {
        if self.is_on() {
            return false;
        }
        self.state = PumpState::On {
            started_ms: now_ms,
            duration_ms,
        };
        info!("PUMP: on for {} ms", duration_ms);
        true
    }

    /// Check the running cycle against the current reservoir reading.
    /// Returns the stop cause if the pump must turn off this iteration.
    pub fn check(&mut self, now_ms: u64, water_raw: u16) -> Option<StopCause> {
        let PumpState::On { started_ms, duration_ms } = self.state else {
            return None;
        };

        if water_raw > WATER_ABSENT_ABOVE {
            self.state = PumpState::Off;
            warn!("PUMP: safety abort, reservoir empty (raw={})", water_raw);
            return Some(StopCause::SafetyAbort);
        }

        if now_ms.saturating_sub(started_ms) >= u64::from(duration_ms) {
            self.state = PumpState::Off;
            info!("PUMP: cycle complete after {} ms", duration_ms);
            return Some(StopCause::Completed);
        }

        None
    }

    /// Force the pump off without a stop cause (sleep entry).
    pub fn stop(&mut self) {
        if self.is_on() {
            info!("PUMP: stopped");
        }
        self.state = PumpState::Off;
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        matches!(self.state, PumpState::On { .. })
    }
}
