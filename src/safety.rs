//! Water-level monitor and pump interlock.
//!
//! Runs **every iteration before anything else** and classifies the raw
//! reservoir reading with a hysteresis band:
//!
//! ```text
//!   raw:  0 ──── 100 ─────────────────────── 4000 ──── 4095
//!         │present│      (no change)          │ absent │
//! ```
//!
//! ## Lockout lifecycle
//!
//! 1. The reservoir reads empty (or the pump trips on a dry reading).
//! 2. `lockout` latches.  The pump may not start while it is set.
//! 3. Only a transition back to `present` clears it.  Time passing or
//!    a pump cycle ending never does.
//!
//! The monitor boots locked out: the pump stays interlocked until water
//! has been seen at least once.

use log::{info, warn};

use crate::config::{WATER_ABSENT_ABOVE, WATER_PRESENT_BELOW};

/// Reservoir presence plus the latched interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterState {
    pub present: bool,
    pub lockout: bool,
}

impl Default for WaterState {
    fn default() -> Self {
        Self {
            present: false,
            lockout: true,
        }
    }
}

/// What an [`WaterLevelMonitor::update`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterTransition {
    /// Reading was ambiguous or matched the current state.
    Unchanged,
    /// Water went missing; lockout latched.
    WentAbsent,
    /// Water came back and cleared an active lockout.
    Restored,
    /// Water came back while no lockout was active.
    Present,
}

/// Hysteresis classifier and lockout latch.
#[derive(Debug, Default)]
pub struct WaterLevelMonitor {
    state: WaterState,
}

impl WaterLevelMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one raw reading.  Readings strictly inside the band leave
    /// the state untouched.
    pub fn update(&mut self, raw: u16) -> WaterTransition {
        if raw < WATER_PRESENT_BELOW {
            if self.state.present {
                return WaterTransition::Unchanged;
            }
            self.state.present = true;
            if self.state.lockout {
                self.state.lockout = false;
                info!("WATER: present again (raw={}), lockout cleared", raw);
                return WaterTransition::Restored;
            }
            WaterTransition::Present
        } else if raw > WATER_ABSENT_ABOVE {
            if !self.state.present {
                // Keep the latch set even if something cleared it out of band.
                self.state.lockout = true;
                return WaterTransition::Unchanged;
            }
            self.state.present = false;
            self.state.lockout = true;
            warn!("WATER: reservoir empty (raw={}), pump locked out", raw);
            WaterTransition::WentAbsent
        } else {
            WaterTransition::Unchanged
        }
    }

    /// Latch the interlock without changing `present`.  Used by the pump
    /// safety abort, which trips on a single dry reading.
    pub fn force_lockout(&mut self) {
        if !self.state.lockout {
            warn!("WATER: lockout forced by pump safety abort");
        }
        self.state.lockout = true;
    }

    pub fn state(&self) -> WaterState {
        self.state
    }

    pub fn is_locked_out(&self) -> bool {
        self.state.lockout
    }

    pub fn is_present(&self) -> bool {
        self.state.present
    }
}
