//! Inactive-window sleep scheduler.
//!
//! The device irrigates during the day only.  Once the local clock enters
//! the inactive window the control loop winds down and the chip goes into
//! deep sleep with a timer wake at the end of the window.
//!
//! ```text
//!   00    04    08    12    16    20    24
//!   ├─────┴─────┼─────┴─────┼─────┴─────┤
//!   ░░░░░░░░░░░░│  active   │░░░░░░░░░░░░   window = [16, 8)
//!         wake ─┘           └─ sleep
//! ```
//!
//! The scheduler is pure: it takes a local [`DateTime`] and never reads
//! the clock itself.

use core::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike};
use log::info;

use crate::config::{INACTIVE_END_HOUR, INACTIVE_START_HOUR};

/// Local-time window during which the device sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactiveWindow {
    /// First inactive hour (0-23 inclusive).
    pub start_hour: u8,
    /// First active hour after the window (0-23 inclusive).
    pub end_hour: u8,
}

impl Default for InactiveWindow {
    fn default() -> Self {
        Self {
            start_hour: INACTIVE_START_HOUR,
            end_hour: INACTIVE_END_HOUR,
        }
    }
}

impl InactiveWindow {
    /// True when the window wraps past midnight (e.g. 16 → 8).
    pub fn wraps(&self) -> bool {
        self.start_hour > self.end_hour
    }

    /// Check if the given hour is within the window.
    pub fn contains_hour(&self, hour: u8) -> bool {
        if self.wraps() {
            hour >= self.start_hour || hour < self.end_hour
        } else {
            hour >= self.start_hour && hour < self.end_hour
        }
    }
}

/// Decides when to sleep and for how long.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepScheduler {
    window: InactiveWindow,
}

impl SleepScheduler {
    pub fn new(window: InactiveWindow) -> Self {
        info!(
            "Scheduler: inactive window {}:00–{}:00",
            window.start_hour, window.end_hour
        );
        Self { window }
    }

    pub fn window(&self) -> InactiveWindow {
        self.window
    }

    pub fn is_inactive(&self, now: DateTime<FixedOffset>) -> bool {
        self.window.contains_hour(now.hour() as u8)
    }

    /// Next `end_hour:00:00` local time.  In the evening part of a wrapping
    /// window that is tomorrow; in the morning part it is today.
    pub fn next_wake_time(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let hour = now.hour() as u8;
        let roll_to_tomorrow = if self.window.wraps() {
            hour >= self.window.start_hour
        } else {
            hour >= self.window.end_hour
        };

        let today = now.date_naive();
        let date = if roll_to_tomorrow {
            today.succ_opt().unwrap_or(today)
        } else {
            today
        };
        let wake = NaiveTime::from_hms_opt(u32::from(self.window.end_hour), 0, 0).unwrap_or(NaiveTime::MIN);
        // A fixed offset maps every local time to exactly one instant.
        date.and_time(wake)
            .and_local_timezone(*now.offset())
            .single()
            .unwrap_or(now)
    }

    /// Time to sleep from `now` until the next wake.  A zero result means
    /// the wake instant is not in the future and the caller must not sleep.
    pub fn sleep_duration(&self, now: DateTime<FixedOffset>) -> Duration {
        // `to_std` rejects negative deltas.
        (self.next_wake_time(now) - now).to_std().unwrap_or(Duration::ZERO)
    }
}
