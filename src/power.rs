//! Deep-sleep entry and wake-cause reporting.
//!
//! Deep sleep is a full power-down: RAM is lost and the chip reboots
//! through `main()` when the RTC timer fires.  Only NVS survives, so the
//! boot path reloads configuration and rebuilds everything else.
//!
//! ```text
//!  Sleeping ──▶ relay off ──▶ flush grace ──▶ enter_deep_sleep(d)
//!                                                   │
//!         main() ◀── WakeCause::Timer ◀── RTC timer ┘
//! ```

use core::time::Duration;

use log::info;

/// Why the chip is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Cold boot, reset button or anything that is not a sleep wake.
    PowerOn,
    /// RTC timer set by [`enter_deep_sleep`].
    Timer,
    /// Another deep-sleep wake source (raw ESP-IDF cause code).
    Other(u32),
}

// ESP-IDF `esp_sleep_source_t` values.
const CAUSE_UNDEFINED: u32 = 0;
const CAUSE_TIMER: u32 = 4;

impl WakeCause {
    pub fn from_raw(cause: u32) -> Self {
        match cause {
            CAUSE_UNDEFINED => Self::PowerOn,
            CAUSE_TIMER => Self::Timer,
            other => Self::Other(other),
        }
    }
}

/// Read the wake cause for this boot.
#[cfg(target_os = "espidf")]
pub fn wake_cause() -> WakeCause {
    // SAFETY: Read-only query of the RTC wake state.
    let raw = unsafe { esp_idf_svc::sys::esp_sleep_get_wakeup_cause() };
    WakeCause::from_raw(raw as u32)
}

#[cfg(not(target_os = "espidf"))]
pub fn wake_cause() -> WakeCause {
    WakeCause::PowerOn
}

/// Timer value for the RTC wake-up.  A zero duration still arms a 1 µs
/// timer so the chip wakes immediately instead of never.
pub fn wake_timer_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX).max(1)
}

/// Arm the RTC timer and power down.  Does not return.
#[cfg(target_os = "espidf")]
pub fn enter_deep_sleep(duration: Duration) -> ! {
    use esp_idf_svc::sys;

    let us = wake_timer_us(duration);
    info!("POWER: deep sleep for {} s", duration.as_secs());
    // SAFETY: Both calls are valid from any task; the second never returns.
    unsafe {
        sys::esp_sleep_enable_timer_wakeup(us);
        sys::esp_deep_sleep_start();
    }
}

/// Host stand-in: logs the request and exits the process.
#[cfg(not(target_os = "espidf"))]
pub fn enter_deep_sleep(duration: Duration) -> ! {
    info!(
        "POWER(sim): deep sleep for {} s ({} us timer)",
        duration.as_secs(),
        wake_timer_us(duration)
    );
    std::process::exit(0)
}
