//! ESP32 time adapter.
//!
//! Two clocks:
//!
//! - **monotonic** (`uptime_ms`) drives every interval in the control loop:
//!   sampling, pump run length, telemetry, reconnect back-off.
//! - **wall** (`wall_clock`) is local civil time, only used for the
//!   inactive window and event timestamps.
//!
//! On the device the wall clock is set by SNTP and converted to local time
//! through the POSIX `TZ` rules; on the host it is UTC unless a test pins it.

use log::{info, warn};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::ClockError;

/// Anything before 2020-01-01 is an unsynced RTC.
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    sim_wall: Option<DateTime<FixedOffset>>,
    #[cfg(not(target_os = "espidf"))]
    sim_ntp_reachable: bool,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            sim_wall: None,
            #[cfg(not(target_os = "espidf"))]
            sim_ntp_reachable: true,
        }
    }

    // ── Monotonic ─────────────────────────────────────────────

    /// Milliseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    // ── Wall clock ────────────────────────────────────────────

    /// Seconds since the Unix epoch, or `None` if `gettimeofday` fails.
    #[cfg(target_os = "espidf")]
    fn unix_secs(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        Some(tv.tv_sec as i64)
    }

    #[cfg(not(target_os = "espidf"))]
    fn unix_secs(&self) -> Option<i64> {
        Some(self.wall_clock().timestamp())
    }

    /// `true` once the wall clock is past the plausibility floor.
    pub fn is_synced(&self) -> bool {
        self.unix_secs().is_some_and(|s| s >= EPOCH_2020)
    }

    /// Current local time.  Falls back to the Unix epoch if the C library
    /// refuses the conversion.
    #[cfg(target_os = "espidf")]
    pub fn wall_clock(&self) -> DateTime<FixedOffset> {
        let epoch = DateTime::<Utc>::UNIX_EPOCH.fixed_offset();
        let Some(secs) = self.unix_secs() else {
            return epoch;
        };
        let t = secs as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&t, &mut tm) }.is_null() {
            return epoch;
        }
        from_local_fields(
            secs,
            tm.tm_year + 1900,
            (tm.tm_mon + 1) as u32,
            tm.tm_mday as u32,
            tm.tm_hour as u32,
            tm.tm_min as u32,
            tm.tm_sec as u32,
        )
        .unwrap_or(epoch)
    }

    /// Current wall time: the pinned value if a test set one, else UTC now.
    #[cfg(not(target_os = "espidf"))]
    pub fn wall_clock(&self) -> DateTime<FixedOffset> {
        self.sim_wall.unwrap_or_else(|| Utc::now().fixed_offset())
    }

    // ── SNTP ──────────────────────────────────────────────────

    /// Apply the timezone, start SNTP against the configured servers and
    /// block until the clock is plausible or `timeout_ms` elapses.
    #[cfg(target_os = "espidf")]
    pub fn sync_wall_clock(&mut self, timeout_ms: u64) -> Result<(), ClockError> {
        use esp_idf_svc::hal::delay::FreeRtos;
        use esp_idf_svc::sys;

        use crate::config::{NTP_SERVERS, TIMEZONE};

        unsafe {
            sys::setenv(c"TZ".as_ptr(), TIMEZONE.as_ptr(), 1);
            sys::tzset();

            sys::esp_sntp_setoperatingmode(sys::esp_sntp_operatingmode_t_ESP_SNTP_OPMODE_POLL);
            for (idx, server) in NTP_SERVERS.iter().enumerate() {
                sys::esp_sntp_setservername(idx as u8, server.as_ptr());
            }
            sys::esp_sntp_init();
        }
        info!("SNTP: started with {} servers", NTP_SERVERS.len());

        let deadline = self.uptime_ms() + timeout_ms;
        while !self.is_synced() {
            if self.uptime_ms() >= deadline {
                warn!("SNTP: no sync after {} ms", timeout_ms);
                return Err(ClockError::SyncTimeout);
            }
            FreeRtos::delay_ms(100);
        }
        info!("SNTP: synced, local time {}", self.wall_clock());
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sync_wall_clock(&mut self, timeout_ms: u64) -> Result<(), ClockError> {
        if !self.sim_ntp_reachable {
            warn!("SNTP: no sync after {} ms", timeout_ms);
            return Err(ClockError::SyncTimeout);
        }
        info!("SNTP: synced (simulated)");
        Ok(())
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Pin the wall clock to `at`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_wall(&mut self, at: DateTime<FixedOffset>) {
        self.sim_wall = Some(at);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_ntp_reachable(&mut self, reachable: bool) {
        self.sim_ntp_reachable = reachable;
    }
}

/// Build a local timestamp from broken-down local fields and the matching
/// Unix time.  The UTC offset is whatever separates the two.
pub fn from_local_fields(
    unix_secs: i64,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    // Leap seconds from the C library fold into :59.
    let time = NaiveTime::from_hms_opt(hour, minute, second.min(59))?;
    let local = NaiveDateTime::new(date, time);
    let offset_secs = local.and_utc().timestamp() - unix_secs;
    let offset = FixedOffset::east_opt(i32::try_from(offset_secs).ok()?)?;
    local.and_local_timezone(offset).single()
}
