//! System configuration parameters
//!
//! Two kinds of tuning live here:
//!
//! - [`DeviceConfig`]: operator-tunable values (moisture threshold and
//!   irrigation run length).  Persisted to NVS and updated remotely over
//!   the config topic.
//! - Fixed firmware constants (calibration, timing, hysteresis bands and
//!   the inactive window).  Changing these requires a reflash.

use core::ffi::CStr;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Operator configuration
// ---------------------------------------------------------------------------

/// Default humidity threshold (%) below which the soil counts as dry.
pub const DEFAULT_THRESHOLD_PERCENT: f32 = 70.0;
/// Default pump run length (ms).
pub const DEFAULT_IRRIGATION_MS: u32 = 60_000;

/// Operator-tunable configuration.  Each field is persisted under its own
/// NVS key so the two can be updated independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Humidity percentage (0–100) below which a sample counts as dry.
    pub threshold_percent: f32,
    /// How long one irrigation cycle runs the pump (ms, > 0).
    pub irrigation_duration_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            irrigation_duration_ms: DEFAULT_IRRIGATION_MS,
        }
    }
}

impl DeviceConfig {
    /// Range-check every field.  Called before anything is persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.threshold_percent)?;
        validate_duration(self.irrigation_duration_ms)
    }
}

pub fn validate_threshold(value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::ValidationFailed("threshold must be 0–100 %"));
    }
    Ok(())
}

pub fn validate_duration(value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ValidationFailed("irrigation duration must be > 0 ms"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Moisture sensor calibration
// ---------------------------------------------------------------------------

/// Raw ADC reading of the capacitive sensor in bone-dry soil.
pub const MOISTURE_RAW_DRY: u16 = 4095;
/// Raw ADC reading of the sensor in saturated soil.
pub const MOISTURE_RAW_WET: u16 = 1000;

// ---------------------------------------------------------------------------
// Water-level hysteresis band
// ---------------------------------------------------------------------------

/// Raw reading strictly below this means the reservoir has water.
pub const WATER_PRESENT_BELOW: u16 = 100;
/// Raw reading strictly above this means the reservoir is empty.
pub const WATER_ABSENT_ABOVE: u16 = 4000;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Spacing between moisture samples inside one debounce window.
pub const SAMPLE_INTERVAL_MS: u64 = 2_000;
/// Samples per debounce window.
pub const SAMPLES_PER_WINDOW: u8 = 3;
/// Telemetry publish period.
pub const TELEMETRY_INTERVAL_MS: u64 = 5_000;
/// How long the network is serviced before deep sleep so the final
/// retained event list reaches the broker.
pub const SLEEP_FLUSH_GRACE_MS: u64 = 2_000;
/// Upper bound on waiting for the first SNTP sync at boot.
pub const NTP_SYNC_TIMEOUT_MS: u64 = 30_000;
/// Fixed delay between broker reconnection attempts.
pub const MQTT_RETRY_INTERVAL_MS: u64 = 5_000;
/// Delay between Wi-Fi reassociation attempts once the link drops.
pub const WIFI_RECONNECT_INTERVAL_MS: u64 = 10_000;
/// Wi-Fi association attempts at boot before continuing offline.
pub const WIFI_CONNECT_ATTEMPTS: u32 = 10;
/// Delay between Wi-Fi association attempts.
pub const WIFI_RETRY_DELAY_MS: u32 = 500;
/// Control loop pacing (ms between iterations).
pub const LOOP_PERIOD_MS: u32 = 10;
/// Task watchdog timeout.  Must exceed the longest blocking boot step.
pub const WATCHDOG_TIMEOUT_MS: u32 = 40_000;

// ---------------------------------------------------------------------------
// Inactive window (local time)
// ---------------------------------------------------------------------------

/// Hour at which the device stops irrigating and goes to deep sleep.
pub const INACTIVE_START_HOUR: u8 = 16;
/// Hour at which the device wakes up again.
pub const INACTIVE_END_HOUR: u8 = 8;

/// POSIX TZ string for Central European Time with DST.
pub const TIMEZONE: &CStr = c"CET-1CEST,M3.5.0,M10.5.0/3";

/// NTP servers, in order of preference.
pub const NTP_SERVERS: [&CStr; 3] = [c"pool.ntp.org", c"time.google.com", c"ntp.ubuntu.com"];

// ---------------------------------------------------------------------------
// Build-time credentials
// ---------------------------------------------------------------------------
//
// Baked in from the build environment.  A missing Wi-Fi SSID or broker URL
// leaves the device running offline: it still irrigates and sleeps.

pub const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");
pub const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASSWORD");
pub const MQTT_URL: Option<&str> = option_env!("MQTT_URL");
pub const MQTT_USER: Option<&str> = option_env!("MQTT_USER");
pub const MQTT_PASSWORD: Option<&str> = option_env!("MQTT_PASSWORD");
/// Overrides the MAC-derived device id when set.
pub const DEVICE_ID: Option<&str> = option_env!("DEVICE_ID");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = DeviceConfig::default();
        assert!(c.validate().is_ok());
        assert!((c.threshold_percent - 70.0).abs() < f32::EPSILON);
        assert_eq!(c.irrigation_duration_ms, 60_000);
    }

    #[test]
    fn threshold_bounds_are_inclusive() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(100.0).is_ok());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(100.1).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }

    #[test]
    fn zero_duration_rejected() {
        assert!(matches!(
            validate_duration(0),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert!(validate_duration(1).is_ok());
    }

    #[test]
    fn serde_roundtrip() {
        let c = DeviceConfig {
            threshold_percent: 42.5,
            irrigation_duration_ms: 15_000,
        };
        let json = serde_json::to_string(&c).unwrap();
        let c2: DeviceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn calibration_and_bands_are_ordered() {
        assert!(MOISTURE_RAW_DRY > MOISTURE_RAW_WET);
        assert!(WATER_PRESENT_BELOW < WATER_ABSENT_ABOVE);
        assert!(SAMPLE_INTERVAL_MS < TELEMETRY_INTERVAL_MS);
        assert!(INACTIVE_END_HOUR < INACTIVE_START_HOUR);
    }

    #[test]
    fn wifi_reassociation_is_slower_than_broker_retry() {
        // The broker retry only runs once the link is up again.
        assert!(WIFI_RECONNECT_INTERVAL_MS >= MQTT_RETRY_INTERVAL_MS);
        assert!(WIFI_RECONNECT_INTERVAL_MS > u64::from(WIFI_RETRY_DELAY_MS));
    }

    #[test]
    fn timezone_is_cet_with_dst() {
        assert_eq!(TIMEZONE.to_str().unwrap(), "CET-1CEST,M3.5.0,M10.5.0/3");
        assert_eq!(NTP_SERVERS[0].to_str().unwrap(), "pool.ntp.org");
    }
}
