//! GPIO / ADC pin assignments for the irrigation controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Targets the classic ESP32 (ADC1 on GPIO 32-39).

// ---------------------------------------------------------------------------
// Sensors (ADC1, 12-bit, 12 dB attenuation)
// ---------------------------------------------------------------------------

/// Capacitive soil-moisture sensor.  High reading = dry.
pub const MOISTURE_ADC_GPIO: i32 = 34;
/// ADC1 channel behind GPIO 34.
pub const MOISTURE_ADC_CHANNEL: u32 = 6;

/// Reservoir level sensor.  Low reading = water present.
pub const WATER_LEVEL_ADC_GPIO: i32 = 35;
/// ADC1 channel behind GPIO 35.
pub const WATER_LEVEL_ADC_CHANNEL: u32 = 7;

// ---------------------------------------------------------------------------
// One-wire
// ---------------------------------------------------------------------------

/// DS18B20 data line, 4.7 kOhm pull-up to 3V3.
pub const ONE_WIRE_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Pump relay, active HIGH.
pub const PUMP_RELAY_GPIO: i32 = 25;
