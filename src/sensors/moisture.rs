//! Capacitive soil-moisture sensor.
//!
//! Returns the raw 12-bit ADC value; conversion to a humidity percentage
//! and debouncing happen in `control::debouncer`.  A high reading means
//! dry soil.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static AtomicU16 for injection.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

use crate::config::MOISTURE_RAW_DRY;

static SIM_MOISTURE_ADC: AtomicU16 = AtomicU16::new(MOISTURE_RAW_DRY);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_moisture_adc(raw: u16) {
    SIM_MOISTURE_ADC.store(raw, Ordering::Relaxed);
}

pub struct MoistureSensor {
    last_raw: u16,
}

impl Default for MoistureSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl MoistureSensor {
    pub fn new() -> Self {
        Self {
            last_raw: MOISTURE_RAW_DRY,
        }
    }

    /// Latest raw reading.  A failed conversion repeats the previous value.
    pub fn read_raw(&mut self) -> u16 {
        if let Some(raw) = self.read_adc() {
            self.last_raw = raw;
        }
        self.last_raw
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Option<u16> {
        hw_init::adc1_read(pins::MOISTURE_ADC_CHANNEL)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Option<u16> {
        Some(SIM_MOISTURE_ADC.load(Ordering::Relaxed))
    }
}
