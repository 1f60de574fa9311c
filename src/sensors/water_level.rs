//! Reservoir water-level sensor (analog).
//!
//! The sensor pulls the ADC toward ground when submerged: low reading =
//! water present, high reading = empty.  Interpretation with hysteresis
//! lives in [`crate::safety::WaterLevelMonitor`]; this driver only samples.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via hw_init helpers.
//! On host/test: reads from a static AtomicU16.  Defaults to an empty
//! reservoir so nothing pumps until a test says otherwise.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

static SIM_WATER_ADC: AtomicU16 = AtomicU16::new(4095);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_water_adc(raw: u16) {
    SIM_WATER_ADC.store(raw, Ordering::Relaxed);
}

pub struct WaterLevelSensor {
    last_raw: u16,
}

impl Default for WaterLevelSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl WaterLevelSensor {
    pub fn new() -> Self {
        Self { last_raw: u16::MAX }
    }

    /// Latest raw reading.  Until the first good conversion this is
    /// `u16::MAX`, which the monitor reads as empty.
    pub fn read_raw(&mut self) -> u16 {
        if let Some(raw) = self.read_adc() {
            self.last_raw = raw;
        }
        self.last_raw
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Option<u16> {
        hw_init::adc1_read(pins::WATER_LEVEL_ADC_CHANNEL)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Option<u16> {
        Some(SIM_WATER_ADC.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_injected_adc() {
        let mut s = WaterLevelSensor::new();
        sim_set_water_adc(50);
        assert_eq!(s.read_raw(), 50);
        sim_set_water_adc(4095);
        assert_eq!(s.read_raw(), 4095);
    }
}
