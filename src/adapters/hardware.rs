//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the pump relay, exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets the
//! underlying drivers use cfg-gated simulation stubs.

use log::error;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::pump::PumpRelay;
use crate::error::Error;
use crate::fsm::context::SensorSnapshot;
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    sensor_hub: SensorHub,
    pump: PumpRelay,
}

impl HardwareAdapter {
    pub fn new(sensor_hub: SensorHub, pump: PumpRelay) -> Self {
        Self { sensor_hub, pump }
    }

    pub fn relay(&self) -> &PumpRelay {
        &self.pump
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn read_moisture_raw(&mut self) -> u16 {
        self.sensor_hub.moisture.read_raw()
    }

    fn read_water_level_raw(&mut self) -> u16 {
        self.sensor_hub.water_level.read_raw()
    }

    fn read_temperature_c(&mut self) -> Option<f32> {
        self.sensor_hub.temperature.read_celsius()
    }

    fn read_all(&mut self) -> SensorSnapshot {
        self.sensor_hub.read_all()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_pump(&mut self, on: bool) {
        if let Err(e) = self.pump.set(on) {
            error!("{}", Error::from(e));
        }
    }

    fn is_pump_on(&self) -> bool {
        self.pump.is_on()
    }

    fn all_off(&mut self) {
        self.pump.force_off();
    }
}
