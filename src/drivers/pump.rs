//! Pump relay driver.
//!
//! A single active-HIGH relay on [`pins::PUMP_RELAY_GPIO`].  No PWM, no
//! direction: the pump is either running or not.
//!
//! ## Safety contract
//!
//! The relay must never close while the reservoir is locked out.  That is
//! enforced by the FSM; this driver is a dumb actuator.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: writes the GPIO via hw_init helpers.
//! On host/test: tracks state in-memory and counts switch operations.

use log::{error, info};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

use crate::error::ActuatorError;

pub struct PumpRelay {
    on: bool,
    switch_count: u32,
}

impl Default for PumpRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpRelay {
    pub fn new() -> Self {
        Self {
            on: false,
            switch_count: 0,
        }
    }

    /// Drive the relay.  On a GPIO failure the cached state is left as-is
    /// so the next tick retries.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.write_hw(on)?;
        if self.on != on {
            self.switch_count += 1;
            info!("PUMP: relay {}", if on { "ON" } else { "OFF" });
        }
        self.on = on;
        Ok(())
    }

    /// Best-effort off, used on shutdown paths.
    pub fn force_off(&mut self) {
        if let Err(e) = self.set(false) {
            error!("PUMP: relay off failed: {}", e);
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_hw(&self, on: bool) -> Result<(), ActuatorError> {
        hw_init::gpio_write(pins::PUMP_RELAY_GPIO, on).map_err(|e| match e {
            hw_init::HwInitError::GpioConfigFailed(rc) | hw_init::HwInitError::AdcInitFailed(rc) => {
                ActuatorError::GpioWriteFailed(rc)
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_hw(&self, _on: bool) -> Result<(), ActuatorError> {
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Off→On and On→Off transitions since construction.
    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }
}
