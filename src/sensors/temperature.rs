//! DS18B20 ambient temperature sensor on a one-wire bus.
//!
//! Telemetry only: nothing in the control loop depends on it.
//!
//! A 12-bit conversion takes 750 ms, far longer than one loop iteration,
//! so the read is split in two and driven by [`ConversionCycle`]:
//!
//! ```text
//!  start conversion ──(≥ 750 ms)──▶ read scratchpad ──(refresh)──▶ start …
//! ```
//!
//! Between reads the last good value is reported.  A bus fault or a
//! missing sensor clears it, so telemetry sends `null` rather than a
//! stale number.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `one-wire-bus` over an open-drain `PinDriver`, `ds18b20`
//! for the protocol.  On host/test: a static injection point.

use std::time::Instant;

use log::info;

use crate::config::TELEMETRY_INTERVAL_MS;
use crate::error::{Error, SensorError};

/// Conversion time at 12-bit resolution.
pub const CONVERSION_MS: u64 = 750;
/// A new conversion is started this often.
pub const REFRESH_MS: u64 = TELEMETRY_INTERVAL_MS;

/// Measurement range of the DS18B20.
const MIN_C: f32 = -55.0;
const MAX_C: f32 = 125.0;

/// What the driver has to do on this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    StartConversion,
    ReadScratchpad,
}

/// Non-blocking start/read schedule for one sensor.
#[derive(Debug, Default)]
pub struct ConversionCycle {
    last_start_ms: Option<u64>,
    pending: bool,
}

impl ConversionCycle {
    pub fn poll(&mut self, now_ms: u64) -> Step {
        match self.last_start_ms {
            Some(t) if self.pending => {
                if now_ms.saturating_sub(t) >= CONVERSION_MS {
                    self.pending = false;
                    Step::ReadScratchpad
                } else {
                    Step::Idle
                }
            }
            Some(t) if now_ms.saturating_sub(t) < REFRESH_MS => Step::Idle,
            _ => {
                self.last_start_ms = Some(now_ms);
                self.pending = true;
                Step::StartConversion
            }
        }
    }

    /// Drop an in-flight conversion after a bus error.
    pub fn abort(&mut self) {
        self.pending = false;
    }
}

/// Reject values the part cannot produce.
pub fn check_reading(celsius: f32) -> Result<f32, SensorError> {
    if celsius.is_finite() && (MIN_C..=MAX_C).contains(&celsius) {
        Ok(celsius)
    } else {
        Err(SensorError::OutOfRange)
    }
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_TEMP_BITS: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0x41AC_0000); // 21.5

/// Inject the sensor reading; `None` disconnects the sensor.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temp_c(celsius: Option<f32>) {
    let bits = celsius.unwrap_or(f32::NAN).to_bits();
    SIM_TEMP_BITS.store(bits, core::sync::atomic::Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
fn sim_temp_c() -> Option<f32> {
    let c = f32::from_bits(SIM_TEMP_BITS.load(core::sync::atomic::Ordering::Relaxed));
    (!c.is_nan()).then_some(c)
}

// ── Device bus ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod bus {
    use esp_idf_svc::hal::delay::Ets;
    use esp_idf_svc::hal::gpio::{AnyIOPin, InputOutput, PinDriver, Pull};
    use log::{info, warn};
    use one_wire_bus::{Address, OneWire};

    use ds18b20::Ds18b20;

    use crate::error::SensorError;
    use crate::pins::ONE_WIRE_GPIO;

    pub struct Ds18b20Bus {
        one_wire: OneWire<PinDriver<'static, AnyIOPin, InputOutput>>,
        address: Option<Address>,
        delay: Ets,
    }

    impl Ds18b20Bus {
        pub fn new(pin: AnyIOPin) -> Result<Self, SensorError> {
            let mut pin = PinDriver::input_output_od(pin).map_err(|_| SensorError::BusFault)?;
            pin.set_pull(Pull::Up).map_err(|_| SensorError::BusFault)?;
            pin.set_high().map_err(|_| SensorError::BusFault)?;
            let one_wire = OneWire::new(pin).map_err(|e| {
                warn!("TEMP: one-wire bus init failed: {:?}", e);
                SensorError::BusFault
            })?;

            let mut bus = Self {
                one_wire,
                address: None,
                delay: Ets,
            };
            bus.scan();
            Ok(bus)
        }

        /// Pick the first DS18B20 on the bus.
        fn scan(&mut self) {
            self.address = None;
            for found in self.one_wire.devices(false, &mut self.delay) {
                match found {
                    Ok(addr) if addr.family_code() == ds18b20::FAMILY_CODE => {
                        self.address = Some(addr);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("TEMP: one-wire scan failed: {:?}", e);
                        break;
                    }
                }
            }
            match self.address {
                Some(addr) => info!("TEMP: DS18B20 {:?} on GPIO{}", addr, ONE_WIRE_GPIO),
                None => warn!("TEMP: no DS18B20 on GPIO{}", ONE_WIRE_GPIO),
            }
        }

        pub fn start_conversion(&mut self) -> Result<(), SensorError> {
            if self.address.is_none() {
                self.scan();
            }
            if self.address.is_none() {
                return Err(SensorError::NotFound);
            }
            ds18b20::start_simultaneous_temp_measurement(&mut self.one_wire, &mut self.delay).map_err(|e| {
                warn!("TEMP: conversion start failed: {:?}", e);
                self.address = None;
                SensorError::BusFault
            })
        }

        pub fn read_celsius(&mut self) -> Result<f32, SensorError> {
            let addr = self.address.ok_or(SensorError::NotFound)?;
            let sensor = Ds18b20::new::<core::convert::Infallible>(addr).map_err(|_| SensorError::NotFound)?;
            match sensor.read_data(&mut self.one_wire, &mut self.delay) {
                Ok(data) => Ok(data.temperature),
                Err(e) => {
                    warn!("TEMP: scratchpad read failed: {:?}", e);
                    self.address = None;
                    Err(SensorError::BusFault)
                }
            }
        }
    }
}

// ── Sensor ────────────────────────────────────────────────────

/// DS18B20 reader.  `Default` has no bus attached and reports nothing.
pub struct TemperatureSensor {
    cycle: ConversionCycle,
    last: Option<f32>,
    epoch: Instant,
    #[cfg(target_os = "espidf")]
    bus: Option<bus::Ds18b20Bus>,
}

impl Default for TemperatureSensor {
    fn default() -> Self {
        Self {
            cycle: ConversionCycle::default(),
            last: None,
            epoch: Instant::now(),
            #[cfg(target_os = "espidf")]
            bus: None,
        }
    }
}

impl TemperatureSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the one-wire bus on `pin`.  On failure the sensor keeps
    /// running without one.
    #[cfg(target_os = "espidf")]
    pub fn on_pin(pin: esp_idf_svc::hal::gpio::AnyIOPin) -> Self {
        let mut s = Self::default();
        match bus::Ds18b20Bus::new(pin) {
            Ok(b) => s.bus = Some(b),
            Err(e) => log::warn!("TEMP: {}, running without temperature", e),
        }
        s
    }

    /// Latest temperature in °C, or `None` if no sensor answers.
    pub fn read_celsius(&mut self) -> Option<f32> {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.poll(now_ms)
    }

    /// Advance the conversion schedule to `now_ms` and return the latest
    /// reading.
    pub fn poll(&mut self, now_ms: u64) -> Option<f32> {
        let result = match self.cycle.poll(now_ms) {
            Step::Idle => return self.last,
            Step::StartConversion => self.start_conversion(),
            Step::ReadScratchpad => self.read_scratchpad().and_then(check_reading).map(|c| {
                if self.last.is_none() {
                    info!("TEMP: first reading {:.1} °C", c);
                }
                self.last = Some(c);
            }),
        };
        if let Err(e) = result {
            log::debug!("{}", Error::from(e));
            self.cycle.abort();
            self.last = None;
        }
        self.last
    }

    #[cfg(target_os = "espidf")]
    fn start_conversion(&mut self) -> Result<(), SensorError> {
        self.bus.as_mut().ok_or(SensorError::NotFound)?.start_conversion()
    }

    #[cfg(target_os = "espidf")]
    fn read_scratchpad(&mut self) -> Result<f32, SensorError> {
        self.bus.as_mut().ok_or(SensorError::NotFound)?.read_celsius()
    }

    #[cfg(not(target_os = "espidf"))]
    fn start_conversion(&mut self) -> Result<(), SensorError> {
        sim_temp_c().map(|_| ()).ok_or(SensorError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_scratchpad(&mut self) -> Result<f32, SensorError> {
        sim_temp_c().ok_or(SensorError::NotFound)
    }
}
