//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor driver and produces a [`SensorSnapshot`] each
//! tick that gets written into `FsmContext.sensors`.

pub mod moisture;
pub mod temperature;
pub mod water_level;

use crate::fsm::context::SensorSnapshot;
use moisture::MoistureSensor;
use temperature::TemperatureSensor;
use water_level::WaterLevelSensor;

/// Aggregates all sensor drivers and produces a unified snapshot.
#[derive(Default)]
pub struct SensorHub {
    pub moisture: MoistureSensor,
    pub water_level: WaterLevelSensor,
    pub temperature: TemperatureSensor,
}

impl SensorHub {
    pub fn new(
        moisture: MoistureSensor,
        water_level: WaterLevelSensor,
        temperature: TemperatureSensor,
    ) -> Self {
        Self {
            moisture,
            water_level,
            temperature,
        }
    }

    /// Read every sensor and return a unified snapshot.
    ///
    /// A failed ADC conversion repeats the previous good value.  The
    /// temperature reads `None` while no DS18B20 answers.
    pub fn read_all(&mut self) -> SensorSnapshot {
        SensorSnapshot {
            moisture_raw: self.moisture.read_raw(),
            water_raw: self.water_level.read_raw(),
            temperature_c: self.temperature.read_celsius(),
        }
    }
}
