//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, relay, MQTT link, NVS) implement these traits.
//! The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers handle every variant explicitly.

use crate::config::DeviceConfig;
use crate::fsm::context::SensorSnapshot;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    /// Raw capacitive soil-moisture reading (12-bit ADC).
    fn read_moisture_raw(&mut self) -> u16;

    /// Raw reservoir sensor reading (12-bit ADC).
    fn read_water_level_raw(&mut self) -> u16;

    /// Ambient temperature, `None` if no sensor answers.
    fn read_temperature_c(&mut self) -> Option<f32>;

    /// Read every sensor into one snapshot.
    fn read_all(&mut self) -> SensorSnapshot {
        SensorSnapshot {
            moisture_raw: self.read_moisture_raw(),
            water_raw: self.read_water_level_raw(),
            temperature_c: self.read_temperature_c(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command actuators.
pub trait ActuatorPort {
    /// Energise or release the pump relay.
    fn set_pump(&mut self, on: bool);

    /// Whether the relay is currently energised.
    fn is_pump_on(&self) -> bool;

    /// Kill all actuators.
    fn all_off(&mut self) {
        self.set_pump(false);
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Channel port (driven adapter: domain ↔ MQTT broker)
// ───────────────────────────────────────────────────────────────

/// Outbound destinations.  The adapter maps them onto concrete topics
/// derived from the device id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// Periodic sensor snapshot, not retained.
    Telemetry,
    /// Pending event array, retained.
    Events,
}

/// Message link to the broker.
///
/// Publishing while disconnected returns [`ChannelError::NotConnected`];
/// the service does not queue outbound messages.
pub trait ChannelPort {
    /// Publish `payload` on `topic`.
    fn publish(&mut self, topic: Topic, payload: &[u8], retain: bool) -> Result<(), ChannelError>;

    /// Next inbound config payload, if any arrived since the last call.
    fn poll_inbound(&mut self) -> Option<heapless::Vec<u8, INBOUND_MAX>>;

    /// Whether the broker session is up.
    fn is_connected(&self) -> bool;

    /// Returns `true` once after each (re)connection, so retained state
    /// can be republished.
    fn take_reconnected(&mut self) -> bool;

    /// Drive reconnection.  Called every iteration; never blocks.
    fn service(&mut self, now_ms: u64);
}

/// Largest inbound payload the channel hands to the domain.
pub const INBOUND_MAX: usize = 256;

/// `None` is a permanently offline link: nothing is published, nothing
/// arrives.  Lets a device without a broker keep irrigating.
impl<C: ChannelPort> ChannelPort for Option<C> {
    fn publish(&mut self, topic: Topic, payload: &[u8], retain: bool) -> Result<(), ChannelError> {
        match self {
            Some(c) => c.publish(topic, payload, retain),
            None => Err(ChannelError::NotConnected),
        }
    }

    fn poll_inbound(&mut self) -> Option<heapless::Vec<u8, INBOUND_MAX>> {
        self.as_mut().and_then(|c| c.poll_inbound())
    }

    fn is_connected(&self) -> bool {
        self.as_ref().is_some_and(|c| c.is_connected())
    }

    fn take_reconnected(&mut self) -> bool {
        self.as_mut().is_some_and(|c| c.take_reconnected())
    }

    fn service(&mut self, now_ms: u64) {
        if let Some(c) = self {
            c.service(now_ms);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists operator configuration.
///
/// # Security
///
/// Implementations MUST validate values before persisting and reject
/// invalid ranges with [`ConfigError::ValidationFailed`] rather than
/// clamping them.
pub trait ConfigPort {
    /// Load configuration.  Each missing key falls back to its default.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist the moisture threshold (percent).
    fn save_threshold(&self, percent: f32) -> Result<(), ConfigError>;

    /// Validate and persist the irrigation run length (ms).
    fn save_duration(&self, duration_ms: u32) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored value has the wrong size or encoding.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`ChannelPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// No broker session.
    NotConnected,
    /// The client rejected or failed to enqueue the message.
    PublishFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}
