//! Inbound commands to the application service.
//!
//! Config payloads arrive on the broker's config topic as JSON:
//!
//! ```json
//! {"umbral": 55.0, "duracion": 30000}
//! ```
//!
//! Either field may be omitted.  Unknown fields are ignored.  A payload
//! that fails to parse, or whose present fields fail range validation,
//! is rejected whole.

use serde::Deserialize;

use crate::app::ports::ConfigError;
use crate::config::{validate_duration, validate_threshold};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Apply and persist the fields present in the update.
    ApplyConfig(ConfigUpdate),
}

/// A partial operator-config change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ConfigUpdate {
    #[serde(rename = "umbral", default)]
    pub threshold_percent: Option<f32>,
    #[serde(rename = "duracion", default)]
    pub irrigation_duration_ms: Option<u32>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.threshold_percent.is_none() && self.irrigation_duration_ms.is_none()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.threshold_percent {
            validate_threshold(t)?;
        }
        if let Some(d) = self.irrigation_duration_ms {
            validate_duration(d)?;
        }
        Ok(())
    }
}

/// Why an inbound payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Not a JSON object with the expected field types.
    Malformed,
    /// Parsed, but a field is out of range.
    Invalid(ConfigError),
}

impl core::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed payload"),
            Self::Invalid(e) => write!(f, "invalid payload: {}", e),
        }
    }
}

/// Parse and validate a config-topic payload.
pub fn parse_config_payload(payload: &[u8]) -> Result<AppCommand, PayloadError> {
    let update: ConfigUpdate =
        serde_json::from_slice(payload).map_err(|_| PayloadError::Malformed)?;
    update.validate().map_err(PayloadError::Invalid)?;
    Ok(AppCommand::ApplyConfig(update))
}
