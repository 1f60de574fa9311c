//! Device identity.
//!
//! The id names the MQTT topics (`sensors/<id>`) and the client id.  A
//! build-time `DEVICE_ID` wins; otherwise it is derived from the factory
//! MAC as `riego-xxyyzz` (last 3 bytes, lowercase hex), stable across
//! reboots.

use crate::config;

/// Fixed-capacity device id.  Longer build-time overrides are truncated.
pub type DeviceIdString = heapless::String<32>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `riego-xxyyzz` from the last 3 MAC bytes.
pub fn mac_device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    use core::fmt::Write;
    let _ = write!(id, "riego-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}

/// Resolve the id: `override_id` if non-empty, else MAC-derived.
pub fn resolve(override_id: Option<&str>, mac: &MacAddress) -> DeviceIdString {
    match override_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => {
            let mut out = DeviceIdString::new();
            for c in id.chars() {
                if out.push(c).is_err() {
                    break;
                }
            }
            out
        }
        None => mac_device_id(mac),
    }
}

/// The id this firmware runs under.
pub fn device_id() -> DeviceIdString {
    resolve(config::DEVICE_ID, &read_mac())
}
