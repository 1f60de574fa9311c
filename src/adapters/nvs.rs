//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`].
//!
//! Operator config lives in the `riego` namespace, one key per field so
//! each can be updated on its own:
//!
//! | Key        | NVS entry | Encoding              |
//! |------------|-----------|-----------------------|
//! | `umbral`   | blob      | f32, 4-byte little-endian |
//! | `duracion` | `u32`     | native typed entry    |
//!
//! The entry types match what earlier firmware wrote, so a reflashed
//! board keeps its settings.
//!
//! - Values are range-checked before they are written and again when read.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - Off-target builds use an in-memory map (tests only).

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{validate_duration, validate_threshold, DeviceConfig};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "riego";
pub const KEY_THRESHOLD: &str = "umbral";
pub const KEY_DURATION: &str = "duracion";

/// Simulated NVS entry.  Lookups are typed, as on the device: reading a
/// key through the wrong type finds nothing.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq)]
enum SimEntry {
    Blob(Vec<u8>),
    U32(u32),
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<&'static str, SimEntry>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// NUL-terminated copy of an NVS name (max 15 chars).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open the config namespace, run `f` with the handle, then close.
    /// Writers commit before the handle is closed.
    #[cfg(target_os = "espidf")]
    fn with_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(CONFIG_NAMESPACE);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let mut result = f(handle);
        if write && result.is_ok() {
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                result = Err(ret);
            }
        }
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Map an ESP-IDF read result: a missing key (or namespace) is `None`.
    #[cfg(target_os = "espidf")]
    fn read_result<T>(key: &str, r: Result<T, i32>) -> Result<Option<T>, ConfigError> {
        match r {
            Ok(v) => Ok(Some(v)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: read '{}' failed ({})", key, e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_result(key: &str, r: Result<(), i32>) -> Result<(), ConfigError> {
        r.map_err(|e| {
            warn!("NvsAdapter: write '{}' failed ({})", key, e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                ConfigError::StorageFull
            } else {
                ConfigError::IoError
            }
        })
    }

    // ── Typed entry access ────────────────────────────────────

    /// Read a blob into `buf`.  Returns the stored length, which may
    /// exceed `buf`; `None` when the key is absent.
    fn get_blob(&self, key: &'static str, buf: &mut [u8]) -> Result<Option<usize>, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(key) {
                Some(SimEntry::Blob(data)) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(Some(data.len()))
                }
                _ => Ok(None),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(false, |handle| {
                let k = Self::c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(handle, k.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
                };
                match ret {
                    ESP_OK => Ok(size),
                    // Stored blob is larger than `buf`: report it as oversized.
                    ESP_ERR_NVS_INVALID_LENGTH => Ok(buf.len() + 1),
                    e => Err(e),
                }
            });
            Self::read_result(key, result)
        }
    }

    fn put_blob(&self, key: &'static str, data: &[u8]) -> Result<(), ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().insert(key, SimEntry::Blob(data.to_vec()));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(true, |handle| {
                let k = Self::c_name(key);
                let ret = unsafe {
                    nvs_set_blob(handle, k.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
                };
                if ret == ESP_OK { Ok(()) } else { Err(ret) }
            });
            Self::write_result(key, result)
        }
    }

    fn get_u32(&self, key: &'static str) -> Result<Option<u32>, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(key) {
                Some(SimEntry::U32(v)) => Ok(Some(*v)),
                _ => Ok(None),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(false, |handle| {
                let k = Self::c_name(key);
                let mut value: u32 = 0;
                let ret = unsafe { nvs_get_u32(handle, k.as_ptr() as *const _, &mut value) };
                if ret == ESP_OK { Ok(value) } else { Err(ret) }
            });
            Self::read_result(key, result)
        }
    }

    fn put_u32(&self, key: &'static str, value: u32) -> Result<(), ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().insert(key, SimEntry::U32(value));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(true, |handle| {
                let k = Self::c_name(key);
                let ret = unsafe { nvs_set_u32(handle, k.as_ptr() as *const _, value) };
                if ret == ESP_OK { Ok(()) } else { Err(ret) }
            });
            Self::write_result(key, result)
        }
    }

    /// Read the 4-byte threshold blob.  `Ok(None)` when the key is absent.
    fn get_threshold_bytes(&self) -> Result<Option<[u8; 4]>, ConfigError> {
        let mut buf = [0u8; 4];
        match self.get_blob(KEY_THRESHOLD, &mut buf)? {
            Some(4) => Ok(Some(buf)),
            Some(n) => {
                warn!("NvsAdapter: '{}' has {} bytes, expected 4", KEY_THRESHOLD, n);
                Err(ConfigError::Corrupted)
            }
            None => Ok(None),
        }
    }
}

impl ConfigPort for NvsAdapter {
    /// Each key falls back to its default independently when absent,
    /// malformed or out of range.
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let mut cfg = DeviceConfig::default();

        match self.get_threshold_bytes() {
            Ok(Some(bytes)) => {
                let t = f32::from_le_bytes(bytes);
                if validate_threshold(t).is_ok() {
                    cfg.threshold_percent = t;
                } else {
                    warn!("NvsAdapter: stored threshold {} out of range, using default", t);
                }
            }
            Ok(None) => info!("NvsAdapter: no stored threshold, using default"),
            Err(e) => warn!("NvsAdapter: threshold unreadable ({}), using default", e),
        }

        match self.get_u32(KEY_DURATION) {
            Ok(Some(d)) => {
                if validate_duration(d).is_ok() {
                    cfg.irrigation_duration_ms = d;
                } else {
                    warn!("NvsAdapter: stored duration {} invalid, using default", d);
                }
            }
            Ok(None) => info!("NvsAdapter: no stored duration, using default"),
            Err(e) => warn!("NvsAdapter: duration unreadable ({}), using default", e),
        }

        info!(
            "NvsAdapter: config threshold={:.1}% duration={} ms",
            cfg.threshold_percent, cfg.irrigation_duration_ms
        );
        Ok(cfg)
    }

    fn save_threshold(&self, percent: f32) -> Result<(), ConfigError> {
        validate_threshold(percent)?;
        self.put_blob(KEY_THRESHOLD, &percent.to_le_bytes())?;
        info!("NvsAdapter: threshold {:.1}% saved", percent);
        Ok(())
    }

    fn save_duration(&self, duration_ms: u32) -> Result<(), ConfigError> {
        validate_duration(duration_ms)?;
        self.put_u32(KEY_DURATION, duration_ms)?;
        info!("NvsAdapter: duration {} ms saved", duration_ms);
        Ok(())
    }
}

impl Default for NvsAdapter {
    /// Fallback when flash init fails: reads find nothing, writes fail.
    fn default() -> Self {
        Self::new().unwrap_or(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(nvs: &NvsAdapter, key: &str) -> Option<SimEntry> {
        nvs.store.borrow().get(key).cloned()
    }

    #[test]
    fn empty_store_loads_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), DeviceConfig::default());
    }

    #[test]
    fn saved_threshold_is_loaded() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.save_threshold(42.5).unwrap();
        let cfg = nvs.load().unwrap();
        assert_eq!(cfg.threshold_percent, 42.5);
        assert_eq!(cfg.irrigation_duration_ms, DeviceConfig::default().irrigation_duration_ms);
    }

    #[test]
    fn fields_are_independent() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.save_duration(12_345).unwrap();
        let cfg = nvs.load().unwrap();
        assert_eq!(cfg.irrigation_duration_ms, 12_345);
        assert_eq!(cfg.threshold_percent, DeviceConfig::default().threshold_percent);
    }

    #[test]
    fn duration_is_a_typed_u32_entry() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.save_duration(0x0102_0304).unwrap();
        assert_eq!(entry(&nvs, KEY_DURATION), Some(SimEntry::U32(0x0102_0304)));
    }

    #[test]
    fn threshold_is_a_little_endian_blob() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.save_threshold(50.0).unwrap();
        assert_eq!(
            entry(&nvs, KEY_THRESHOLD),
            Some(SimEntry::Blob(50.0f32.to_le_bytes().to_vec()))
        );
    }

    #[test]
    fn duration_written_by_earlier_firmware_is_loaded() {
        let nvs = NvsAdapter::new().unwrap();
        // A bare u32 entry, as left behind by a previous firmware image.
        nvs.put_u32(KEY_DURATION, 45_000).unwrap();
        nvs.put_blob(KEY_THRESHOLD, &35.0f32.to_le_bytes()).unwrap();
        let cfg = nvs.load().unwrap();
        assert_eq!(cfg.irrigation_duration_ms, 45_000);
        assert_eq!(cfg.threshold_percent, 35.0);
    }

    #[test]
    fn duration_stored_as_blob_is_not_read() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.put_blob(KEY_DURATION, &45_000u32.to_le_bytes()).unwrap();
        assert_eq!(
            nvs.load().unwrap().irrigation_duration_ms,
            DeviceConfig::default().irrigation_duration_ms
        );
    }

    #[test]
    fn invalid_values_are_not_written() {
        let nvs = NvsAdapter::new().unwrap();
        assert!(matches!(nvs.save_threshold(101.0), Err(ConfigError::ValidationFailed(_))));
        assert!(matches!(nvs.save_duration(0), Err(ConfigError::ValidationFailed(_))));
        assert_eq!(entry(&nvs, KEY_THRESHOLD), None);
        assert_eq!(entry(&nvs, KEY_DURATION), None);
    }

    #[test]
    fn wrong_sized_blob_falls_back_to_default() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.put_blob(KEY_THRESHOLD, &[1, 2]).unwrap();
        let cfg = nvs.load().unwrap();
        assert_eq!(cfg.threshold_percent, DeviceConfig::default().threshold_percent);
    }

    #[test]
    fn out_of_range_stored_value_falls_back() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.put_blob(KEY_THRESHOLD, &250.0f32.to_le_bytes()).unwrap();
        nvs.put_u32(KEY_DURATION, 0).unwrap();
        let cfg = nvs.load().unwrap();
        assert_eq!(cfg.threshold_percent, 70.0);
        assert_eq!(cfg.irrigation_duration_ms, 60_000);
    }
}
