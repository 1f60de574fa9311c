//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the boundary for network association.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` over `EspWifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Connection policy
//!
//! - Boot: [`WifiAdapter::connect_with_retries`] makes a fixed number of
//!   attempts with a fixed delay, blocking the caller.  The control loop
//!   has not started yet, so nothing is starved.
//! - Running: [`ConnectivityPort::poll`] checks the link every iteration
//!   and, when it is down, fires one non-blocking reconnect per retry
//!   interval.

use core::fmt;
use log::{error, info, warn};

use super::utils::is_printable_ascii;
use crate::config::WIFI_RECONNECT_INTERVAL_MS;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{delay::FreeRtos, modem::Modem},
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    DriverInit,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::DriverInit => write!(f, "WiFi driver init failed"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

pub trait ConnectivityPort {
    fn is_connected(&self) -> bool;
    /// Watch the link and schedule reconnects.  Never blocks.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    next_retry_ms: u64,
    #[cfg(target_os = "espidf")]
    driver: Option<BlockingWifi<EspWifi<'static>>>,
    /// Simulation: attempts that fail before one succeeds.
    #[cfg(not(target_os = "espidf"))]
    sim_failures_left: u32,
    /// Simulation: whether the AP is reachable at all.
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            next_retry_ms: 0,
            #[cfg(target_os = "espidf")]
            driver: None,
            #[cfg(not(target_os = "espidf"))]
            sim_failures_left: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_link_up: true,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Take ownership of the radio.  Must run before the first connect.
    #[cfg(target_os = "espidf")]
    pub fn attach(&mut self, modem: Modem, sys_loop: EspSystemEventLoop) -> Result<(), ConnectivityError> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), None).map_err(|e| {
            error!("WiFi: driver init failed ({:?})", e);
            ConnectivityError::DriverInit
        })?;
        let wifi = BlockingWifi::wrap(esp_wifi, sys_loop).map_err(|_| ConnectivityError::DriverInit)?;
        self.driver = Some(wifi);
        Ok(())
    }

    /// Blocking boot-time association: up to `attempts` tries,
    /// `delay_ms` apart.  Returns the attempt number that succeeded.
    pub fn connect_with_retries(&mut self, attempts: u32, delay_ms: u32) -> Result<u32, ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        self.platform_configure()?;

        for attempt in 1..=attempts {
            if self.platform_connect_blocking().is_ok() {
                self.state = WifiState::Connected;
                info!("WiFi: connected on attempt {}", attempt);
                return Ok(attempt);
            }
            warn!("WiFi: attempt {}/{} failed", attempt, attempts);
            Self::delay(delay_ms);
        }

        error!("WiFi: giving up after {} attempts", attempts);
        self.state = WifiState::Reconnecting { attempt: 0 };
        Err(ConnectivityError::ConnectionFailed)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_configure(&mut self) -> Result<(), ConnectivityError> {
        let wifi = self.driver.as_mut().ok_or(ConnectivityError::DriverInit)?;
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self.password.as_str().try_into().map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        wifi.set_configuration(&conf).map_err(|_| ConnectivityError::DriverInit)?;
        wifi.start().map_err(|_| ConnectivityError::DriverInit)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_configure(&mut self) -> Result<(), ConnectivityError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect_blocking(&mut self) -> Result<(), ConnectivityError> {
        let wifi = self.driver.as_mut().ok_or(ConnectivityError::DriverInit)?;
        wifi.connect().map_err(|_| ConnectivityError::ConnectionFailed)?;
        wifi.wait_netif_up().map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect_blocking(&mut self) -> Result<(), ConnectivityError> {
        self.platform_kick_reconnect()
    }

    /// Fire a reconnect without waiting for the result.
    #[cfg(target_os = "espidf")]
    fn platform_kick_reconnect(&mut self) -> Result<(), ConnectivityError> {
        let wifi = self.driver.as_mut().ok_or(ConnectivityError::DriverInit)?;
        wifi.wifi_mut().connect().map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_kick_reconnect(&mut self) -> Result<(), ConnectivityError> {
        if !self.sim_link_up {
            return Err(ConnectivityError::ConnectionFailed);
        }
        if self.sim_failures_left > 0 {
            self.sim_failures_left -= 1;
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.state = WifiState::Connected;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.driver
            .as_ref()
            .and_then(|w| w.is_connected().ok())
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up && self.state == WifiState::Connected
    }

    #[cfg(target_os = "espidf")]
    fn delay(ms: u32) {
        FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay(_ms: u32) {}

    // ── Simulation hooks ──────────────────────────────────────

    /// Make the next `n` connection attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next(&mut self, n: u32) {
        self.sim_failures_left = n;
    }

    /// Bring the simulated access point up or down.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&mut self, up: bool) {
        self.sim_link_up = up;
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connected => {
                if !self.platform_is_connected() {
                    warn!("WiFi: connection lost, retrying every {} ms", WIFI_RECONNECT_INTERVAL_MS);
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.next_retry_ms = now_ms;
                }
            }
            WifiState::Reconnecting { attempt } => {
                if self.platform_is_connected() {
                    info!("WiFi: reconnected after {} attempts", attempt);
                    self.state = WifiState::Connected;
                } else if now_ms >= self.next_retry_ms {
                    self.next_retry_ms = now_ms + WIFI_RECONNECT_INTERVAL_MS;
                    self.state = WifiState::Reconnecting { attempt: attempt + 1 };
                    if let Err(e) = self.platform_kick_reconnect() {
                        warn!("WiFi: reconnect attempt {} failed ({})", attempt + 1, e);
                    }
                }
            }
            WifiState::Disconnected => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
