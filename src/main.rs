//! Irrigation firmware: main entry point.
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Sensor+Actuator) (EventSink)    (Config)     (clocks, SNTP)  │
//! │  WifiAdapter       MqttAdapter                                 │
//! │  (Connectivity)    (Channel)                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Water interlock · Debouncer · Pump · Event log  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  SleepScheduler (inactive window) · power (deep sleep)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::IOPin;
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{error, info, warn};

use irrigator::adapters::device_id;
use irrigator::adapters::hardware::HardwareAdapter;
use irrigator::adapters::log_sink::LogEventSink;
use irrigator::adapters::mqtt::MqttAdapter;
use irrigator::adapters::nvs::NvsAdapter;
use irrigator::adapters::time::Esp32TimeAdapter;
use irrigator::adapters::wifi::{ConnectivityPort, WifiAdapter};
use irrigator::app::ports::{ActuatorPort, ChannelPort, ConfigPort};
use irrigator::app::service::AppService;
use irrigator::config::{self, DeviceConfig};
use irrigator::drivers::pump::PumpRelay;
use irrigator::drivers::watchdog::Watchdog;
use irrigator::error::Error;
use irrigator::power::{self, WakeCause};
use irrigator::scheduler::SleepScheduler;
use irrigator::sensors::moisture::MoistureSensor;
use irrigator::sensors::temperature::TemperatureSensor;
use irrigator::sensors::water_level::WaterLevelSensor;
use irrigator::sensors::SensorHub;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Riego v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    match power::wake_cause() {
        WakeCause::Timer => info!("Boot: timer wake from deep sleep"),
        WakeCause::PowerOn => info!("Boot: power-on"),
        other => info!("Boot: {:?}", other),
    }

    if let Err(e) = irrigator::drivers::hw_init::init_peripherals() {
        // Relay state is unknown; the watchdog is not armed yet.
        error!("{} ({}) - restarting", Error::from(e), e);
        FreeRtos::delay_ms(1_000);
        // SAFETY: Reboots the chip; never returns.
        unsafe { esp_idf_svc::sys::esp_restart() }
    }
    let watchdog = Watchdog::new();
    let peripherals = Peripherals::take()?;
    let one_wire_pin = peripherals.pins.gpio4.downgrade();
    let sys_loop = EspSystemEventLoop::take()?;

    // ── 2. Config from NVS (defaults per key) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let device_config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };
    info!(
        "Config: threshold {:.1}%, duration {} ms",
        device_config.threshold_percent, device_config.irrigation_duration_ms
    );
    watchdog.feed();

    // ── 3. Wi-Fi, then SNTP ───────────────────────────────────
    let dev_id = device_id::device_id();
    info!("Device ID: {}", dev_id);

    let mut time_adapter = Esp32TimeAdapter::new();
    let mut wifi = WifiAdapter::new();
    let mut clock_synced = false;

    match (config::WIFI_SSID, wifi.attach(peripherals.modem, sys_loop)) {
        (None, _) => warn!("WiFi: no SSID configured, running offline"),
        (Some(_), Err(e)) => warn!("WiFi: {}", e),
        (Some(ssid), Ok(())) => {
            let connected = wifi
                .set_credentials(ssid, config::WIFI_PASSWORD.unwrap_or(""))
                .and_then(|()| {
                    wifi.connect_with_retries(config::WIFI_CONNECT_ATTEMPTS, config::WIFI_RETRY_DELAY_MS)
                });
            match connected {
                Ok(_) => {
                    watchdog.feed();
                    clock_synced = match time_adapter.sync_wall_clock(config::NTP_SYNC_TIMEOUT_MS) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("{} - schedule disabled", Error::from(e));
                            false
                        }
                    };
                }
                Err(e) => warn!("WiFi: {} - SNTP skipped", e),
            }
        }
    }
    watchdog.feed();

    // ── 4. MQTT client ────────────────────────────────────────
    // `None` keeps the loop running offline.
    let mut mqtt: Option<MqttAdapter> = match config::MQTT_URL {
        Some(url) => match MqttAdapter::connect(url, &dev_id, config::MQTT_USER, config::MQTT_PASSWORD) {
            Ok(m) => Some(m),
            Err(e) => {
                error!("{} - running offline", Error::from(e));
                None
            }
        },
        None => {
            warn!("MQTT: no broker URL configured, running offline");
            None
        }
    };

    // ── 5. Hardware and app service ───────────────────────────
    let sensors = SensorHub::new(
        MoistureSensor::new(),
        WaterLevelSensor::new(),
        TemperatureSensor::on_pin(one_wire_pin),
    );
    let mut hw = HardwareAdapter::new(sensors, PumpRelay::new());
    hw.all_off();

    let mut log_sink = LogEventSink::new();
    let mut app = AppService::new(device_config, SleepScheduler::default());
    app.start(
        clock_synced,
        time_adapter.uptime_ms(),
        time_adapter.wall_clock(),
        &mut mqtt,
        &mut log_sink,
    );

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let now_ms = time_adapter.uptime_ms();
        wifi.poll(now_ms);

        let outcome = app.tick(
            now_ms,
            time_adapter.wall_clock(),
            &mut hw,
            &mut mqtt,
            &nvs,
            &mut log_sink,
        );
        watchdog.feed();

        if let Some(duration) = outcome.sleep_for() {
            hw.all_off();
            // Let the retained event list reach the broker.
            let deadline = time_adapter.uptime_ms() + config::SLEEP_FLUSH_GRACE_MS;
            while time_adapter.uptime_ms() < deadline {
                mqtt.service(time_adapter.uptime_ms());
                watchdog.feed();
                FreeRtos::delay_ms(config::LOOP_PERIOD_MS);
            }
            power::enter_deep_sleep(duration);
        }

        FreeRtos::delay_ms(config::LOOP_PERIOD_MS);
    }
}
