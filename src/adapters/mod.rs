//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                |
//! |-------------|-------------------|----------------------------|
//! | `hardware`  | SensorPort        | ESP32 ADC1, one-wire bus   |
//! |             | ActuatorPort      | Relay GPIO                 |
//! | `log_sink`  | EventSink         | Serial log output          |
//! | `mqtt`      | ChannelPort       | ESP-IDF MQTT client        |
//! | `nvs`       | ConfigPort        | NVS / in-memory store      |
//! | `time`      | -                 | esp_timer, SNTP, libc TZ   |
//! | `wifi`      | ConnectivityPort  | ESP-IDF Wi-Fi STA          |
//! | `device_id` | -                 | eFuse MAC / build env      |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub(super) mod utils;
pub mod wifi;
