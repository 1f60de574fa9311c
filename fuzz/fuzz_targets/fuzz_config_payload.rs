//! Fuzz target: `parse_config_payload`
//!
//! Feeds arbitrary bytes from the config topic into the parser and checks
//! that it never panics and never accepts an out-of-range value.  Accepted
//! payloads are then applied to a live service to make sure the handler
//! holds up too.
//!
//! cargo fuzz run fuzz_config_payload

#![no_main]

use irrigator::app::commands::{parse_config_payload, AppCommand};
use irrigator::app::events::AppEvent;
use irrigator::app::ports::{ConfigError, ConfigPort, EventSink};
use irrigator::app::service::AppService;
use irrigator::config::DeviceConfig;
use irrigator::scheduler::SleepScheduler;
use libfuzzer_sys::fuzz_target;

struct NullStore;

impl ConfigPort for NullStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(DeviceConfig::default())
    }
    fn save_threshold(&self, _: f32) -> Result<(), ConfigError> {
        Ok(())
    }
    fn save_duration(&self, _: u32) -> Result<(), ConfigError> {
        Ok(())
    }
}

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(AppCommand::ApplyConfig(update)) = parse_config_payload(data) else {
        return;
    };
    if let Some(t) = update.threshold_percent {
        assert!((0.0..=100.0).contains(&t), "accepted threshold {t}");
    }
    if let Some(d) = update.irrigation_duration_ms {
        assert!(d > 0, "accepted zero duration");
    }

    let mut app = AppService::new(DeviceConfig::default(), SleepScheduler::default());
    app.handle_payload(data, &NullStore, &mut NullSink);
    assert!(app.config().validate().is_ok());
});
