//! Relay driver, hardware initialisation and the task watchdog.

pub mod hw_init;
pub mod pump;
pub mod watchdog;
