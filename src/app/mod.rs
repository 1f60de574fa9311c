//! Application core: pure domain logic, zero I/O.
//!
//! Orchestrates the irrigation cycle: reservoir interlock, moisture
//! sampling, pump timing, the pending event log and the sleep window.
//! All interaction with hardware and the broker happens through **port
//! traits** defined in [`ports`], keeping this layer testable without
//! real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
