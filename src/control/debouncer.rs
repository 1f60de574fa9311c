//! Non-blocking multi-sample moisture debouncer.
//!
//! A single dry reading never starts the pump.  The debouncer collects
//! [`SAMPLES_PER_WINDOW`] readings spaced [`SAMPLE_INTERVAL_MS`] apart and
//! only then emits one [`Decision`].
//!
//! ```text
//!   Idle ──tick──▶ Sampling(0) ──2 s──▶ Sampling(1) ──2 s──▶ Sampling(2)
//!    ▲                                                           │
//!    └──────────────────── decision emitted ◀────────2 s─────────┘
//! ```
//!
//! The first tick while idle only opens the window; it does not sample.

use log::info;

use crate::config::{MOISTURE_RAW_DRY, MOISTURE_RAW_WET, SAMPLE_INTERVAL_MS, SAMPLES_PER_WINDOW};

/// Map a raw capacitive reading onto 0–100 % humidity.  Readings outside
/// the calibration range clamp to the nearest bound.
pub fn humidity_percent(raw: u16) -> f32 {
    let dry = MOISTURE_RAW_DRY as f32;
    let wet = MOISTURE_RAW_WET as f32;
    let pct = (dry - raw as f32) / (dry - wet) * 100.0;
    pct.clamp(0.0, 100.0)
}

/// Outcome of a completed sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Every sample was dry and the interlock is clear.
    Irrigate,
    /// Every sample was dry but the reservoir interlock is latched.
    Blocked,
    /// At least one sample was at or above the threshold.
    NoAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampling,
}

/// Sampling-window state.
#[derive(Debug, Clone)]
pub struct MoistureDebouncer {
    phase: Phase,
    sample_index: u8,
    below_threshold: u8,
    last_sample_ms: u64,
    last_humidity: Option<f32>,
}

impl Default for MoistureDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl MoistureDebouncer {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            sample_index: 0,
            below_threshold: 0,
            last_sample_ms: 0,
            last_humidity: None,
        }
    }

    /// Advance the window.  Returns `Some(decision)` exactly once per
    /// completed window.
    pub fn tick(&mut self, now_ms: u64, raw: u16, threshold: f32, lockout: bool) -> Option<Decision> {
        if self.phase == Phase::Idle {
            self.phase = Phase::Sampling;
            self.sample_index = 0;
            self.below_threshold = 0;
            self.last_sample_ms = now_ms;
            return None;
        }

        if now_ms.saturating_sub(self.last_sample_ms) < SAMPLE_INTERVAL_MS {
            return None;
        }
        self.last_sample_ms = now_ms;

        let humidity = humidity_percent(raw);
        self.last_humidity = Some(humidity);
        if humidity < threshold {
            self.below_threshold += 1;
        }
        self.sample_index += 1;
        info!(
            "MOISTURE: sample {}/{} raw={} humidity={:.1}% (threshold {:.1}%)",
            self.sample_index, SAMPLES_PER_WINDOW, raw, humidity, threshold
        );

        if self.sample_index < SAMPLES_PER_WINDOW {
            return None;
        }

        let all_dry = self.below_threshold == SAMPLES_PER_WINDOW;
        self.reset();
        Some(match (all_dry, lockout) {
            (true, false) => Decision::Irrigate,
            (true, true) => Decision::Blocked,
            (false, _) => Decision::NoAction,
        })
    }

    /// Abandon any in-progress window.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.sample_index = 0;
        self.below_threshold = 0;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sample_index(&self) -> u8 {
        self.sample_index
    }

    /// Most recent humidity sample, if any has been taken since boot.
    pub fn last_humidity(&self) -> Option<f32> {
        self.last_humidity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRY_RAW: u16 = 4095; // 0 %
    const WET_RAW: u16 = 1000; // 100 %

    fn run_window(d: &mut MoistureDebouncer, start: u64, raws: [u16; 3], lockout: bool) -> Option<Decision> {
        assert_eq!(d.tick(start, raws[0], 70.0, lockout), None);
        assert_eq!(d.tick(start + 2_000, raws[0], 70.0, lockout), None);
        assert_eq!(d.tick(start + 4_000, raws[1], 70.0, lockout), None);
        d.tick(start + 6_000, raws[2], 70.0, lockout)
    }

    #[test]
    fn humidity_mapping_endpoints() {
        assert!((humidity_percent(4095) - 0.0).abs() < 0.01);
        assert!((humidity_percent(1000) - 100.0).abs() < 0.01);
        assert!((humidity_percent(2548) - 50.0).abs() < 0.1);
    }

    #[test]
    fn humidity_mapping_clamps() {
        assert_eq!(humidity_percent(500), 100.0);
        assert_eq!(humidity_percent(0), 100.0);
        assert_eq!(humidity_percent(u16::MAX), 0.0);
    }

    #[test]
    fn first_tick_opens_window_without_sampling() {
        let mut d = MoistureDebouncer::new();
        assert_eq!(d.tick(0, DRY_RAW, 70.0, false), None);
        assert_eq!(d.phase(), Phase::Sampling);
        assert_eq!(d.sample_index(), 0);
        assert_eq!(d.last_humidity(), None);
    }

    #[test]
    fn samples_are_interval_gated() {
        let mut d = MoistureDebouncer::new();
        d.tick(0, DRY_RAW, 70.0, false);
        for t in [1, 500, 1_999] {
            assert_eq!(d.tick(t, DRY_RAW, 70.0, false), None);
            assert_eq!(d.sample_index(), 0);
        }
        d.tick(2_000, DRY_RAW, 70.0, false);
        assert_eq!(d.sample_index(), 1);
    }

    #[test]
    fn three_dry_samples_irrigate() {
        let mut d = MoistureDebouncer::new();
        let out = run_window(&mut d, 100, [DRY_RAW; 3], false);
        assert_eq!(out, Some(Decision::Irrigate));
        assert_eq!(d.phase(), Phase::Idle);
    }

    #[test]
    fn three_dry_samples_while_locked_out_are_blocked() {
        let mut d = MoistureDebouncer::new();
        let out = run_window(&mut d, 0, [DRY_RAW; 3], true);
        assert_eq!(out, Some(Decision::Blocked));
    }

    #[test]
    fn one_wet_sample_means_no_action() {
        let mut d = MoistureDebouncer::new();
        let out = run_window(&mut d, 0, [DRY_RAW, WET_RAW, DRY_RAW], false);
        assert_eq!(out, Some(Decision::NoAction));
    }

    #[test]
    fn threshold_is_strictly_below() {
        // 70 % exactly is not dry.
        let raw_at_70 = (4095.0 - 0.7 * 3095.0) as u16;
        let h = humidity_percent(raw_at_70);
        let mut d = MoistureDebouncer::new();
        d.tick(0, raw_at_70, h, false);
        d.tick(2_000, raw_at_70, h, false);
        d.tick(4_000, raw_at_70, h, false);
        assert_eq!(d.tick(6_000, raw_at_70, h, false), Some(Decision::NoAction));
    }

    #[test]
    fn window_restarts_after_decision() {
        let mut d = MoistureDebouncer::new();
        run_window(&mut d, 0, [WET_RAW; 3], false);
        // Next tick opens a fresh window rather than sampling.
        assert_eq!(d.tick(8_000, DRY_RAW, 70.0, false), None);
        assert_eq!(d.sample_index(), 0);
        assert!(d.last_humidity().is_some());
    }
}
