//! Concrete state handler functions and table builder.
//!
//! Each state is three plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  MONITORING ──[window: all dry, no lockout]──▶ IRRIGATING
//!      ▲                                            │
//!      └──────[duration elapsed | reservoir dry]────┘
//!
//!  Any state ──[inactive window]──▶ SLEEPING (terminal)
//! ```
//!
//! Handlers only write `ctx.commands`; the service applies them to the
//! relay after the tick and before the event log is published.

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use crate::control::debouncer::Decision;
use crate::control::pump::StopCause;
use crate::events::{EventKind, PUMP_OUTCOMES};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Monitoring
        StateDescriptor {
            id: StateId::Monitoring,
            name: "Monitoring",
            on_enter: Some(monitoring_enter),
            on_exit: None,
            on_update: monitoring_update,
        },
        // Index 1: Irrigating
        StateDescriptor {
            id: StateId::Irrigating,
            name: "Irrigating",
            on_enter: Some(irrigating_enter),
            on_exit: Some(irrigating_exit),
            on_update: irrigating_update,
        },
        // Index 2: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: "Sleeping",
            on_enter: Some(sleeping_enter),
            on_exit: None,
            on_update: sleeping_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  MONITORING state: sampling soil moisture
// ═══════════════════════════════════════════════════════════════════════════

fn monitoring_enter(ctx: &mut FsmContext) {
    ctx.commands.pump_on = false;
    ctx.debouncer.reset();
    info!(
        "MONITORING: threshold {:.1}%, run length {} ms",
        ctx.config.threshold_percent, ctx.config.irrigation_duration_ms
    );
}

fn monitoring_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.sleep_requested {
        return Some(StateId::Sleeping);
    }

    let decision = ctx.debouncer.tick(
        ctx.now_ms,
        ctx.sensors.moisture_raw,
        ctx.config.threshold_percent,
        ctx.water.is_locked_out(),
    )?;

    // A completed window is the only place stale outcomes are cleared.
    ctx.log_remove_all(&PUMP_OUTCOMES);

    match decision {
        Decision::Irrigate => Some(StateId::Irrigating),
        Decision::Blocked => {
            warn!("MONITORING: soil dry but pump locked out (no water)");
            ctx.log_add(EventKind::PumpBlockedNoWater);
            None
        }
        Decision::NoAction => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IRRIGATING state: pump running for the captured duration
// ═══════════════════════════════════════════════════════════════════════════

fn irrigating_enter(ctx: &mut FsmContext) {
    let duration = ctx.config.irrigation_duration_ms;
    ctx.pump.start(ctx.now_ms, duration);
    ctx.commands.pump_on = true;
    ctx.debouncer.reset();
    ctx.log_remove_all(&PUMP_OUTCOMES);
    ctx.log_add(EventKind::PumpOn);
}

fn irrigating_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.sleep_requested {
        return Some(StateId::Sleeping);
    }

    match ctx.pump.check(ctx.now_ms, ctx.sensors.water_raw)? {
        StopCause::SafetyAbort => {
            ctx.commands.pump_on = false;
            ctx.water.force_lockout();
            ctx.log_remove_all(&[EventKind::PumpOn, EventKind::PumpOffDone]);
            ctx.log_add(EventKind::PumpOffNoWater);
        }
        StopCause::Completed => {
            ctx.commands.pump_on = false;
            ctx.log_remove_all(&[EventKind::PumpOn, EventKind::PumpOffNoWater]);
            ctx.log_add(EventKind::PumpOffDone);
        }
    }
    Some(StateId::Monitoring)
}

fn irrigating_exit(ctx: &mut FsmContext) {
    ctx.commands.pump_on = false;
    ctx.pump.stop();
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING state: terminal, the service enters deep sleep
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_enter(ctx: &mut FsmContext) {
    ctx.commands.pump_on = false;
    ctx.pump.stop();
    ctx.debouncer.reset();
    ctx.log_clear();
    ctx.log_add(EventKind::SleepNocturno);
    info!("SLEEPING: inactive window reached");
}

fn sleeping_update(_ctx: &mut FsmContext) -> Option<StateId> {
    None
}
