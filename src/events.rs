//! Pending-event log.
//!
//! The log is the device's externally visible status: an ordered set of
//! at most one entry per [`EventKind`], republished as a retained message
//! whenever it changes.  A dashboard that connects hours later reads the
//! retained list and knows what the device is doing *now*.
//!
//! ```text
//!   transition ──▶ remove(superseded group) ──▶ add(kind) ──▶ publish
//!                                                             (retained)
//! ```
//!
//! Entries are never cleared wholesale except at startup and when the
//! device goes to sleep.  Mutual-exclusion groups are declared once below
//! and applied by the callers.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Every status event the device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    PumpOn = 0,
    PumpOffDone = 1,
    PumpOffNoWater = 2,
    PumpBlockedNoWater = 3,
    SleepNocturno = 4,
    NtpError = 5,
    InitOk = 6,
}

impl EventKind {
    /// Number of distinct kinds; also the log's capacity.
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::PumpOn,
        Self::PumpOffDone,
        Self::PumpOffNoWater,
        Self::PumpBlockedNoWater,
        Self::SleepNocturno,
        Self::NtpError,
        Self::InitOk,
    ];

    /// Name used on the wire.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::PumpOn => "pump_on",
            Self::PumpOffDone => "pump_off_done",
            Self::PumpOffNoWater => "pump_off_no_water",
            Self::PumpBlockedNoWater => "pump_blocked_no_water",
            Self::SleepNocturno => "sleep_nocturno",
            Self::NtpError => "ntp_error",
            Self::InitOk => "init_ok",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.wire_name() == name)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ── Mutual-exclusion groups ───────────────────────────────────

/// Outcomes of the last irrigation decision.  At most one is current;
/// cleared when a new sampling window completes or a pump cycle starts.
pub const PUMP_OUTCOMES: [EventKind; 3] = [
    EventKind::PumpOffDone,
    EventKind::PumpOffNoWater,
    EventKind::PumpBlockedNoWater,
];

/// Everything pump-related.  Cleared on sleep entry.
pub const PUMP_STATUS: [EventKind; 4] = [
    EventKind::PumpOn,
    EventKind::PumpOffDone,
    EventKind::PumpOffNoWater,
    EventKind::PumpBlockedNoWater,
];

// ── Records ───────────────────────────────────────────────────

/// Wire format for event timestamps: `2026-10-17T08:00:00+0200`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Format a wall-clock instant the way the event log reports it.
pub fn format_timestamp(at: DateTime<FixedOffset>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Serialize)]
struct WireEvent {
    evento: &'static str,
    fecha: String,
}

// ── Log ───────────────────────────────────────────────────────

/// Deduplicating, insertion-ordered set of [`EventRecord`]s keyed by kind.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: heapless::Vec<EventRecord, { EventKind::COUNT }>,
    present: [bool; EventKind::COUNT],
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
            present: [false; EventKind::COUNT],
        }
    }

    /// Append `kind` stamped with `at`.  Returns `false` (and keeps the
    /// original position and timestamp) if it is already present.
    pub fn add(&mut self, kind: EventKind, at: DateTime<FixedOffset>) -> bool {
        if self.present[kind.index()] {
            return false;
        }
        // Capacity equals the number of kinds, so this cannot overflow.
        if self.entries.push(EventRecord { kind, timestamp: at }).is_err() {
            return false;
        }
        self.present[kind.index()] = true;
        true
    }

    /// Remove `kind`.  Removing an absent kind is a no-op returning `false`.
    pub fn remove(&mut self, kind: EventKind) -> bool {
        if !self.present[kind.index()] {
            return false;
        }
        self.entries.retain(|e| e.kind != kind);
        self.present[kind.index()] = false;
        true
    }

    /// Remove every kind in `group`.  Returns `true` if anything was removed.
    pub fn remove_all(&mut self, group: &[EventKind]) -> bool {
        group.iter().fold(false, |changed, &k| self.remove(k) | changed)
    }

    /// Drop every entry.  Returns `true` if the log was non-empty.
    pub fn clear(&mut self) -> bool {
        let changed = !self.entries.is_empty();
        self.entries.clear();
        self.present = [false; EventKind::COUNT];
        changed
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.present[kind.index()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter()
    }

    /// Kinds in insertion order.
    pub fn kinds(&self) -> heapless::Vec<EventKind, { EventKind::COUNT }> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Serialise the whole log as a JSON array of
    /// `{"evento": ..., "fecha": ...}` objects.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let wire: Vec<WireEvent> = self
            .entries
            .iter()
            .map(|e| WireEvent {
                evento: e.kind.wire_name(),
                fecha: format_timestamp(e.timestamp),
            })
            .collect();
        serde_json::to_string(&wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(
        offset_h: i32,
        (y, mo, d): (i32, u32, u32),
        (h, mi, s): (u32, u32, u32),
    ) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_h * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
    }

    fn t0() -> DateTime<FixedOffset> {
        local(2, (2026, 5, 4), (9, 15, 0))
    }

    fn t1() -> DateTime<FixedOffset> {
        local(2, (2026, 5, 4), (9, 20, 0))
    }

    #[test]
    fn add_is_deduplicated_and_keeps_first_timestamp() {
        let mut log = EventLog::new();
        assert!(log.add(EventKind::PumpOn, t0()));
        assert!(!log.add(EventKind::PumpOn, t1()));
        assert_eq!(log.len(), 1);
        assert_eq!(log.iter().next().unwrap().timestamp, t0());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut log = EventLog::new();
        log.add(EventKind::InitOk, t0());
        log.add(EventKind::PumpBlockedNoWater, t0());
        log.add(EventKind::PumpOn, t1());
        assert_eq!(
            log.kinds().as_slice(),
            &[EventKind::InitOk, EventKind::PumpBlockedNoWater, EventKind::PumpOn]
        );
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut log = EventLog::new();
        log.add(EventKind::InitOk, t0());
        assert!(!log.remove(EventKind::PumpOn));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn remove_all_reports_change_only_when_something_removed() {
        let mut log = EventLog::new();
        log.add(EventKind::InitOk, t0());
        assert!(!log.remove_all(&PUMP_OUTCOMES));
        log.add(EventKind::PumpOffDone, t0());
        log.add(EventKind::PumpOn, t0());
        assert!(log.remove_all(&PUMP_STATUS));
        assert_eq!(log.kinds().as_slice(), &[EventKind::InitOk]);
    }

    #[test]
    fn readd_after_remove_goes_to_the_back() {
        let mut log = EventLog::new();
        log.add(EventKind::PumpOn, t0());
        log.add(EventKind::InitOk, t0());
        log.remove(EventKind::PumpOn);
        log.add(EventKind::PumpOn, t1());
        assert_eq!(log.kinds().as_slice(), &[EventKind::InitOk, EventKind::PumpOn]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut log = EventLog::new();
        assert!(!log.clear());
        for k in EventKind::ALL {
            log.add(k, t0());
        }
        assert_eq!(log.len(), EventKind::COUNT);
        assert!(log.clear());
        assert!(log.is_empty());
        assert!(EventKind::ALL.iter().all(|&k| !log.contains(k)));
    }

    #[test]
    fn json_shape_matches_wire_format() {
        let mut log = EventLog::new();
        log.add(EventKind::SleepNocturno, local(1, (2026, 1, 10), (16, 0, 3)));
        let json = log.to_json().unwrap();
        assert_eq!(
            json,
            r#"[{"evento":"sleep_nocturno","fecha":"2026-01-10T16:00:03+0100"}]"#
        );
    }

    #[test]
    fn empty_log_serialises_to_empty_array() {
        assert_eq!(EventLog::new().to_json().unwrap(), "[]");
    }

    #[test]
    fn wire_names_roundtrip() {
        for k in EventKind::ALL {
            assert_eq!(EventKind::from_wire(k.wire_name()), Some(k));
        }
        assert_eq!(EventKind::from_wire("bogus"), None);
    }
}
