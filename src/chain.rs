//! Event-Chain Analyzer.

use crate::ring::RingBuffer;
use crate::types::{ChainPattern, ChainPatternKind, Event, EventKind};

pub const MAX_CHAIN_EVENTS: usize = 100;
pub const CHAIN_WINDOW: f64 = 60.0;

/// A bounded ring of the most recent events, time-trimmed to `CHAIN_WINDOW`.
/// Entries are kept in non-decreasing timestamp order.
#[derive(Debug, Clone)]
pub struct EventChainState {
    ring: RingBuffer<Event>,
}

impl Default for EventChainState {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChainState {
    pub fn new() -> Self {
        Self {
            ring: RingBuffer::new(MAX_CHAIN_EVENTS),
        }
    }

    /// Append `event`, then evict anything older than `CHAIN_WINDOW` relative
    /// to `event.timestamp` (the newest ingested timestamp).
    pub fn ingest(&mut self, event: Event) {
        let now = event.timestamp;
        self.ring.push(event);
        self.ring.retain(|e| now - e.timestamp <= CHAIN_WINDOW);
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn events(&self) -> Vec<Event> {
        self.ring.to_vec()
    }
}

/// Stateless pattern matcher over a chain snapshot, evaluated in priority
/// order (highest |threat_delta| first); first match wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChainAnalyzer;

impl ChainAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the pattern for the chain as it stands at processing time
    /// `now`, which may lag the latest event's own `timestamp` (ingestion can
    /// be delayed or batched) — this is what lets the delivery pattern's
    /// prospective silence test resolve without a background timer.
    pub fn evaluate(&self, events: &[Event], now: f64) -> ChainPattern {
        if events.is_empty() {
            return ChainPattern::none();
        }

        if Self::active_break_in(events, now) {
            return ChainPattern { kind: ChainPatternKind::ActiveBreakIn, threat_delta: 0.70 };
        }
        if Self::forced_entry(events, now) {
            return ChainPattern { kind: ChainPatternKind::ForcedEntry, threat_delta: 0.60 };
        }
        if Self::intrusion(events, now) {
            return ChainPattern { kind: ChainPatternKind::Intrusion, threat_delta: 0.50 };
        }
        if Self::prowler(events, now) {
            return ChainPattern { kind: ChainPatternKind::Prowler, threat_delta: 0.45 };
        }
        if Self::delivery(events, now) {
            return ChainPattern { kind: ChainPatternKind::Delivery, threat_delta: -0.40 };
        }
        ChainPattern::none()
    }

    /// glass_break then any motion within 20s.
    fn active_break_in(events: &[Event], _now: f64) -> bool {
        let breaks: Vec<&Event> = events.iter().filter(|e| e.kind == EventKind::GlassBreak).collect();
        for b in &breaks {
            if events
                .iter()
                .any(|e| e.kind == EventKind::Motion && e.timestamp >= b.timestamp && e.timestamp - b.timestamp <= 20.0)
            {
                return true;
            }
        }
        false
    }

    /// >= 3 door/window events within a 15s span.
    fn forced_entry(events: &[Event], _now: f64) -> bool {
        let mut doors: Vec<f64> = events
            .iter()
            .filter(|e| e.kind.is_door_or_window())
            .map(|e| e.timestamp)
            .collect();
        doors.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for window in doors.windows(3) {
            if window[2] - window[0] <= 15.0 {
                return true;
            }
        }
        false
    }

    /// motion -> door -> motion, total span <= 30s, pattern still ongoing
    /// (i.e. the door event is not the newest, meaning a motion followed it).
    fn intrusion(events: &[Event], _now: f64) -> bool {
        let mut ordered: Vec<&Event> = events.iter().collect();
        ordered.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());

        for i in 0..ordered.len() {
            if ordered[i].kind != EventKind::Motion {
                continue;
            }
            for j in (i + 1)..ordered.len() {
                if ordered[j].kind != EventKind::Door {
                    continue;
                }
                for k in (j + 1)..ordered.len() {
                    if ordered[k].kind == EventKind::Motion
                        && ordered[k].timestamp - ordered[i].timestamp <= 30.0
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// motion events in >= 3 distinct zones within 60s.
    fn prowler(events: &[Event], now: f64) -> bool {
        let mut zones: Vec<&str> = Vec::new();
        for e in events {
            if e.kind == EventKind::Motion && now - e.timestamp <= CHAIN_WINDOW {
                if !zones.contains(&e.location.as_str()) {
                    zones.push(e.location.as_str());
                }
            }
        }
        zones.len() >= 3
    }

    /// doorbell_chime -> motion within 2-30s -> silence >= 15s since that
    /// motion. The silence test is prospective: if fewer than 15s have
    /// elapsed since the last motion, the pattern is tentative and does not
    /// fire yet.
    fn delivery(events: &[Event], now: f64) -> bool {
        let mut ordered: Vec<&Event> = events.iter().collect();
        ordered.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());

        for i in 0..ordered.len() {
            if ordered[i].kind != EventKind::DoorbellChime {
                continue;
            }
            for j in (i + 1)..ordered.len() {
                let gap = ordered[j].timestamp - ordered[i].timestamp;
                if ordered[j].kind == EventKind::Motion && (2.0..=30.0).contains(&gap) {
                    let silence = now - ordered[j].timestamp;
                    if silence >= 15.0 {
                        return true;
                    }
                }
            }
        }
        false
    }
}
