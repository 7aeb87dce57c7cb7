//! Health & Mode State Machine, and the audit recorder.
//!
//! Tracks rolling 1-minute and 5-minute error-rate and latency windows and
//! steps `SdkMode` down under sustained degradation, back up only after 30s
//! of healthy hysteresis. Plain struct with explicit transition methods, no
//! external state-machine crate.

use crate::ring::RingBuffer;
use crate::types::{AuditEntry, SdkMode};

const ONE_MINUTE: f64 = 60.0;
const FIVE_MINUTES: f64 = 300.0;
const RECOVERY_HYSTERESIS: f64 = 30.0;
pub const AUDIT_CAPACITY: usize = 1000;

const FULL_ERROR_RATE_MAX: f64 = 0.05;
const FULL_P95_MAX_MS: f64 = 100.0;
const DEGRADED_ERROR_RATE_MAX: f64 = 0.20;
const DEGRADED_P95_MAX_MS: f64 = 500.0;
const MINIMAL_ERROR_RATE_MAX: f64 = 0.50;

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: f64,
    latency_ms: f64,
    is_error: bool,
}

/// Rolling health tracker. `now` is supplied by the caller on every
/// observation rather than read from the system clock, keeping the module
/// deterministic and testable.
#[derive(Debug)]
pub struct HealthTracker {
    samples: Vec<Sample>,
    mode: SdkMode,
    last_unhealthy_at: Option<f64>,
    last_transition_at: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSnapshot {
    pub error_rate_1m: f64,
    pub error_rate_5m: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub sample_count: usize,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            mode: SdkMode::Full,
            last_unhealthy_at: None,
            last_transition_at: 0.0,
        }
    }

    pub fn mode(&self) -> SdkMode {
        self.mode
    }

    /// Record the outcome of one `assess` call and recompute the mode.
    pub fn observe(&mut self, now: f64, latency_ms: f64, is_error: bool) {
        self.samples.push(Sample { timestamp: now, latency_ms, is_error });
        self.samples.retain(|s| now - s.timestamp <= FIVE_MINUTES);
        self.recompute_mode(now);
    }

    pub fn snapshot(&self, now: f64) -> HealthSnapshot {
        let window_1m: Vec<&Sample> = self.samples.iter().filter(|s| now - s.timestamp <= ONE_MINUTE).collect();
        let window_5m: Vec<&Sample> = self.samples.iter().filter(|s| now - s.timestamp <= FIVE_MINUTES).collect();

        let error_rate_1m = Self::error_rate(&window_1m);
        let error_rate_5m = Self::error_rate(&window_5m);

        let mut latencies: Vec<f64> = window_1m.iter().map(|s| s.latency_ms).collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap());

        HealthSnapshot {
            error_rate_1m,
            error_rate_5m,
            p50_latency_ms: Self::percentile(&latencies, 0.50),
            p95_latency_ms: Self::percentile(&latencies, 0.95),
            p99_latency_ms: Self::percentile(&latencies, 0.99),
            sample_count: window_1m.len(),
        }
    }

    fn error_rate(window: &[&Sample]) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        let errors = window.iter().filter(|s| s.is_error).count();
        errors as f64 / window.len() as f64
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Full requires error rate under 5% and p95 latency under 100ms;
    /// degraded tolerates error rate under 20% or p95 under 500ms; minimal
    /// tolerates error rate under 50%; at or above 50% the tracker reports
    /// emergency. Degrading jumps straight to the worst tier the current
    /// readings justify; recovering steps back up one tier per observation,
    /// and only once `RECOVERY_HYSTERESIS` seconds have passed since the
    /// last unhealthy reading.
    fn target_mode(error_rate: f64, p95_latency_ms: f64) -> SdkMode {
        if error_rate < FULL_ERROR_RATE_MAX && p95_latency_ms < FULL_P95_MAX_MS {
            SdkMode::Full
        } else if error_rate < DEGRADED_ERROR_RATE_MAX || p95_latency_ms < DEGRADED_P95_MAX_MS {
            SdkMode::Degraded
        } else if error_rate < MINIMAL_ERROR_RATE_MAX {
            SdkMode::Minimal
        } else {
            SdkMode::Emergency
        }
    }

    fn step_up(mode: SdkMode) -> SdkMode {
        match mode {
            SdkMode::Emergency => SdkMode::Minimal,
            SdkMode::Minimal => SdkMode::Degraded,
            SdkMode::Degraded => SdkMode::Full,
            SdkMode::Full => SdkMode::Full,
        }
    }

    fn recompute_mode(&mut self, now: f64) {
        let snapshot = self.snapshot(now);
        let target = Self::target_mode(snapshot.error_rate_1m, snapshot.p95_latency_ms);
        let unhealthy = target != SdkMode::Full;

        if target > self.mode {
            self.transition(target, now);
        } else if target < self.mode {
            match self.last_unhealthy_at {
                Some(t) if now - t < RECOVERY_HYSTERESIS => {}
                _ => self.transition(Self::step_up(self.mode), now),
            }
        }

        if unhealthy {
            self.last_unhealthy_at = Some(now);
        }
    }

    fn transition(&mut self, next: SdkMode, now: f64) {
        if next != self.mode {
            tracing::warn!(from = ?self.mode, to = ?next, "sdk mode transition");
            self.mode = next;
            self.last_transition_at = now;
        }
    }
}

/// Bounded audit trail, newest entries evict the oldest past `AUDIT_CAPACITY`.
#[derive(Debug)]
pub struct AuditRecorder {
    ring: RingBuffer<AuditEntry>,
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditRecorder {
    pub fn new() -> Self {
        Self { ring: RingBuffer::new(AUDIT_CAPACITY) }
    }

    pub fn record(&mut self, entry: AuditEntry) {
        self.ring.push(entry);
    }

    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        self.ring.iter_rev().take(n).cloned().collect()
    }

    pub fn all(&self) -> Vec<AuditEntry> {
        self.ring.to_vec()
    }

    pub fn find(&self, request_id: uuid::Uuid) -> Option<AuditEntry> {
        self.ring.iter().find(|e| e.request_id == request_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_full_mode() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.mode(), SdkMode::Full);
    }

    #[test]
    fn sustained_errors_step_mode_down_from_full() {
        let mut tracker = HealthTracker::new();
        for i in 0..20 {
            tracker.observe(i as f64, 10.0, true);
        }
        assert_ne!(tracker.mode(), SdkMode::Full);
    }

    #[test]
    fn high_latency_steps_down_mode() {
        let mut tracker = HealthTracker::new();
        for i in 0..20 {
            tracker.observe(i as f64, 500.0, false);
        }
        assert_ne!(tracker.mode(), SdkMode::Full);
    }

    #[test]
    fn recovery_requires_hysteresis_window() {
        let mut tracker = HealthTracker::new();
        for i in 0..20 {
            tracker.observe(i as f64, 500.0, false);
        }
        assert_ne!(tracker.mode(), SdkMode::Full);

        // Still within the 1-minute window of the bad samples: no recovery yet.
        tracker.observe(25.0, 10.0, false);
        assert_ne!(tracker.mode(), SdkMode::Full, "should not recover immediately");

        // Once the bad samples have rolled out of the 1-minute window and
        // RECOVERY_HYSTERESIS has elapsed since the last unhealthy reading,
        // mode steps back up one level per healthy observation.
        tracker.observe(80.0, 10.0, false);
        tracker.observe(115.0, 10.0, false);
        assert_eq!(tracker.mode(), SdkMode::Full);
    }

    #[test]
    fn audit_recorder_never_exceeds_capacity() {
        let mut recorder = AuditRecorder::new();
        for _ in 0..(AUDIT_CAPACITY + 50) {
            recorder.record(sample_entry());
        }
        assert_eq!(recorder.all().len(), AUDIT_CAPACITY);
    }

    fn sample_entry() -> AuditEntry {
        use crate::types::{ChainPatternKind, SubScores, ThreatLevel};
        AuditEntry {
            request_id: uuid::Uuid::new_v4(),
            input_hash: "deadbeef".to_string(),
            configuration_version: 1,
            sdk_mode: SdkMode::Full,
            event_kind: "motion".to_string(),
            location: "hallway".to_string(),
            sub_scores: SubScores {
                bayesian: 0.2,
                rules: 0.2,
                chain_adjustment: 0.0,
                zone_risk_multiplier: 1.0,
                temporal_dampening: 0.0,
                raw: 0.2,
                after_chain: 0.2,
                after_zone: 0.2,
                final_score: 0.2,
            },
            rules_triggered: vec![],
            chain_pattern: ChainPatternKind::None,
            motion_activity: None,
            threat_level: ThreatLevel::Low,
            score: 0.2,
            confidence: 0.5,
            processing_ms: 1.0,
        }
    }
}
