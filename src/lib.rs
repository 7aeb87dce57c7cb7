//! On-device threat-assessment core for a smart-home security analyzer.
//!
//! The crate is synchronous and has no network or database I/O: callers
//! push JSON event payloads through [`SdkHandle::assess`] and get back a
//! fully-explained [`AssessmentResult`]. Everything needed to reproduce a
//! score is recorded in the audit trail (see [`health::AuditRecorder`]).

pub mod chain;
pub mod config;
pub mod error;
pub mod explain;
pub mod fusion;
pub mod health;
pub mod ingress;
pub mod motion;
pub mod ring;
pub mod storage;
pub mod types;
pub mod user_patterns;
pub mod zone;

use chain::{ChainAnalyzer, EventChainState};
use config::SdkConfig;
use error::CoreError;
use explain::{ExplanationComposer, ExplanationInputs};
use fusion::{apply_critical_floor, BayesianFuser, Combination, RuleContext, RuleScorer};
use health::{AuditRecorder, HealthSnapshot, HealthTracker};
use ingress::{validate_payload, RateLimiter};
use motion::{MotionClassifier, MotionSource};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, OnceLock};
use storage::{InMemoryKvStore, KvStore};
use types::{AssessmentResult, AuditEntry, ChainPatternKind, Event, EventKind, SdkMode, SubScores, ThreatLevel, ZoneTier};
use user_patterns::{hash_user_id, UserPatternStore};
use zone::ZoneClassifier;

/// Entry point into the threat-assessment core. Owns all mutable state;
/// construct one per process (or per tenant) with [`SdkHandle::new`] rather
/// than relying on the process-wide [`shared`] accessor, which exists only
/// for callers that genuinely want a singleton.
pub struct SdkHandle {
    config: RwLock<SdkConfig>,
    rate_limiter: RateLimiter,
    chain: Mutex<EventChainState>,
    user_patterns: UserPatternStore,
    audit: Mutex<AuditRecorder>,
    health: Mutex<HealthTracker>,
    storage: Arc<dyn KvStore>,
    current_user_hash: Mutex<Option<String>>,
    forced_mode: Mutex<Option<SdkMode>>,
}

/// Fixed score/threat-level pair emitted by the emergency short-circuit;
/// falls inside the `Standard` band of `ThreatLevel::from_score`.
const EMERGENCY_FALLBACK_SCORE: f64 = 0.5;

impl Default for SdkHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SdkHandle {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryKvStore::new()))
    }

    pub fn with_storage(storage: Arc<dyn KvStore>) -> Self {
        Self {
            config: RwLock::new(SdkConfig::default()),
            rate_limiter: RateLimiter::new(),
            chain: Mutex::new(EventChainState::new()),
            user_patterns: UserPatternStore::new(),
            audit: Mutex::new(AuditRecorder::new()),
            health: Mutex::new(HealthTracker::new()),
            storage,
            current_user_hash: Mutex::new(None),
            forced_mode: Mutex::new(None),
        }
    }

    /// Replace the active configuration from a YAML document.
    pub fn configure(&self, yaml: &str) -> Result<(), CoreError> {
        let merged = self.config.read().merge_from_yaml(yaml)?;
        *self.config.write() = merged;
        Ok(())
    }

    pub fn configure_preset(&self, preset: config::ConfigPreset) {
        let mut config = self.config.write();
        let version = config.version + 1;
        *config = SdkConfig::from_preset(preset);
        config.version = version;
    }

    /// Associate future `assess` calls with a household/user. The raw id is
    /// hashed immediately; it is never retained or logged in the clear.
    pub fn set_user_id(&self, raw_user_id: &str) {
        *self.current_user_hash.lock() = Some(hash_user_id(raw_user_id));
    }

    /// Force a specific [`SdkMode`], bypassing the health-derived mode.
    /// Intended for operator-triggered emergency drills; pass `None` to
    /// return to health-derived mode selection.
    pub fn set_system_mode(&self, mode: Option<SdkMode>) {
        *self.forced_mode.lock() = mode;
    }

    pub fn get_system_health(&self, now: f64) -> HealthSnapshot {
        self.health.lock().snapshot(now)
    }

    pub fn get_audit_trail(&self, request_id: uuid::Uuid) -> Option<AuditEntry> {
        self.audit.lock().find(request_id)
    }

    pub fn get_recent_audit_trails(&self, n: usize) -> Vec<AuditEntry> {
        self.audit.lock().recent(n)
    }

    /// The mode that the *next* `assess` call would run under: the forced
    /// override if one is set via [`SdkHandle::set_system_mode`], otherwise
    /// whatever the health tracker has derived.
    pub fn mode(&self) -> SdkMode {
        self.current_mode()
    }

    pub fn export_audit_trails(&self) -> Result<String, CoreError> {
        let entries = self.audit.lock().all();
        serde_json::to_string_pretty(&entries).map_err(|_| CoreError::Internal { stage: "export_audit_trails" })
    }

    /// Validate, rate-limit, parse, and score a single JSON event.
    pub fn assess(&self, raw_json: &str, now: f64) -> Result<AssessmentResult, CoreError> {
        validate_payload(raw_json, 1)?;
        self.rate_limiter.check(now)?;

        let event: Event = serde_json::from_str(raw_json)
            .map_err(|_| CoreError::validation(error::ValidationKind::Schema))?;

        Ok(self.assess_one(event, raw_json, now))
    }

    /// Validate, rate-limit, parse, and score a JSON array of events,
    /// ingested in order against shared chain state. A single bare object is
    /// also accepted and treated as a one-element batch.
    pub fn assess_batch(&self, raw_json: &str, now: f64) -> Result<Vec<AssessmentResult>, CoreError> {
        let value: serde_json::Value = serde_json::from_str(raw_json)
            .map_err(|_| CoreError::validation(error::ValidationKind::Schema))?;
        let array = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        validate_payload(raw_json, array.len())?;
        self.rate_limiter.check(now)?;

        let events: Vec<Event> = array
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|_| CoreError::validation(error::ValidationKind::Schema))?;

        Ok(events
            .into_iter()
            .map(|event| {
                let raw_for_hash = serde_json::to_string(&event).unwrap_or_default();
                self.assess_one(event, &raw_for_hash, now)
            })
            .collect())
    }

    fn current_mode(&self) -> SdkMode {
        if let Some(forced) = *self.forced_mode.lock() {
            return forced;
        }
        self.health.lock().mode()
    }

    fn assess_one(&self, event: Event, raw_for_hash: &str, now: f64) -> AssessmentResult {
        let start = std::time::Instant::now();
        let request_id = uuid::Uuid::new_v4();
        let mode = self.current_mode();
        let config = self.config.read().clone();
        let zone_classifier = ZoneClassifier::new();
        let zone = zone_classifier.classify(&event.location);

        if mode.short_circuits() {
            return self.emergency_fallback(&event, raw_for_hash, &config, request_id, mode, now, start);
        }

        let mut had_error = false;

        // Lock order: rate bucket (already acquired/released above) ->
        // chain ring -> user patterns -> audit ring.
        let chain_snapshot = {
            let mut chain = self.chain.lock();
            chain.ingest(event.clone());
            chain.events()
        };

        let chain_pattern = ChainAnalyzer::new().evaluate(&chain_snapshot, now);

        let motion = if mode.runs_bayesian() {
            Self::motion_source(&event).map(|source| MotionClassifier::new().analyze(&source))
        } else {
            None
        };
        // Sensors that already tag a motion event as `pet`/`vehicle` take
        // precedence over the generic duration/energy/variance heuristic.
        let motion = motion.map(|m| match event.kind {
            EventKind::Pet => types::MotionFeatures { activity: types::MotionActivity::Pet, confidence: m.confidence.max(0.90), ..m },
            EventKind::Vehicle => types::MotionFeatures { activity: types::MotionActivity::Vehicle, confidence: m.confidence.max(0.85), ..m },
            _ => m,
        });

        let bayesian = if mode.runs_bayesian() {
            BayesianFuser::new().posterior(&event, &zone, motion.as_ref())
        } else {
            0.0
        };

        let current_user_hash = self.current_user_hash.lock().clone();
        let hour = event.hour_of_day();
        let storage = self.storage.as_ref();
        let mental_model_adjustment = if mode.runs_user_pattern_learning() {
            match &current_user_hash {
                Some(hash) => self.user_patterns.mental_model_adjustment(storage, hash, now, hour),
                None => 0.0,
            }
        } else {
            0.0
        };

        let rule_ctx = RuleContext { mental_model_adjustment };
        let (rules, rules_triggered) = RuleScorer::new().score(&event, &zone, &rule_ctx);

        let mut frequent_delivery_adjustment = 0.0;
        if mode.runs_user_pattern_learning() && chain_pattern.kind == ChainPatternKind::Delivery {
            if let Some(hash) = &current_user_hash {
                frequent_delivery_adjustment = self.user_patterns.frequent_delivery_dampening(storage, hash, now, hour);
                if let Err(_err) = self.user_patterns.record_delivery(storage, hash, now, hour) {
                    had_error = true;
                }
            }
        }

        let bayesian_for_combo = if mode.runs_bayesian() { bayesian } else { rules };
        let zone_multiplier = Self::zone_escalation(&zone_classifier, &chain_snapshot);
        let dampening = config.temporal.dampening_factor;
        let boost = config.temporal.boost_factor;
        let temporal_adjustment = fusion::temporal_dampening(&event, &zone, dampening, boost, &chain_pattern) + frequent_delivery_adjustment;

        let combination = Combination {
            bayesian: bayesian_for_combo,
            rules,
            chain_adjustment: chain_pattern.threat_delta,
            zone_multiplier,
            temporal_dampening: temporal_adjustment,
        };
        let combo_result = combination.resolve();
        let final_score = apply_critical_floor(combo_result.final_score, &event.kind);

        let motion_confidence = motion.map(|m| m.confidence).unwrap_or(0.0);
        let score_confidence = ((final_score - 0.5).abs() * 2.0).clamp(0.0, 1.0);
        let confidence = event.confidence.max(motion_confidence).max(score_confidence).clamp(0.0, 1.0);

        let threat_level = ThreatLevel::from_score(final_score);

        let explanation = ExplanationComposer::new().compose(&ExplanationInputs {
            event_kind: &event.kind,
            location: &event.location,
            threat_level,
            score: final_score,
            chain_pattern: chain_pattern.kind,
            rules_triggered: &rules_triggered,
            hour,
            sdk_mode: mode,
            motion_activity: motion.map(|m| m.activity),
        });

        let processing_ms = start.elapsed().as_secs_f64() * 1000.0;

        let sub_scores = SubScores {
            bayesian: bayesian_for_combo,
            rules,
            chain_adjustment: chain_pattern.threat_delta,
            zone_risk_multiplier: zone_multiplier,
            temporal_dampening: temporal_adjustment,
            raw: combo_result.raw,
            after_chain: combo_result.after_chain,
            after_zone: combo_result.after_zone,
            final_score,
        };

        let audit_entry = AuditEntry {
            request_id,
            input_hash: canonical_hash(raw_for_hash),
            configuration_version: config.version,
            sdk_mode: mode,
            event_kind: event.kind.as_token().to_string(),
            location: event.location.clone(),
            sub_scores,
            rules_triggered,
            chain_pattern: chain_pattern.kind,
            motion_activity: motion.map(|m| m.activity),
            threat_level,
            score: final_score,
            confidence,
            processing_ms,
        };
        if self.persist_audit(&audit_entry) {
            had_error = true;
        }
        self.health.lock().observe(now, processing_ms, had_error);

        AssessmentResult {
            request_id,
            threat_level,
            score: final_score,
            confidence,
            summary: explanation.summary,
            reasoning: explanation.reasoning,
            recommendation: explanation.recommendation,
            processing_ms,
        }
    }

    /// Fixed standard-level assessment returned under `SdkMode::Emergency`,
    /// bypassing chain ingestion, the rule/Bayesian scorers, combination, and
    /// the explanation composer entirely. Still audited and observed so the
    /// health tracker and audit trail stay coherent with every other call.
    fn emergency_fallback(
        &self,
        event: &Event,
        raw_for_hash: &str,
        config: &SdkConfig,
        request_id: uuid::Uuid,
        mode: SdkMode,
        now: f64,
        start: std::time::Instant,
    ) -> AssessmentResult {
        let threat_level = ThreatLevel::from_score(EMERGENCY_FALLBACK_SCORE);
        let confidence = 0.5;
        let processing_ms = start.elapsed().as_secs_f64() * 1000.0;

        let sub_scores = SubScores {
            bayesian: 0.0,
            rules: 0.0,
            chain_adjustment: 0.0,
            zone_risk_multiplier: 1.0,
            temporal_dampening: 0.0,
            raw: EMERGENCY_FALLBACK_SCORE,
            after_chain: EMERGENCY_FALLBACK_SCORE,
            after_zone: EMERGENCY_FALLBACK_SCORE,
            final_score: EMERGENCY_FALLBACK_SCORE,
        };

        let audit_entry = AuditEntry {
            request_id,
            input_hash: canonical_hash(raw_for_hash),
            configuration_version: config.version,
            sdk_mode: mode,
            event_kind: event.kind.as_token().to_string(),
            location: event.location.clone(),
            sub_scores,
            rules_triggered: Vec::new(),
            chain_pattern: ChainPatternKind::None,
            motion_activity: None,
            threat_level,
            score: EMERGENCY_FALLBACK_SCORE,
            confidence,
            processing_ms,
        };
        let had_error = self.persist_audit(&audit_entry);
        self.health.lock().observe(now, processing_ms, had_error);

        AssessmentResult {
            request_id,
            threat_level,
            score: EMERGENCY_FALLBACK_SCORE,
            confidence,
            summary: "Emergency mode: fused scoring unavailable, standard-level assessment returned.".to_string(),
            reasoning: "The SDK is running under emergency mode; chain analysis, motion classification, and Bayesian fusion are bypassed, so this assessment reflects a fixed standard-level fallback rather than an evaluation of this event's specifics.".to_string(),
            recommendation: "Review manually; automated scoring is degraded.".to_string(),
            processing_ms,
        }
    }

    /// Writes the entry to the in-process audit ring and write-through to
    /// `storage` under `audit/<request_id>`. Returns `true` if persistence
    /// failed (serialization or storage error), so callers can feed it into
    /// the health tracker's error rate.
    fn persist_audit(&self, entry: &AuditEntry) -> bool {
        let had_error = match serde_json::to_vec(entry) {
            Ok(bytes) => self.storage.put(&format!("audit/{}", entry.request_id), bytes).is_err(),
            Err(_) => true,
        };
        self.audit.lock().record(entry.clone());
        had_error
    }

    fn motion_source(event: &Event) -> Option<MotionSource> {
        if let Some(samples) = event.metadata.raw_motion_samples.clone() {
            let sample_rate_hz = event.metadata.sample_rate.unwrap_or(50.0);
            let duration_s = event.metadata.duration.unwrap_or(samples.len() as f64 / sample_rate_hz);
            return Some(MotionSource::Raw { samples, sample_rate_hz, duration_s });
        }
        if event.metadata.energy.is_some() || event.metadata.duration.is_some() {
            return Some(MotionSource::Summary {
                duration_s: event.metadata.duration.unwrap_or(0.0),
                energy: event.metadata.energy.unwrap_or(0.0),
                height: event.metadata.height,
            });
        }
        None
    }

    fn zone_escalation(classifier: &ZoneClassifier, chain: &[Event]) -> f64 {
        let sequence: Vec<(&str, ZoneTier, f64)> = chain
            .iter()
            .map(|e| (e.location.as_str(), classifier.classify(&e.location).tier, e.timestamp))
            .collect();
        classifier.escalation(&sequence)
    }
}

fn canonical_hash(raw: &str) -> String {
    use sha2::{Digest, Sha256};
    let canonical = canonicalize_json(raw).unwrap_or_else(|| raw.to_string());
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Re-serializes the JSON value with keys sorted (`serde_json::Value`'s
/// `Object` is a `BTreeMap` by default) and no incidental whitespace, so the
/// same logical request always hashes the same way.
fn canonicalize_json(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    serde_json::to_string(&value).ok()
}

/// Lazily-initialized process-wide singleton, for callers that want a
/// shared instance without threading an `Arc<SdkHandle>` through their own
/// code. Tests should prefer `SdkHandle::new()` directly.
static SHARED: OnceLock<SdkHandle> = OnceLock::new();

pub fn shared() -> &'static SdkHandle {
    SHARED.get_or_init(SdkHandle::new)
}
