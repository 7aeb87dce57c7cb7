//! Shared data model: events, zones, motion features, chain patterns,
//! assessments, audit entries, and the SDK mode state machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Recognized event-kind vocabulary. Unknown tokens fall through to
/// `Unknown` rather than failing validation.
///
/// JSON representation is the plain snake_case token (`"glass_break"`, not
/// `{"GlassBreak": null}`), via the `from`/`into` round-trip through
/// `from_token`/`as_token` rather than the default externally-tagged derive
/// — `Unknown(String)` carries a payload, so `#[serde(other)]` (unit-variant
/// only) can't express the catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    DoorbellChime,
    Motion,
    Door,
    Window,
    GlassBreak,
    Pet,
    Vehicle,
    Fire,
    Co2,
    WaterLeak,
    Unknown(String),
}

impl EventKind {
    pub fn from_token(token: &str) -> Self {
        match token {
            "doorbell_chime" => EventKind::DoorbellChime,
            "motion" => EventKind::Motion,
            "door" => EventKind::Door,
            "window" => EventKind::Window,
            "glass_break" => EventKind::GlassBreak,
            "pet" => EventKind::Pet,
            "vehicle" => EventKind::Vehicle,
            "fire" => EventKind::Fire,
            "co2" => EventKind::Co2,
            "water_leak" => EventKind::WaterLeak,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_token(&self) -> &str {
        match self {
            EventKind::DoorbellChime => "doorbell_chime",
            EventKind::Motion => "motion",
            EventKind::Door => "door",
            EventKind::Window => "window",
            EventKind::GlassBreak => "glass_break",
            EventKind::Pet => "pet",
            EventKind::Vehicle => "vehicle",
            EventKind::Fire => "fire",
            EventKind::Co2 => "co2",
            EventKind::WaterLeak => "water_leak",
            EventKind::Unknown(s) => s.as_str(),
        }
    }

    /// Overrides that bypass dampening and floor the score.
    pub fn is_critical_override(&self) -> bool {
        matches!(
            self,
            EventKind::GlassBreak | EventKind::Fire | EventKind::Co2 | EventKind::WaterLeak
        )
    }

    pub fn is_door_or_window(&self) -> bool {
        matches!(self, EventKind::Door | EventKind::Window)
    }
}

impl From<String> for EventKind {
    fn from(token: String) -> Self {
        EventKind::from_token(&token)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_token().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeMode {
    Home,
    Away,
    Night,
    #[serde(other)]
    Unknown,
}

impl HomeMode {
    pub fn from_token(token: &str) -> Self {
        match token {
            "home" => HomeMode::Home,
            "away" => HomeMode::Away,
            "night" => HomeMode::Night,
            _ => HomeMode::Unknown,
        }
    }
}

/// The recognized metadata keys, modeled as a tagged sum rather than a free
/// map. Unknown keys are preserved only in `extra`, for audit hashing; they
/// never influence scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub location: Option<String>,
    pub home_mode: Option<HomeMode>,
    pub duration: Option<f64>,
    pub energy: Option<f64>,
    pub raw_motion_samples: Option<Vec<f32>>,
    pub sample_rate: Option<f64>,
    pub height: Option<f64>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// An immutable security event. Carries no personal identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Seconds, monotonically non-decreasing across a chain; also treated as
    /// a wall-clock Unix timestamp for time-of-day bucketing.
    pub timestamp: f64,
    pub confidence: f64,
    pub location: String,
    pub home_mode: HomeMode,
    pub metadata: Metadata,
}

impl Event {
    pub fn hour_of_day(&self) -> u32 {
        use chrono::Timelike;
        chrono::DateTime::from_timestamp(self.timestamp as i64, 0)
            .map(|dt| dt.hour())
            .unwrap_or(12)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTier {
    Entry,
    Perimeter,
    Interior,
    Public,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub tier: ZoneTier,
    pub risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionActivity {
    PackageDrop,
    Pet,
    Loitering,
    Walking,
    Running,
    Vehicle,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionFeatures {
    pub activity: MotionActivity,
    pub duration_s: f64,
    pub energy: f64,
    pub variance: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPatternKind {
    ActiveBreakIn,
    ForcedEntry,
    Intrusion,
    Prowler,
    Delivery,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainPattern {
    pub kind: ChainPatternKind,
    pub threat_delta: f64,
}

impl ChainPattern {
    pub fn none() -> Self {
        Self {
            kind: ChainPatternKind::None,
            threat_delta: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Low,
    Standard,
    Elevated,
    Critical,
}

impl ThreatLevel {
    /// Map a [0,1] score into a threat level.
    pub fn from_score(score: f64) -> Self {
        if score < 0.30 {
            ThreatLevel::Low
        } else if score < 0.55 {
            ThreatLevel::Standard
        } else if score < 0.80 {
            ThreatLevel::Elevated
        } else {
            ThreatLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Standard => "standard",
            ThreatLevel::Elevated => "elevated",
            ThreatLevel::Critical => "critical",
        }
    }
}

/// Intermediate sub-scores recorded verbatim in the audit trail so that
/// `bayesian + rules_delta_contribution ≈ final_score` can be replayed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubScores {
    pub bayesian: f64,
    pub rules: f64,
    pub chain_adjustment: f64,
    pub zone_risk_multiplier: f64,
    pub temporal_dampening: f64,
    pub raw: f64,
    pub after_chain: f64,
    pub after_zone: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub request_id: Uuid,
    pub threat_level: ThreatLevel,
    pub score: f64,
    pub confidence: f64,
    pub summary: String,
    pub reasoning: String,
    pub recommendation: String,
    pub processing_ms: f64,
}

/// Ordered from least to most degraded so the health tracker can compare
/// severity directly (`Emergency > Minimal > Degraded > Full`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkMode {
    Full,
    Degraded,
    Minimal,
    Emergency,
}

impl SdkMode {
    pub fn runs_bayesian(&self) -> bool {
        !matches!(self, SdkMode::Minimal | SdkMode::Emergency)
    }

    pub fn runs_user_pattern_learning(&self) -> bool {
        matches!(self, SdkMode::Full)
    }

    pub fn short_circuits(&self) -> bool {
        matches!(self, SdkMode::Emergency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub request_id: Uuid,
    pub input_hash: String,
    pub configuration_version: u32,
    pub sdk_mode: SdkMode,
    pub event_kind: String,
    pub location: String,
    pub sub_scores: SubScores,
    pub rules_triggered: Vec<String>,
    pub chain_pattern: ChainPatternKind,
    pub motion_activity: Option<MotionActivity>,
    pub threat_level: ThreatLevel,
    pub score: f64,
    pub confidence: f64,
    pub processing_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_kind_falls_through() {
        let k = EventKind::from_token("garage_sensor");
        assert_eq!(k, EventKind::Unknown("garage_sensor".to_string()));
        assert!(!k.is_critical_override());
    }

    #[test]
    fn critical_overrides_match_known_kinds() {
        for token in ["glass_break", "fire", "co2", "water_leak"] {
            assert!(EventKind::from_token(token).is_critical_override());
        }
        assert!(!EventKind::from_token("motion").is_critical_override());
    }

    #[test]
    fn threat_level_boundaries_match_table() {
        assert_eq!(ThreatLevel::from_score(0.0), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(0.29), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(0.30), ThreatLevel::Standard);
        assert_eq!(ThreatLevel::from_score(0.54), ThreatLevel::Standard);
        assert_eq!(ThreatLevel::from_score(0.55), ThreatLevel::Elevated);
        assert_eq!(ThreatLevel::from_score(0.79), ThreatLevel::Elevated);
        assert_eq!(ThreatLevel::from_score(0.80), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(1.0), ThreatLevel::Critical);
    }
}
