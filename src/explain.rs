//! Explanation Composer: turns the raw scoring artifacts into
//! a human-readable summary, reasoning trail, and recommendation.

use crate::types::{ChainPatternKind, EventKind, MotionActivity, SdkMode, ThreatLevel};

pub struct ExplanationInputs<'a> {
    pub event_kind: &'a EventKind,
    pub location: &'a str,
    pub threat_level: ThreatLevel,
    pub score: f64,
    pub chain_pattern: ChainPatternKind,
    pub rules_triggered: &'a [String],
    pub hour: u32,
    pub sdk_mode: SdkMode,
    pub motion_activity: Option<MotionActivity>,
}

#[derive(Debug, Clone)]
pub struct Explanation {
    pub summary: String,
    pub reasoning: String,
    pub recommendation: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExplanationComposer;

impl ExplanationComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(&self, inputs: &ExplanationInputs) -> Explanation {
        let tone = Self::tone_for(inputs.threat_level);
        let summary = Self::summary(inputs, tone);
        let reasoning = Self::reasoning(inputs);
        let recommendation = Self::recommendation(inputs.threat_level, inputs.chain_pattern);

        Explanation { summary, reasoning, recommendation }
    }

    fn tone_for(level: ThreatLevel) -> &'static str {
        match level {
            ThreatLevel::Low => "Routine",
            ThreatLevel::Standard => "Notable",
            ThreatLevel::Elevated => "Concerning",
            ThreatLevel::Critical => "Urgent",
        }
    }

    /// Kept within 40-200 characters
    fn summary(inputs: &ExplanationInputs, tone: &str) -> String {
        let kind_label = inputs.event_kind.as_token().replace('_', " ");
        let mut summary = format!(
            "{tone}: {} at {} (score {:.2}, {})",
            kind_label,
            inputs.location,
            inputs.score,
            inputs.threat_level.as_str()
        );
        if summary.len() > 200 {
            summary.truncate(197);
            summary.push_str("...");
        }
        if summary.len() < 40 {
            summary.push_str(" — no additional corroborating signals observed");
        }
        summary
    }

    /// Always cites four categories, in order: time context, location
    /// context, the chain-pattern-or-motion finding (falling back to a
    /// neutral note when neither fired), and the SDK mode the call ran
    /// under; then appends whichever rules fired, in the scorer's
    /// evaluation order (itself ordered by contribution magnitude).
    fn reasoning(inputs: &ExplanationInputs) -> String {
        let mut parts = vec![Self::time_context(inputs.hour), format!("location is {}", inputs.location)];

        parts.push(Self::chain_or_motion_finding(inputs.chain_pattern, inputs.motion_activity));
        parts.push(Self::mode_context(inputs.sdk_mode));

        for rule in inputs.rules_triggered {
            parts.push(Self::describe_rule(rule));
        }

        format!("Factors considered: {}.", parts.join("; "))
    }

    fn time_context(hour: u32) -> String {
        if (9..18).contains(&hour) {
            format!("occurred at {hour:02}:00 during daytime hours")
        } else if (18..23).contains(&hour) || (0..6).contains(&hour) {
            format!("occurred at {hour:02}:00 during night hours")
        } else {
            format!("occurred at {hour:02}:00")
        }
    }

    fn chain_or_motion_finding(chain_pattern: ChainPatternKind, motion_activity: Option<MotionActivity>) -> String {
        match chain_pattern {
            ChainPatternKind::ActiveBreakIn => "an active break-in pattern (glass break followed by motion)".to_string(),
            ChainPatternKind::ForcedEntry => "a forced-entry pattern (repeated door/window activity)".to_string(),
            ChainPatternKind::Intrusion => "an intrusion pattern (motion, door, motion)".to_string(),
            ChainPatternKind::Prowler => "a prowler pattern (motion across multiple perimeter zones)".to_string(),
            ChainPatternKind::Delivery => "a delivery pattern (doorbell, brief motion, then silence)".to_string(),
            ChainPatternKind::None => match motion_activity {
                Some(MotionActivity::PackageDrop) => "motion classified as a package drop".to_string(),
                Some(MotionActivity::Pet) => "motion classified as a pet".to_string(),
                Some(MotionActivity::Loitering) => "motion classified as loitering".to_string(),
                Some(MotionActivity::Walking) => "motion classified as walking".to_string(),
                Some(MotionActivity::Running) => "motion classified as running".to_string(),
                Some(MotionActivity::Vehicle) => "motion classified as a vehicle".to_string(),
                Some(MotionActivity::Unknown) => "motion activity could not be classified".to_string(),
                None => "no chain pattern or motion activity was available".to_string(),
            },
        }
    }

    fn mode_context(mode: SdkMode) -> String {
        match mode {
            SdkMode::Full => "assessed under full-capability mode".to_string(),
            SdkMode::Degraded => "assessed under degraded mode".to_string(),
            SdkMode::Minimal => "assessed under minimal mode (rules only, no learning)".to_string(),
            SdkMode::Emergency => "assessed under emergency mode (fused scoring bypassed)".to_string(),
        }
    }

    fn describe_rule(rule: &str) -> String {
        match rule {
            "night_boost" => "occurred during night hours".to_string(),
            "entry_point" => "location is an entry point".to_string(),
            "away_mode_multiplier" => "home is in away mode".to_string(),
            "critical_override" => "event kind is a critical override".to_string(),
            "high_confidence" => "sensor confidence was high".to_string(),
            "high_risk_zone" => "zone carries elevated baseline risk".to_string(),
            "mental_model_adjustment" => "adjusted by learned household behavior".to_string(),
            other => other.replace('_', " "),
        }
    }

    fn recommendation(level: ThreatLevel, chain_pattern: ChainPatternKind) -> String {
        if chain_pattern == ChainPatternKind::Delivery {
            return "Log for reference; no action needed.".to_string();
        }
        match level {
            ThreatLevel::Low => "No action needed.".to_string(),
            ThreatLevel::Standard => "Review footage when convenient.".to_string(),
            ThreatLevel::Elevated => "Review footage promptly and consider checking in on the property.".to_string(),
            ThreatLevel::Critical => "Immediate attention required; consider contacting emergency services.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_stays_within_length_bounds() {
        let composer = ExplanationComposer::new();
        let inputs = ExplanationInputs {
            event_kind: &EventKind::Motion,
            location: "front_door",
            threat_level: ThreatLevel::Standard,
            score: 0.42,
            chain_pattern: ChainPatternKind::None,
            rules_triggered: &[],
            hour: 12,
            sdk_mode: SdkMode::Full,
            motion_activity: None,
        };
        let explanation = composer.compose(&inputs);
        assert!(explanation.summary.len() >= 40);
        assert!(explanation.summary.len() <= 200);
    }

    #[test]
    fn reasoning_only_cites_fired_rules() {
        let composer = ExplanationComposer::new();
        let triggered = vec!["night_boost".to_string(), "entry_point".to_string()];
        let inputs = ExplanationInputs {
            event_kind: &EventKind::Door,
            location: "back_door",
            threat_level: ThreatLevel::Elevated,
            score: 0.65,
            chain_pattern: ChainPatternKind::None,
            rules_triggered: &triggered,
            hour: 12,
            sdk_mode: SdkMode::Full,
            motion_activity: None,
        };
        let explanation = composer.compose(&inputs);
        assert!(explanation.reasoning.contains("occurred during night hours") || explanation.reasoning.contains("night hours"));
        assert!(explanation.reasoning.contains("entry point"));
        assert!(!explanation.reasoning.contains("away mode"));
    }

    #[test]
    fn reasoning_always_cites_all_four_categories() {
        let composer = ExplanationComposer::new();
        let inputs = ExplanationInputs {
            event_kind: &EventKind::Motion,
            location: "backyard",
            threat_level: ThreatLevel::Low,
            score: 0.10,
            chain_pattern: ChainPatternKind::None,
            rules_triggered: &[],
            hour: 14,
            sdk_mode: SdkMode::Full,
            motion_activity: None,
        };
        let explanation = composer.compose(&inputs);
        assert!(explanation.reasoning.contains("14:00"), "missing time context: {}", explanation.reasoning);
        assert!(explanation.reasoning.contains("backyard"), "missing location context: {}", explanation.reasoning);
        assert!(
            explanation.reasoning.contains("no chain pattern or motion activity was available"),
            "missing chain/motion finding: {}",
            explanation.reasoning
        );
        assert!(explanation.reasoning.contains("full-capability mode"), "missing mode context: {}", explanation.reasoning);
    }

    #[test]
    fn reasoning_cites_motion_activity_when_no_chain_pattern_fired() {
        let composer = ExplanationComposer::new();
        let inputs = ExplanationInputs {
            event_kind: &EventKind::Motion,
            location: "driveway",
            threat_level: ThreatLevel::Low,
            score: 0.12,
            chain_pattern: ChainPatternKind::None,
            rules_triggered: &[],
            hour: 15,
            sdk_mode: SdkMode::Full,
            motion_activity: Some(MotionActivity::PackageDrop),
        };
        let explanation = composer.compose(&inputs);
        assert!(explanation.reasoning.contains("package drop"));
    }

    #[test]
    fn reasoning_cites_emergency_mode() {
        let composer = ExplanationComposer::new();
        let inputs = ExplanationInputs {
            event_kind: &EventKind::Motion,
            location: "hallway",
            threat_level: ThreatLevel::Standard,
            score: 0.5,
            chain_pattern: ChainPatternKind::None,
            rules_triggered: &[],
            hour: 3,
            sdk_mode: SdkMode::Emergency,
            motion_activity: None,
        };
        let explanation = composer.compose(&inputs);
        assert!(explanation.reasoning.contains("emergency mode"));
    }

    #[test]
    fn critical_level_gets_urgent_recommendation() {
        let composer = ExplanationComposer::new();
        let inputs = ExplanationInputs {
            event_kind: &EventKind::GlassBreak,
            location: "living_room",
            threat_level: ThreatLevel::Critical,
            score: 0.95,
            chain_pattern: ChainPatternKind::None,
            rules_triggered: &[],
            hour: 12,
            sdk_mode: SdkMode::Full,
            motion_activity: None,
        };
        let explanation = composer.compose(&inputs);
        assert!(explanation.recommendation.contains("Immediate"));
    }

    #[test]
    fn delivery_pattern_recommends_no_action() {
        let composer = ExplanationComposer::new();
        let inputs = ExplanationInputs {
            event_kind: &EventKind::DoorbellChime,
            location: "front_door",
            threat_level: ThreatLevel::Standard,
            score: 0.20,
            chain_pattern: ChainPatternKind::Delivery,
            rules_triggered: &[],
            hour: 12,
            sdk_mode: SdkMode::Full,
            motion_activity: None,
        };
        let explanation = composer.compose(&inputs);
        assert_eq!(explanation.recommendation, "Log for reference; no action needed.");
    }
}
