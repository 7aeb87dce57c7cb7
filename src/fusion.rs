//! Bayesian evidence fusion and rule-score extraction.
//!
//! Evidence factors are combined in log-odds space from a fixed prior, in a
//! deterministic factor order, then blended with a separate rule-based score.
//! Grounded on the log-odds/LLR combination in the `bayesian_decision_engine`
//! prototype (`PriorModel` + `LLRModel::compute_llr` + `logit`/`sigmoid`).

use crate::types::{ChainPattern, ChainPatternKind, Event, EventKind, HomeMode, MotionFeatures, ZoneDescriptor, ZoneTier};

/// log(0.15 / 0.85), the base rate used as the Bayesian prior.
pub const PRIOR_LOGIT: f64 = -1.734_601_055_806_362_3;

pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A single piece of evidence: likelihood under threat, likelihood under
/// not-threat, and a weight scaling its contribution in log-odds space.
#[derive(Debug, Clone, Copy)]
struct EvidenceFactor {
    id: &'static str,
    p_given_threat: f64,
    p_given_benign: f64,
    weight: f64,
}

impl EvidenceFactor {
    fn log_likelihood_ratio(&self) -> f64 {
        (self.p_given_threat / self.p_given_benign).ln() * self.weight
    }
}

/// Evaluates the fixed Bayesian evidence table against one event + context,
/// producing a posterior probability in `[0, 1]`. Factor order is fixed so
/// that summation is deterministic and commutative across runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BayesianFuser;

impl BayesianFuser {
    pub fn new() -> Self {
        Self
    }

    pub fn posterior(&self, event: &Event, zone: &ZoneDescriptor, motion: Option<&MotionFeatures>) -> f64 {
        let factors = Self::factors(event, zone, motion);
        let mut logit_sum = PRIOR_LOGIT;
        for factor in &factors {
            logit_sum += factor.log_likelihood_ratio();
        }
        sigmoid(logit_sum)
    }

    /// Deterministic, fixed-order factor table. Only factors whose
    /// precondition is met are included (absent evidence contributes nothing,
    /// rather than a neutral 1.0 weight — equivalent but keeps the table
    /// self-documenting about which conditions fired).
    fn factors(event: &Event, zone: &ZoneDescriptor, motion: Option<&MotionFeatures>) -> Vec<EvidenceFactor> {
        let mut out = Vec::new();
        let hour = event.hour_of_day();

        out.push(EvidenceFactor {
            id: "event_kind",
            p_given_threat: Self::kind_threat_likelihood(&event.kind),
            p_given_benign: Self::kind_benign_likelihood(&event.kind),
            weight: 1.0,
        });

        out.push(EvidenceFactor {
            id: "zone_tier",
            p_given_threat: match zone.tier {
                ZoneTier::Entry => 0.55,
                ZoneTier::Perimeter => 0.40,
                ZoneTier::Interior => 0.25,
                ZoneTier::Public => 0.15,
            },
            p_given_benign: match zone.tier {
                ZoneTier::Entry => 0.30,
                ZoneTier::Perimeter => 0.30,
                ZoneTier::Interior => 0.30,
                ZoneTier::Public => 0.35,
            },
            weight: 1.0,
        });

        if event.home_mode == HomeMode::Away {
            out.push(EvidenceFactor {
                id: "home_mode_away",
                p_given_threat: 0.60,
                p_given_benign: 0.35,
                weight: 1.0,
            });
        } else if event.home_mode == HomeMode::Night {
            out.push(EvidenceFactor {
                id: "home_mode_night",
                p_given_threat: 0.55,
                p_given_benign: 0.40,
                weight: 1.0,
            });
        }

        let is_night_hours = !(6..22).contains(&hour);
        if is_night_hours {
            out.push(EvidenceFactor {
                id: "night_hours",
                p_given_threat: 0.58,
                p_given_benign: 0.38,
                weight: 1.0,
            });
        }

        out.push(EvidenceFactor {
            id: "event_confidence",
            p_given_threat: 0.40 + 0.50 * event.confidence,
            p_given_benign: 0.90 - 0.50 * event.confidence,
            weight: 1.0,
        });

        if let Some(m) = motion {
            let (p_t, p_b) = match m.activity {
                crate::types::MotionActivity::PackageDrop => (0.10, 0.45),
                crate::types::MotionActivity::Pet => (0.08, 0.40),
                crate::types::MotionActivity::Loitering => (0.55, 0.20),
                crate::types::MotionActivity::Walking => (0.30, 0.35),
                crate::types::MotionActivity::Running => (0.50, 0.20),
                crate::types::MotionActivity::Vehicle => (0.25, 0.30),
                crate::types::MotionActivity::Unknown => (0.35, 0.35),
            };
            out.push(EvidenceFactor { id: "motion_activity", p_given_threat: p_t, p_given_benign: p_b, weight: 0.8 });
        }

        out
    }

    fn kind_threat_likelihood(kind: &EventKind) -> f64 {
        match kind {
            EventKind::GlassBreak | EventKind::Fire | EventKind::Co2 | EventKind::WaterLeak => 0.95,
            EventKind::Door | EventKind::Window => 0.45,
            EventKind::Motion => 0.35,
            EventKind::DoorbellChime => 0.20,
            EventKind::Vehicle => 0.30,
            EventKind::Pet => 0.10,
            EventKind::Unknown(_) => 0.30,
        }
    }

    fn kind_benign_likelihood(kind: &EventKind) -> f64 {
        match kind {
            EventKind::GlassBreak | EventKind::Fire | EventKind::Co2 | EventKind::WaterLeak => 0.02,
            EventKind::Door | EventKind::Window => 0.30,
            EventKind::Motion => 0.40,
            EventKind::DoorbellChime => 0.45,
            EventKind::Vehicle => 0.35,
            EventKind::Pet => 0.45,
            EventKind::Unknown(_) => 0.35,
        }
    }
}

/// Decision-tree-style rule score, independent of the Bayesian posterior.
/// Named boosts are additive in probability space and clamped at the end.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleScorer;

#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    /// Additive mental-model term, already capped to ±0.10 by the caller.
    pub mental_model_adjustment: f64,
}

impl RuleScorer {
    pub fn new() -> Self {
        Self
    }

    /// Returns `(score, triggered_rule_names)`.
    pub fn score(&self, event: &Event, zone: &ZoneDescriptor, ctx: &RuleContext) -> (f64, Vec<String>) {
        let mut score = 0.20;
        let mut triggered = Vec::new();
        let hour = event.hour_of_day();

        if !(6..22).contains(&hour) {
            score += 0.15;
            triggered.push("night_boost".to_string());
        }

        if zone.tier == ZoneTier::Entry {
            score += 0.10;
            triggered.push("entry_point".to_string());
        }

        if event.home_mode == HomeMode::Away {
            score *= 1.2;
            triggered.push("away_mode_multiplier".to_string());
        }

        if event.kind.is_critical_override() {
            score += 0.30;
            triggered.push("critical_override".to_string());
        }

        if event.confidence >= 0.9 {
            score += 0.05;
            triggered.push("high_confidence".to_string());
        }

        if zone.risk >= 0.6 {
            score += 0.05;
            triggered.push("high_risk_zone".to_string());
        }

        let mental = ctx.mental_model_adjustment.clamp(-0.10, 0.10);
        if mental.abs() > 1e-9 {
            score += mental;
            triggered.push("mental_model_adjustment".to_string());
        }

        (score.clamp(0.0, 1.0), triggered)
    }
}

/// Combines the Bayesian posterior, rule score, chain-pattern adjustment,
/// zone escalation multiplier, and temporal dampening into the final score.
#[derive(Debug, Clone, Copy)]
pub struct Combination {
    pub bayesian: f64,
    pub rules: f64,
    pub chain_adjustment: f64,
    pub zone_multiplier: f64,
    pub temporal_dampening: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CombinationResult {
    pub raw: f64,
    pub after_chain: f64,
    pub after_zone: f64,
    pub final_score: f64,
}

impl Combination {
    pub fn resolve(&self) -> CombinationResult {
        let raw = (0.55 * self.bayesian + 0.45 * self.rules).clamp(0.0, 1.0);
        let after_chain = (raw + self.chain_adjustment).clamp(0.0, 1.0);
        let after_zone = (after_chain * self.zone_multiplier).clamp(0.0, 1.0);
        let final_score = (after_zone + self.temporal_dampening).clamp(0.0, 1.0);
        CombinationResult { raw, after_chain, after_zone, final_score }
    }
}

/// Critical event kinds floor the final score and threat level regardless of
/// the combination result.
pub const CRITICAL_SCORE_FLOOR: f64 = 0.85;

pub fn apply_critical_floor(score: f64, kind: &EventKind) -> f64 {
    if kind.is_critical_override() {
        score.max(CRITICAL_SCORE_FLOOR)
    } else {
        score
    }
}

/// Temporal dampening, configured via `crate::config::TemporalConfig`.
///
/// Daytime traffic while someone is present (home or away, i.e. not asleep
/// in night mode) is dampened when the chain reads as benign. Night-hours
/// activity at a perimeter or entry zone is boosted regardless of home
/// mode — an occupant's own presence doesn't change whether a perimeter
/// event at 2am deserves more vigilance.
pub fn temporal_dampening(event: &Event, zone: &ZoneDescriptor, dampening_factor: f64, boost_factor: f64, chain: &ChainPattern) -> f64 {
    let hour = event.hour_of_day();
    let is_daytime = (9..18).contains(&hour);
    let is_present = matches!(event.home_mode, HomeMode::Home | HomeMode::Away);
    let is_benign_chain = matches!(chain.kind, ChainPatternKind::Delivery | ChainPatternKind::None);
    let is_perimeter_or_entry = matches!(zone.tier, ZoneTier::Entry | ZoneTier::Perimeter);

    if is_daytime && is_present && is_benign_chain {
        -dampening_factor
    } else if !is_daytime && is_perimeter_or_entry {
        boost_factor - 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HomeMode, Metadata};

    fn ev(kind: EventKind, hour_ts: f64, confidence: f64, home_mode: HomeMode) -> Event {
        Event {
            kind,
            timestamp: hour_ts,
            confidence,
            location: "front_door".to_string(),
            home_mode,
            metadata: Metadata::default(),
        }
    }

    #[test]
    fn sigmoid_logit_are_inverses() {
        for p in [0.01, 0.15, 0.5, 0.85, 0.99] {
            let round_trip = sigmoid(logit(p));
            assert!((round_trip - p).abs() < 1e-6);
        }
    }

    #[test]
    fn posterior_is_order_independent_same_factors() {
        let zone = ZoneDescriptor { tier: ZoneTier::Entry, risk: 0.75 };
        let event = ev(EventKind::Motion, 12 * 3600, 0.8, HomeMode::Away);
        let fuser = BayesianFuser::new();
        let p1 = fuser.posterior(&event, &zone, None);
        let p2 = fuser.posterior(&event, &zone, None);
        assert_eq!(p1, p2);
    }

    #[test]
    fn critical_kind_raises_posterior_substantially() {
        let zone = ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.35 };
        let fuser = BayesianFuser::new();
        let benign = ev(EventKind::Pet, 12 * 3600, 0.5, HomeMode::Home);
        let critical = ev(EventKind::GlassBreak, 12 * 3600, 0.9, HomeMode::Home);
        assert!(fuser.posterior(&critical, &zone, None) > fuser.posterior(&benign, &zone, None));
    }

    #[test]
    fn rule_score_triggers_night_and_entry_and_away() {
        let zone = ZoneDescriptor { tier: ZoneTier::Entry, risk: 0.75 };
        let event = ev(EventKind::Motion, 2 * 3600, 0.5, HomeMode::Away);
        let (score, triggered) = RuleScorer::new().score(&event, &zone, &RuleContext::default());
        assert!(triggered.contains(&"night_boost".to_string()));
        assert!(triggered.contains(&"entry_point".to_string()));
        assert!(triggered.contains(&"away_mode_multiplier".to_string()));
        assert!(score > 0.20);
    }

    #[test]
    fn mental_model_adjustment_is_capped() {
        let zone = ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.35 };
        let event = ev(EventKind::Motion, 12 * 3600, 0.5, HomeMode::Home);
        let ctx = RuleContext { mental_model_adjustment: 5.0 };
        let (score, triggered) = RuleScorer::new().score(&event, &zone, &ctx);
        assert!(triggered.contains(&"mental_model_adjustment".to_string()));
        assert!(score <= 1.0);
    }

    #[test]
    fn combination_formula_applies_fixed_weights() {
        let combo = Combination {
            bayesian: 0.8,
            rules: 0.4,
            chain_adjustment: 0.1,
            zone_multiplier: 1.2,
            temporal_dampening: -0.05,
        };
        let result = combo.resolve();
        let expected_raw = 0.55 * 0.8 + 0.45 * 0.4;
        assert!((result.raw - expected_raw).abs() < 1e-9);
        assert!((result.after_chain - (expected_raw + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn critical_floor_overrides_low_score() {
        assert_eq!(apply_critical_floor(0.10, &EventKind::Fire), CRITICAL_SCORE_FLOOR);
        assert_eq!(apply_critical_floor(0.95, &EventKind::Fire), 0.95);
        assert_eq!(apply_critical_floor(0.10, &EventKind::Motion), 0.10);
    }

    #[test]
    fn daytime_dampening_applies_while_away_not_just_home() {
        let zone = ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.2 };
        let event = ev(EventKind::Motion, 12 * 3600, 0.5, HomeMode::Away);
        let adjustment = temporal_dampening(&event, &zone, 0.25, 1.2, &ChainPattern::none());
        assert_eq!(adjustment, -0.25);
    }

    #[test]
    fn daytime_dampening_does_not_apply_in_night_mode() {
        let zone = ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.2 };
        let event = ev(EventKind::Motion, 12 * 3600, 0.5, HomeMode::Night);
        let adjustment = temporal_dampening(&event, &zone, 0.25, 1.2, &ChainPattern::none());
        assert_eq!(adjustment, 0.0);
    }

    #[test]
    fn night_boost_is_gated_on_perimeter_or_entry_zone() {
        let entry_zone = ZoneDescriptor { tier: ZoneTier::Entry, risk: 0.5 };
        let interior_zone = ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.5 };
        let night_event = ev(EventKind::Motion, 2 * 3600, 0.5, HomeMode::Home);

        let boosted = temporal_dampening(&night_event, &entry_zone, 0.25, 1.2, &ChainPattern::none());
        assert_eq!(boosted, 0.2);

        let not_boosted = temporal_dampening(&night_event, &interior_zone, 0.25, 1.2, &ChainPattern::none());
        assert_eq!(not_boosted, 0.0);
    }

    #[test]
    fn night_boost_applies_regardless_of_away_mode() {
        let zone = ZoneDescriptor { tier: ZoneTier::Perimeter, risk: 0.5 };
        let home_event = ev(EventKind::Motion, 2 * 3600, 0.5, HomeMode::Home);
        let away_event = ev(EventKind::Motion, 2 * 3600, 0.5, HomeMode::Away);

        let home_boost = temporal_dampening(&home_event, &zone, 0.25, 1.2, &ChainPattern::none());
        let away_boost = temporal_dampening(&away_event, &zone, 0.25, 1.2, &ChainPattern::none());
        assert_eq!(home_boost, away_boost);
        assert_eq!(home_boost, 0.2);
    }
}
