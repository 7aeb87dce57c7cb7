//! Zone Classifier.

use crate::types::ZoneDescriptor;
use crate::types::ZoneTier;

struct ZoneEntry {
    label: &'static str,
    tier: ZoneTier,
    risk: f64,
}

const ZONE_TABLE: &[ZoneEntry] = &[
    ZoneEntry { label: "front_door", tier: ZoneTier::Entry, risk: 0.75 },
    ZoneEntry { label: "back_door", tier: ZoneTier::Entry, risk: 0.72 },
    ZoneEntry { label: "side_door", tier: ZoneTier::Entry, risk: 0.70 },
    ZoneEntry { label: "backyard", tier: ZoneTier::Perimeter, risk: 0.65 },
    ZoneEntry { label: "side_yard", tier: ZoneTier::Perimeter, risk: 0.62 },
    ZoneEntry { label: "driveway", tier: ZoneTier::Perimeter, risk: 0.60 },
    ZoneEntry { label: "living_room", tier: ZoneTier::Interior, risk: 0.35 },
    ZoneEntry { label: "bedroom", tier: ZoneTier::Interior, risk: 0.38 },
    ZoneEntry { label: "hallway", tier: ZoneTier::Interior, risk: 0.30 },
    ZoneEntry { label: "kitchen", tier: ZoneTier::Interior, risk: 0.32 },
    ZoneEntry { label: "street", tier: ZoneTier::Public, risk: 0.30 },
    ZoneEntry { label: "sidewalk", tier: ZoneTier::Public, risk: 0.30 },
];

const DEFAULT_DESCRIPTOR: ZoneDescriptor = ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.35 };

/// Classifies free-text location labels into a tier + base risk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZoneClassifier;

impl ZoneClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Case-insensitive exact match against the static table, then a
    /// substring match against tier keywords, then the interior/0.35 default.
    pub fn classify(&self, label: &str) -> ZoneDescriptor {
        let lower = label.to_lowercase();

        if let Some(entry) = ZONE_TABLE.iter().find(|e| e.label == lower) {
            return ZoneDescriptor { tier: entry.tier, risk: entry.risk };
        }

        if lower.contains("door") {
            return ZoneDescriptor { tier: ZoneTier::Entry, risk: 0.70 };
        }
        if lower.contains("yard") || lower.contains("garden") {
            return ZoneDescriptor { tier: ZoneTier::Perimeter, risk: 0.60 };
        }
        if lower.contains("room") || lower.contains("hall") || lower.contains("kitchen") {
            return ZoneDescriptor { tier: ZoneTier::Interior, risk: 0.35 };
        }

        DEFAULT_DESCRIPTOR
    }

    /// Inspects an ordered sequence of (zone label, tier, timestamp) triples
    /// over the recent chain window and returns an escalation multiplier.
    /// First matching rule wins.
    pub fn escalation(&self, sequence: &[(&str, ZoneTier, f64)]) -> f64 {
        if sequence.len() >= 2 {
            for window in sequence.windows(2) {
                let (_, prev_tier, _) = window[0];
                let (_, cur_tier, _) = window[1];
                if prev_tier == ZoneTier::Entry && cur_tier == ZoneTier::Interior {
                    return 2.0;
                }
            }
            for window in sequence.windows(2) {
                let (_, prev_tier, _) = window[0];
                let (_, cur_tier, _) = window[1];
                if prev_tier == ZoneTier::Perimeter && cur_tier == ZoneTier::Entry {
                    return 1.8;
                }
            }
        }

        Self::surveillance_multiplier(sequence)
    }

    fn surveillance_multiplier(sequence: &[(&str, ZoneTier, f64)]) -> f64 {
        if sequence.is_empty() {
            return 1.0;
        }
        let newest_ts = sequence.iter().map(|(_, _, ts)| *ts).fold(f64::MIN, f64::max);
        let mut distinct_perimeter_zones: Vec<&str> = Vec::new();
        for (label, tier, ts) in sequence {
            if *tier == ZoneTier::Perimeter && newest_ts - ts <= 60.0 && !distinct_perimeter_zones.contains(label) {
                distinct_perimeter_zones.push(label);
            }
        }
        if distinct_perimeter_zones.len() >= 3 {
            1.4
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_case_insensitive() {
        let z = ZoneClassifier::new();
        let d = z.classify("FRONT_DOOR");
        assert_eq!(d.tier, ZoneTier::Entry);
    }

    #[test]
    fn substring_fallback_for_door() {
        let z = ZoneClassifier::new();
        let d = z.classify("garage_door");
        assert_eq!(d.tier, ZoneTier::Entry);
    }

    #[test]
    fn unrecognized_defaults_to_interior() {
        let z = ZoneClassifier::new();
        let d = z.classify("basement_vault");
        assert_eq!(d.tier, ZoneTier::Interior);
        assert_eq!(d.risk, 0.35);
    }

    #[test]
    fn entry_to_interior_is_breach() {
        let z = ZoneClassifier::new();
        let seq = vec![("front_door", ZoneTier::Entry, 0.0), ("hallway", ZoneTier::Interior, 5.0)];
        assert_eq!(z.escalation(&seq), 2.0);
    }

    #[test]
    fn perimeter_to_entry_is_approach() {
        let z = ZoneClassifier::new();
        let seq = vec![("backyard", ZoneTier::Perimeter, 0.0), ("back_door", ZoneTier::Entry, 5.0)];
        assert_eq!(z.escalation(&seq), 1.8);
    }

    #[test]
    fn three_distinct_perimeter_zones_is_surveillance() {
        let z = ZoneClassifier::new();
        let seq = vec![
            ("backyard", ZoneTier::Perimeter, 0.0),
            ("side_yard", ZoneTier::Perimeter, 20.0),
            ("driveway", ZoneTier::Perimeter, 40.0),
        ];
        assert_eq!(z.escalation(&seq), 1.4);
    }

    #[test]
    fn repeated_visits_to_one_perimeter_zone_are_not_surveillance() {
        let z = ZoneClassifier::new();
        let seq = vec![
            ("backyard", ZoneTier::Perimeter, 0.0),
            ("backyard", ZoneTier::Perimeter, 20.0),
            ("backyard", ZoneTier::Perimeter, 40.0),
        ];
        assert_eq!(z.escalation(&seq), 1.0);
    }

    #[test]
    fn no_pattern_is_neutral() {
        let z = ZoneClassifier::new();
        let seq = vec![("hallway", ZoneTier::Interior, 0.0)];
        assert_eq!(z.escalation(&seq), 1.0);
    }
}
