//! External configuration surface. Loaded from YAML via
//! `serde_yaml`; unknown keys are ignored rather than rejected, so
//! older/newer clients can share a file.

use serde::{Deserialize, Serialize};

/// Dampening/boost pair governing `crate::fusion::temporal_dampening`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Subtracted from the score for benign daytime, home-present traffic.
    pub dampening_factor: f64,
    /// Multiplier applied to away-mode night-hours traffic before being
    /// folded into the additive boost (`boost_factor - 1.0`).
    pub boost_factor: f64,
}

impl TemporalConfig {
    pub const DEFAULT: TemporalConfig = TemporalConfig { dampening_factor: 0.25, boost_factor: 1.2 };
    pub const AGGRESSIVE: TemporalConfig = TemporalConfig { dampening_factor: 0.10, boost_factor: 1.4 };
    pub const CONSERVATIVE: TemporalConfig = TemporalConfig { dampening_factor: 0.40, boost_factor: 1.1 };
}

impl Default for TemporalConfig {
    fn default() -> Self {
        TemporalConfig::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigPreset {
    Default,
    Aggressive,
    Conservative,
}

impl ConfigPreset {
    pub fn temporal(&self) -> TemporalConfig {
        match self {
            ConfigPreset::Default => TemporalConfig::DEFAULT,
            ConfigPreset::Aggressive => TemporalConfig::AGGRESSIVE,
            ConfigPreset::Conservative => TemporalConfig::CONSERVATIVE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub temporal: TemporalConfig,
    /// Bumped whenever `configure` replaces the active configuration;
    /// recorded verbatim in every audit entry.
    pub version: u32,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self { temporal: TemporalConfig::default(), version: 1 }
    }
}

impl SdkConfig {
    pub fn from_preset(preset: ConfigPreset) -> Self {
        Self { temporal: preset.temporal(), version: 1 }
    }

    /// Parse a YAML document, keeping the caller's current `version` unless
    /// the document sets one explicitly bumps it by one.
    pub fn merge_from_yaml(&self, yaml: &str) -> Result<Self, crate::error::CoreError> {
        let parsed: SdkConfig = serde_yaml::from_str(yaml)
            .map_err(|_| crate::error::CoreError::validation(crate::error::ValidationKind::Schema))?;
        Ok(Self { temporal: parsed.temporal, version: self.version + 1 })
    }
}
