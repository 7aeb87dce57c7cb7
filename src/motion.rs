//! Motion Classifier.
//!
//! Two entry points modeled as a sum type (`MotionSource`) with a single
//! `analyze()` dispatch, avoiding a class-hierarchy split between raw-sample
//! and pre-summarized inputs.

use crate::types::{MotionActivity, MotionFeatures};
use ndarray::Array1;

/// Normalization scale for mean energy.
const ENERGY_SCALE: f64 = 4.0;

#[derive(Debug, Clone)]
pub enum MotionSource {
    Raw {
        samples: Vec<f32>,
        #[allow(dead_code)]
        sample_rate_hz: f64,
        duration_s: f64,
    },
    Summary {
        duration_s: f64,
        energy: f64,
        height: Option<f64>,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MotionClassifier;

impl MotionClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, source: &MotionSource) -> MotionFeatures {
        let (duration_s, energy, variance) = match source {
            MotionSource::Raw { samples, duration_s, .. } => {
                let (energy, variance) = Self::features_from_samples(samples);
                (*duration_s, energy, variance)
            }
            MotionSource::Summary { duration_s, energy, height } => {
                let variance = height.map(|h| h.clamp(0.0, 1.0)).unwrap_or(0.5);
                (*duration_s, energy.clamp(0.0, 1.0), variance)
            }
        };

        let (activity, confidence) = Self::decide(duration_s, energy, variance);

        MotionFeatures {
            activity,
            duration_s,
            energy,
            variance,
            confidence,
        }
    }

    /// L2-norm, mean energy (normalized by `ENERGY_SCALE`), and
    /// coefficient-of-variation from raw samples. Order-invariant: a plain
    /// sum/sum-of-squares reduction, deterministic for identical input
    /// regardless of any SIMD the `ndarray` backend applies.
    fn features_from_samples(samples: &[f32]) -> (f64, f64) {
        if samples.is_empty() {
            return (0.0, 0.5);
        }
        let arr = Array1::from_vec(samples.iter().map(|v| *v as f64).collect::<Vec<_>>());
        let n = arr.len() as f64;

        let sum_sq: f64 = arr.iter().map(|v| v * v).sum();

        let mean_energy_raw = sum_sq / n;
        let energy = (mean_energy_raw / ENERGY_SCALE).clamp(0.0, 1.0);

        let mean: f64 = arr.sum() / n;
        let variance = if mean.abs() < 1e-9 {
            0.0
        } else {
            let var: f64 = arr.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let stdev = var.sqrt();
            (stdev / mean.abs()).clamp(0.0, 1.0)
        };

        (energy, variance)
    }

    /// Public helper exposing the raw L2 norm, for callers/tests that want
    /// to double-check determinism independent of `analyze`.
    pub fn l2_norm(samples: &[f32]) -> f64 {
        let sum_sq: f64 = samples.iter().map(|v| (*v as f64) * (*v as f64)).sum();
        sum_sq.sqrt()
    }

    /// First-match activity decision table.
    fn decide(duration_s: f64, energy: f64, variance: f64) -> (MotionActivity, f64) {
        let low_var = variance < 0.4;
        let high_var = variance >= 0.6;
        let mid_var = !low_var && !high_var;

        if duration_s < 10.0 && energy < 0.4 && low_var {
            return (MotionActivity::PackageDrop, 0.88);
        }
        if duration_s < 15.0 && energy < 0.5 && high_var {
            return (MotionActivity::Pet, 0.82);
        }
        if energy > 0.7 && mid_var {
            return (MotionActivity::Running, 0.90);
        }
        if duration_s > 5.0 && energy > 0.85 && low_var {
            return (MotionActivity::Vehicle, 0.75);
        }
        if duration_s > 30.0 && (0.3..=0.6).contains(&energy) && low_var {
            return (MotionActivity::Loitering, 0.85);
        }
        if duration_s > 5.0 && (0.3..=0.7).contains(&energy) && mid_var {
            return (MotionActivity::Walking, 0.80);
        }

        (MotionActivity::Unknown, 0.40)
    }
}
