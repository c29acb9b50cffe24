//! Collision classification over decoded sample pairs.
//!
//! Two predictors are available behind one `predict` contract:
//!
//! - [`ThresholdRule`] — deterministic comparison against fixed acceleration
//!   and gyroscope thresholds. Pure, total, never fails.
//! - [`LearnedModel`] — a trained numeric model behind an inference session.
//!
//! The variant is selected once at construction: if the model cannot be
//! loaded, the classifier permanently downgrades to the threshold rule for
//! its entire lifetime, with no retry. When the model variant is active, a
//! per-call inference failure falls back to the threshold rule transparently;
//! the caller can only tell which path served the request via the result's
//! [`PredictionSource`] tag.

use crate::model::LearnedModel;
use std::path::Path;
use tracing::{debug, warn};

/// Acceleration threshold in m/s² for the rule-based predictor.
pub const ACCEL_THRESHOLD: f32 = 20.0;
/// Gyroscope threshold in rad/s for the rule-based predictor.
pub const GYRO_THRESHOLD: f32 = 5.0;
/// Canonical probability cutoff above which a sample is judged a likely
/// accident. All callers use this constant.
pub const ALERT_PROBABILITY: f32 = 0.7;

/// Probability reported by the threshold rule when either threshold is
/// exceeded.
const HIGH_RISK: f32 = 0.8;
/// Probability reported by the threshold rule otherwise.
const LOW_RISK: f32 = 0.1;

/// Which predictor produced a classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionSource {
    /// The learned model's inference session.
    Model,
    /// The deterministic threshold rule.
    Threshold,
}

/// Outcome of classifying one sample pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    /// Collision probability in `[0, 1]`.
    pub probability: f32,
    /// Predictor that served this request.
    pub source: PredictionSource,
}

impl Classification {
    /// Whether this result crosses the canonical alert cutoff.
    pub fn is_alert(&self) -> bool {
        self.probability >= ALERT_PROBABILITY
    }
}

/// Deterministic threshold predictor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdRule {
    /// Acceleration cutoff in m/s².
    pub accel_threshold: f32,
    /// Gyroscope cutoff in rad/s.
    pub gyro_threshold: f32,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self {
            accel_threshold: ACCEL_THRESHOLD,
            gyro_threshold: GYRO_THRESHOLD,
        }
    }
}

impl ThresholdRule {
    /// Create a rule with custom cutoffs.
    pub fn new(accel_threshold: f32, gyro_threshold: f32) -> Self {
        Self {
            accel_threshold,
            gyro_threshold,
        }
    }

    /// Classify one sample pair. Pure and total.
    pub fn predict(&self, accel: f32, gyro: f32) -> f32 {
        if accel > self.accel_threshold || gyro > self.gyro_threshold {
            HIGH_RISK
        } else {
            LOW_RISK
        }
    }
}

/// Classifier over a sample pair, fixed to one predictor variant at
/// construction.
#[derive(Debug)]
pub enum Classifier {
    /// Learned model with the threshold rule as per-call fallback.
    Model {
        /// The loaded inference session.
        model: LearnedModel,
        /// Fallback rule used when an individual inference call fails.
        fallback: ThresholdRule,
    },
    /// Threshold rule only (model unavailable or not configured).
    Threshold(ThresholdRule),
}

impl Classifier {
    /// Build a classifier, attempting to load the learned model when a path
    /// is configured. Any load failure downgrades to the threshold rule for
    /// the lifetime of the classifier.
    pub fn new(model_path: Option<&Path>, rule: ThresholdRule) -> Self {
        let Some(path) = model_path else {
            debug!("No collision model configured; using threshold detection");
            return Classifier::Threshold(rule);
        };

        match LearnedModel::load(path) {
            Ok(model) => Classifier::Model {
                model,
                fallback: rule,
            },
            Err(err) => {
                warn!(
                    error = %err,
                    accel_threshold = rule.accel_threshold,
                    gyro_threshold = rule.gyro_threshold,
                    "Collision model unavailable; falling back to threshold detection"
                );
                Classifier::Threshold(rule)
            }
        }
    }

    /// Build a classifier that only ever runs the threshold rule.
    pub fn threshold_only(rule: ThresholdRule) -> Self {
        Classifier::Threshold(rule)
    }

    /// Whether the learned model is loaded and serving predictions.
    pub fn is_model_active(&self) -> bool {
        matches!(self, Classifier::Model { .. })
    }

    /// Classify one sample pair.
    ///
    /// Same inputs against the same model state produce the same output. An
    /// inference failure on the model variant is logged and served by the
    /// fallback rule instead; it never propagates to the caller.
    pub fn predict(&self, accel: f32, gyro: f32) -> Classification {
        match self {
            Classifier::Model { model, fallback } => match model.predict(accel, gyro) {
                Ok(probability) => Classification {
                    probability,
                    source: PredictionSource::Model,
                },
                Err(err) => {
                    warn!(error = %err, "Inference failed; serving threshold prediction");
                    Classification {
                        probability: fallback.predict(accel, gyro),
                        source: PredictionSource::Threshold,
                    }
                }
            },
            Classifier::Threshold(rule) => Classification {
                probability: rule.predict(accel, gyro),
                source: PredictionSource::Threshold,
            },
        }
    }

}
