//! Adaptive parameter adjustment
//!
//! Detects systematic prediction bias from the tracker's completed history
//! and nudges tunable parameters in the correcting direction. Nudges are
//! multiplicative, scaled by the chosen strategy's intensity and clamped to
//! the per-parameter bounds from `LearningSettings`. Every adjustment run is
//! kept on a per-equipment history stack so it can be rolled back and its
//! effectiveness evaluated later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::LearningSettings;

use super::prediction::PredictionTracker;

/// Direction of systematic prediction error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasDirection {
    /// Not enough completed predictions to judge
    InsufficientData,
    /// Predictions run higher than observed outcomes
    OverPrediction,
    /// Predictions run lower than observed outcomes
    UnderPrediction,
    Balanced,
}

/// Bias analysis over one equipment's completed predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasAnalysis {
    pub equipment_id: String,
    pub direction: BiasDirection,
    /// Mean of (actual ordinal − predicted ordinal); positive = under-prediction
    pub mean_delta: f64,
    pub sample_count: usize,
}

/// How hard to push corrections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStrategy {
    Conservative,
    Balanced,
    Aggressive,
    /// Operator-supplied intensity multiplier
    Custom(f64),
}

impl AdjustmentStrategy {
    fn intensity(&self, settings: &LearningSettings) -> f64 {
        match self {
            AdjustmentStrategy::Conservative => settings.conservative_intensity,
            AdjustmentStrategy::Balanced => settings.balanced_intensity,
            AdjustmentStrategy::Aggressive => settings.aggressive_intensity,
            AdjustmentStrategy::Custom(intensity) => intensity.max(0.0),
        }
    }
}

/// One parameter's nudge within an adjustment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterAdjustment {
    pub parameter: String,
    pub original_value: f64,
    pub adjusted_value: f64,
    pub factor: f64,
    pub reason: String,
    pub confidence: f64,
}

/// One adjustment run for one equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub equipment_id: String,
    pub adjusted_at: DateTime<Utc>,
    pub strategy: AdjustmentStrategy,
    pub bias: BiasAnalysis,
    pub adjustments: Vec<ParameterAdjustment>,
    pub overall_confidence: f64,
    /// Expected reduction in mean ordinal error if the bias estimate holds
    pub estimated_improvement: f64,
}

/// Post-hoc comparison of prediction accuracy before and after adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivenessReport {
    pub equipment_id: String,
    pub mean_abs_error_before: f64,
    pub mean_abs_error_after: f64,
    pub improved: bool,
    pub samples_before: usize,
    pub samples_after: usize,
}

/// Bias-corrected parameter tuner with rollback-capable history.
pub struct AdaptiveParameterAdjuster {
    tracker: Arc<PredictionTracker>,
    history: Mutex<HashMap<String, Vec<AdjustmentResult>>>,
}

impl AdaptiveParameterAdjuster {
    pub fn new(tracker: Arc<PredictionTracker>) -> Self {
        Self {
            tracker,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Classify the systematic bias for one equipment. Needs at least the
    /// configured number of completed predictions.
    pub fn analyze_prediction_bias(
        &self,
        equipment_id: &str,
        settings: &LearningSettings,
    ) -> BiasAnalysis {
        let completed = self.tracker.completed_history(equipment_id);
        if completed.len() < settings.min_predictions_for_bias {
            return BiasAnalysis {
                equipment_id: equipment_id.to_string(),
                direction: BiasDirection::InsufficientData,
                mean_delta: 0.0,
                sample_count: completed.len(),
            };
        }

        let deltas: Vec<f64> = completed
            .iter()
            .filter_map(|record| {
                record.actual.as_ref().map(|actual| {
                    actual.actual_risk_level.ordinal() as f64
                        - record.predicted_risk_level.ordinal() as f64
                })
            })
            .collect();
        let mean_delta = deltas.iter().sum::<f64>() / deltas.len() as f64;

        let direction = if mean_delta <= -settings.bias_threshold {
            BiasDirection::OverPrediction
        } else if mean_delta >= settings.bias_threshold {
            BiasDirection::UnderPrediction
        } else {
            BiasDirection::Balanced
        };

        debug!(
            equipment_id,
            mean_delta,
            samples = deltas.len(),
            ?direction,
            "Prediction bias analyzed"
        );

        BiasAnalysis {
            equipment_id: equipment_id.to_string(),
            direction,
            mean_delta,
            sample_count: deltas.len(),
        }
    }

    /// Nudge tunable parameters against the detected bias. Balanced or
    /// insufficient history produces an empty adjustment list.
    pub fn adjust_parameters(
        &self,
        equipment_id: &str,
        current_parameters: &HashMap<String, f64>,
        strategy: AdjustmentStrategy,
        settings: &LearningSettings,
    ) -> AdjustmentResult {
        let bias = self.analyze_prediction_bias(equipment_id, settings);
        let now = Utc::now();

        let skip = matches!(
            bias.direction,
            BiasDirection::Balanced | BiasDirection::InsufficientData
        );
        if skip {
            return AdjustmentResult {
                equipment_id: equipment_id.to_string(),
                adjusted_at: now,
                strategy,
                bias,
                adjustments: Vec::new(),
                overall_confidence: 0.0,
                estimated_improvement: 0.0,
            };
        }

        // Under-prediction means the engine is too optimistic: push risk
        // parameters up. Over-prediction pushes them down.
        let direction_sign = match bias.direction {
            BiasDirection::UnderPrediction => 1.0,
            BiasDirection::OverPrediction => -1.0,
            _ => 0.0,
        };
        let intensity = strategy.intensity(settings);
        let magnitude = settings.base_adjustment_step * intensity * bias.mean_delta.abs();
        let factor = 1.0 + direction_sign * magnitude;

        // Confidence grows with sample count, saturating at ~12 samples.
        let sample_confidence = (bias.sample_count as f64 / 12.0).min(1.0);
        let overall_confidence = (0.4 + 0.5 * sample_confidence).min(0.9);

        let mut adjustments = Vec::new();
        for (parameter, value) in current_parameters {
            let Some(bounds) = settings.parameter_bounds.get(parameter) else {
                continue; // not a tunable parameter
            };
            let adjusted = (value * factor).clamp(bounds.min, bounds.max);
            if (adjusted - value).abs() < f64::EPSILON {
                continue;
            }
            adjustments.push(ParameterAdjustment {
                parameter: parameter.clone(),
                original_value: *value,
                adjusted_value: adjusted,
                factor,
                reason: format!(
                    "{:?} bias (mean delta {:+.2}) over {} predictions",
                    bias.direction, bias.mean_delta, bias.sample_count
                ),
                confidence: overall_confidence,
            });
        }

        let estimated_improvement =
            (bias.mean_delta.abs() * magnitude.min(1.0)).min(bias.mean_delta.abs());

        let result = AdjustmentResult {
            equipment_id: equipment_id.to_string(),
            adjusted_at: now,
            strategy,
            bias,
            adjustments,
            overall_confidence,
            estimated_improvement,
        };

        if !result.adjustments.is_empty() {
            info!(
                equipment_id,
                count = result.adjustments.len(),
                factor,
                "Parameters adjusted against prediction bias"
            );
            if let Ok(mut history) = self.history.lock() {
                history
                    .entry(equipment_id.to_string())
                    .or_default()
                    .push(result.clone());
            }
        }

        result
    }

    /// Undo the most recent `count` adjustment runs, newest first. Returns
    /// the rolled-back runs.
    pub fn rollback_adjustments(&self, equipment_id: &str, count: usize) -> Vec<AdjustmentResult> {
        let Ok(mut history) = self.history.lock() else {
            return Vec::new();
        };
        let Some(stack) = history.get_mut(equipment_id) else {
            return Vec::new();
        };
        let take = count.min(stack.len());
        let rolled: Vec<AdjustmentResult> =
            stack.drain(stack.len() - take..).rev().collect();
        if !rolled.is_empty() {
            info!(equipment_id, count = rolled.len(), "Adjustments rolled back");
        }
        rolled
    }

    /// Undo every adjustment run for the equipment.
    pub fn rollback_to_baseline(&self, equipment_id: &str) -> Vec<AdjustmentResult> {
        self.rollback_adjustments(equipment_id, usize::MAX)
    }

    /// Recover parameter values as they were before the given runs, applied
    /// to the supplied current values.
    pub fn revert_values(
        current: &HashMap<String, f64>,
        rolled_back: &[AdjustmentResult],
    ) -> HashMap<String, f64> {
        let mut values = current.clone();
        for run in rolled_back {
            for adjustment in &run.adjustments {
                values.insert(adjustment.parameter.clone(), adjustment.original_value);
            }
        }
        values
    }

    /// Adjustment runs recorded for one equipment, oldest first.
    pub fn adjustment_history(&self, equipment_id: &str) -> Vec<AdjustmentResult> {
        self.history
            .lock()
            .map(|h| h.get(equipment_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Compare mean absolute ordinal error before and after the first
    /// adjustment run. None until there are completed predictions on both
    /// sides of it.
    pub fn evaluate_adjustment_effectiveness(
        &self,
        equipment_id: &str,
    ) -> Option<EffectivenessReport> {
        let first_adjustment = self
            .adjustment_history(equipment_id)
            .first()
            .map(|run| run.adjusted_at)?;

        let completed = self.tracker.completed_history(equipment_id);
        let (before, after): (Vec<_>, Vec<_>) = completed
            .iter()
            .partition(|record| record.prediction_date < first_adjustment);

        let error_of = |records: &[&super::prediction::PredictionRecord]| -> Option<f64> {
            if records.is_empty() {
                return None;
            }
            let sum: f64 = records
                .iter()
                .filter_map(|record| {
                    record.actual.as_ref().map(|actual| {
                        (actual.actual_risk_level.ordinal() as f64
                            - record.predicted_risk_level.ordinal() as f64)
                            .abs()
                    })
                })
                .sum();
            Some(sum / records.len() as f64)
        };

        let before_refs: Vec<_> = before.iter().copied().collect();
        let after_refs: Vec<_> = after.iter().copied().collect();
        let mean_before = error_of(&before_refs)?;
        let mean_after = error_of(&after_refs)?;

        Some(EffectivenessReport {
            equipment_id: equipment_id.to_string(),
            mean_abs_error_before: mean_before,
            mean_abs_error_after: mean_after,
            improved: mean_after < mean_before,
            samples_before: before.len(),
            samples_after: after.len(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RBIConfig;
    use crate::learning::prediction::ActualOutcome;
    use crate::types::{CalculationLevel, RBICalculationResult, RiskLevel};

    fn settings() -> LearningSettings {
        RBIConfig::default().learning_settings
    }

    fn result(equipment_id: &str, risk: RiskLevel) -> RBICalculationResult {
        let now = Utc::now();
        RBICalculationResult {
            equipment_id: equipment_id.to_string(),
            calculation_level: CalculationLevel::Level2,
            requested_level: CalculationLevel::Level2,
            fallback_occurred: false,
            risk_level: risk,
            pof_score: 3.0,
            cof_scores: HashMap::new(),
            confidence_score: 0.7,
            data_quality_score: 0.6,
            calculation_date: now,
            next_inspection_date: RBICalculationResult::next_date(now, 24),
            inspection_interval_months: 24,
            missing_data: Vec::new(),
            estimated_parameters: Vec::new(),
            input_parameters: HashMap::new(),
            remaining_life_years: None,
        }
    }

    fn seed(
        tracker: &PredictionTracker,
        equipment_id: &str,
        pairs: &[(RiskLevel, RiskLevel)],
    ) {
        for (predicted, actual) in pairs {
            let id = tracker.record_prediction(&result(equipment_id, *predicted));
            tracker.record_actual_outcome(
                equipment_id,
                id,
                ActualOutcome {
                    actual_risk_level: *actual,
                    observed_date: Utc::now(),
                    notes: None,
                },
            );
        }
    }

    fn parameters() -> HashMap<String, f64> {
        let mut p = HashMap::new();
        p.insert("corrosion_rate_factor".to_string(), 1.0);
        p.insert("age_factor".to_string(), 1.0);
        p.insert("untracked_parameter".to_string(), 7.0);
        p
    }

    #[test]
    fn two_records_are_insufficient_and_adjustment_is_empty() {
        let tracker = Arc::new(PredictionTracker::new());
        seed(
            &tracker,
            "V-1",
            &[
                (RiskLevel::Medium, RiskLevel::High),
                (RiskLevel::Medium, RiskLevel::High),
            ],
        );
        let adjuster = AdaptiveParameterAdjuster::new(tracker);

        let bias = adjuster.analyze_prediction_bias("V-1", &settings());
        assert_eq!(bias.direction, BiasDirection::InsufficientData);

        let run = adjuster.adjust_parameters(
            "V-1",
            &parameters(),
            AdjustmentStrategy::Balanced,
            &settings(),
        );
        assert!(run.adjustments.is_empty());
    }

    #[test]
    fn consistent_under_prediction_detected_and_pushed_up() {
        let tracker = Arc::new(PredictionTracker::new());
        seed(
            &tracker,
            "V-1",
            &[
                (RiskLevel::Low, RiskLevel::High),
                (RiskLevel::Medium, RiskLevel::High),
                (RiskLevel::Medium, RiskLevel::VeryHigh),
            ],
        );
        let adjuster = AdaptiveParameterAdjuster::new(tracker);

        let bias = adjuster.analyze_prediction_bias("V-1", &settings());
        assert_eq!(bias.direction, BiasDirection::UnderPrediction);
        assert!(bias.mean_delta > 0.0);

        let run = adjuster.adjust_parameters(
            "V-1",
            &parameters(),
            AdjustmentStrategy::Balanced,
            &settings(),
        );
        assert!(!run.adjustments.is_empty());
        for adjustment in &run.adjustments {
            assert!(adjustment.adjusted_value > adjustment.original_value);
        }
        // Unbounded parameters are never touched.
        assert!(run
            .adjustments
            .iter()
            .all(|a| a.parameter != "untracked_parameter"));
    }

    #[test]
    fn over_prediction_pushes_down_and_respects_bounds() {
        let tracker = Arc::new(PredictionTracker::new());
        seed(
            &tracker,
            "V-1",
            &[
                (RiskLevel::VeryHigh, RiskLevel::Low),
                (RiskLevel::VeryHigh, RiskLevel::Medium),
                (RiskLevel::High, RiskLevel::Low),
            ],
        );
        let adjuster = AdaptiveParameterAdjuster::new(tracker);
        let run = adjuster.adjust_parameters(
            "V-1",
            &parameters(),
            AdjustmentStrategy::Aggressive,
            &settings(),
        );
        let s = settings();
        for adjustment in &run.adjustments {
            assert!(adjustment.adjusted_value < adjustment.original_value);
            let bounds = &s.parameter_bounds[&adjustment.parameter];
            assert!(adjustment.adjusted_value >= bounds.min);
        }
    }

    #[test]
    fn aggressive_strategy_moves_more_than_conservative() {
        let tracker = Arc::new(PredictionTracker::new());
        seed(
            &tracker,
            "V-1",
            &[
                (RiskLevel::Low, RiskLevel::High),
                (RiskLevel::Low, RiskLevel::High),
                (RiskLevel::Low, RiskLevel::High),
            ],
        );
        let adjuster = AdaptiveParameterAdjuster::new(tracker);
        let conservative = adjuster.adjust_parameters(
            "V-1",
            &parameters(),
            AdjustmentStrategy::Conservative,
            &settings(),
        );
        let aggressive = adjuster.adjust_parameters(
            "V-1",
            &parameters(),
            AdjustmentStrategy::Aggressive,
            &settings(),
        );
        let delta = |run: &AdjustmentResult| {
            run.adjustments
                .iter()
                .map(|a| (a.adjusted_value - a.original_value).abs())
                .fold(0.0, f64::max)
        };
        assert!(delta(&aggressive) > delta(&conservative));
    }

    #[test]
    fn rollback_restores_original_values() {
        let tracker = Arc::new(PredictionTracker::new());
        seed(
            &tracker,
            "V-1",
            &[
                (RiskLevel::Low, RiskLevel::High),
                (RiskLevel::Low, RiskLevel::High),
                (RiskLevel::Low, RiskLevel::VeryHigh),
            ],
        );
        let adjuster = AdaptiveParameterAdjuster::new(tracker);
        let params = parameters();
        let run = adjuster.adjust_parameters(
            "V-1",
            &params,
            AdjustmentStrategy::Balanced,
            &settings(),
        );
        assert!(!run.adjustments.is_empty());

        let mut adjusted = params.clone();
        for adjustment in &run.adjustments {
            adjusted.insert(adjustment.parameter.clone(), adjustment.adjusted_value);
        }

        let rolled = adjuster.rollback_to_baseline("V-1");
        assert_eq!(rolled.len(), 1);
        let restored = AdaptiveParameterAdjuster::revert_values(&adjusted, &rolled);
        for (parameter, value) in &params {
            assert!((restored[parameter] - value).abs() < 1e-12);
        }
        assert!(adjuster.adjustment_history("V-1").is_empty());
    }
}
