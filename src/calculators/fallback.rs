//! Fallback conservatism
//!
//! When the level manager cascaded below the requested tier, the result is
//! made deliberately conservative: the interval shrinks and the confidence
//! drops, scaled by how many mandatory fields were missing and how stale the
//! data is. The multipliers live in `FallbackSettings` so conservatism is an
//! operator decision, not a code change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::RBIConfig;
use crate::levels::LevelDecision;
use crate::types::{ExtractedRBIData, RBICalculationResult};

/// Conservative adjustment derived from a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackAdjustment {
    /// Interval multiplier in (0,1]
    pub interval_factor: f64,
    /// Amount subtracted from the confidence score, [0,1)
    pub confidence_reduction: f64,
    pub reasons: Vec<String>,
}

/// Computes and applies conservatism after a level cascade.
pub struct FallbackManager {
    config: Arc<RBIConfig>,
}

impl FallbackManager {
    pub fn new(config: Arc<RBIConfig>) -> Self {
        Self { config }
    }

    /// Derive the adjustment from the cascade record. More missing fields and
    /// older data compound into a smaller interval factor, capped by
    /// `max_total_penalty`.
    pub fn adjustment_for(
        &self,
        decision: &LevelDecision,
        extracted: &ExtractedRBIData,
        now: DateTime<Utc>,
    ) -> FallbackAdjustment {
        let settings = &self.config.fallback_settings;
        let missing_count = decision.missing_requirements.len() as u32;

        let mut penalty = settings
            .missing_field_penalty
            .powi(missing_count.min(5) as i32);

        let stale = match extracted.days_since_inspection(now) {
            Some(days) => days > 730,
            None => true,
        };
        if stale {
            penalty *= settings.stale_data_penalty;
        }
        penalty = penalty.clamp(1.0, settings.max_total_penalty);

        let confidence_reduction = (settings.confidence_reduction_per_field
            * missing_count as f64)
            .min(settings.max_confidence_reduction);

        let mut reasons = decision.missing_requirements.clone();
        if stale {
            reasons.push("stale_inspection_data".to_string());
        }

        FallbackAdjustment {
            interval_factor: 1.0 / penalty,
            confidence_reduction,
            reasons,
        }
    }

    /// Apply an adjustment in place. The interval keeps a 3-month floor so
    /// the schedule stays actionable.
    pub fn apply(
        &self,
        result: &mut RBICalculationResult,
        adjustment: &FallbackAdjustment,
        now: DateTime<Utc>,
    ) {
        let adjusted = ((result.inspection_interval_months as f64)
            * adjustment.interval_factor)
            .round()
            .max(3.0) as u32;

        debug!(
            equipment_id = %result.equipment_id,
            from = result.inspection_interval_months,
            to = adjusted,
            factor = adjustment.interval_factor,
            "Fallback conservatism applied"
        );

        result.inspection_interval_months = adjusted;
        result.next_inspection_date = RBICalculationResult::next_date(now, adjusted);
        result.confidence_score =
            (result.confidence_score - adjustment.confidence_reduction).max(0.05);
        for reason in &adjustment.reasons {
            if !result.missing_data.contains(reason) {
                result.missing_data.push(reason.clone());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{Calculator, Level1Calculator};
    use crate::types::{CalculationLevel, CriticalityLevel, EquipmentData};
    use chrono::Duration;

    fn decision(missing: &[&str]) -> LevelDecision {
        LevelDecision {
            level: CalculationLevel::Level1,
            fallback_occurred: true,
            missing_requirements: missing.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn more_missing_fields_give_smaller_factor() {
        let manager = FallbackManager::new(Arc::new(RBIConfig::default()));
        let now = Utc::now();
        let data = ExtractedRBIData::empty("V-1");

        let one = manager.adjustment_for(&decision(&["corrosion_rate"]), &data, now);
        let three = manager.adjustment_for(
            &decision(&["corrosion_rate", "thickness", "last_inspection_date"]),
            &data,
            now,
        );
        assert!(three.interval_factor <= one.interval_factor);
        assert!(three.confidence_reduction >= one.confidence_reduction);
        assert!(one.interval_factor < 1.0);
    }

    #[test]
    fn factor_never_exceeds_configured_cap() {
        let config = RBIConfig::default();
        let cap = config.fallback_settings.max_total_penalty;
        let manager = FallbackManager::new(Arc::new(config));
        let many: Vec<&str> = vec!["a", "b", "c", "d", "e", "f", "g"];
        let adjustment = manager.adjustment_for(
            &decision(&many),
            &ExtractedRBIData::empty("V-1"),
            Utc::now(),
        );
        assert!(adjustment.interval_factor >= 1.0 / cap - 1e-9);
    }

    #[test]
    fn apply_shrinks_interval_and_confidence() {
        let now = Utc::now();
        let config = Arc::new(RBIConfig::default());
        let equipment = EquipmentData::new(
            "V-1",
            "pressure_vessel",
            "sour_gas",
            now - Duration::days(10 * 365),
            25.0,
            150.0,
            "carbon_steel",
            CriticalityLevel::Medium,
            "process_area",
            5.0,
        )
        .unwrap();
        let data = ExtractedRBIData::empty("V-1");
        let mut result = Level1Calculator
            .calculate(&equipment, &data, &config, now)
            .unwrap();
        let before_interval = result.inspection_interval_months;
        let before_confidence = result.confidence_score;

        let manager = FallbackManager::new(config);
        let adjustment = manager.adjustment_for(&decision(&["corrosion_rate"]), &data, now);
        manager.apply(&mut result, &adjustment, now);

        assert!(result.inspection_interval_months <= before_interval);
        assert!(result.confidence_score < before_confidence);
        assert!(result.inspection_interval_months >= 3);
    }
}
