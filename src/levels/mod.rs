//! RBI Level Manager — data sufficiency assessment and level selection
//!
//! Decides which calculation tier the available data can support, before any
//! calculator runs. Cascading is an explicit capability assessment returning
//! a decision value, never control flow by exception: the engine consults the
//! decision once, runs the chosen calculator, and records every cascade step
//! in the result's `missing_data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::{LevelRequirements, RBIConfig};
use crate::types::{CalculationLevel, EquipmentData, ExtractedRBIData};

/// Outcome of level selection for one calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDecision {
    pub level: CalculationLevel,
    pub fallback_occurred: bool,
    /// Accumulated reasons from every level that was refused on the way down
    pub missing_requirements: Vec<String>,
}

/// Capability report for one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelCapability {
    pub level: CalculationLevel,
    pub capable: bool,
    pub quality_score: f64,
    pub quality_threshold: f64,
    pub missing_requirements: Vec<String>,
}

/// Per-level capability report for one equipment item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationSummary {
    pub equipment_id: String,
    pub levels: Vec<LevelCapability>,
    pub recommended_level: CalculationLevel,
}

/// Assesses data sufficiency per level and selects the feasible tier.
///
/// Pure over the config snapshot and inputs; holds no mutable state.
pub struct RBILevelManager {
    config: Arc<RBIConfig>,
}

impl RBILevelManager {
    pub fn new(config: Arc<RBIConfig>) -> Self {
        Self { config }
    }

    /// Assess one level's capability and data quality.
    pub fn assess(
        &self,
        level: CalculationLevel,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        now: DateTime<Utc>,
    ) -> LevelCapability {
        let requirements = self.config.level_requirements.for_level(level);
        let missing = self.missing_requirements(level, requirements, extracted, now);
        let quality = self.quality_score(level, equipment, extracted, now);

        LevelCapability {
            level,
            capable: missing.is_empty(),
            quality_score: quality,
            quality_threshold: requirements.confidence_threshold,
            missing_requirements: missing,
        }
    }

    /// Select the calculation level, cascading from the requested (or highest)
    /// tier down to Level 1, which is never refused.
    pub fn determine_calculation_level(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        requested: Option<CalculationLevel>,
        now: DateTime<Utc>,
    ) -> LevelDecision {
        let target = requested.unwrap_or(CalculationLevel::Level3);
        let mut missing_requirements = Vec::new();

        let mut candidate = Some(target);
        while let Some(level) = candidate {
            let capability = self.assess(level, equipment, extracted, now);

            if capability.capable && capability.quality_score >= capability.quality_threshold {
                debug!(
                    equipment_id = %equipment.equipment_id,
                    level = %level,
                    quality = capability.quality_score,
                    "Calculation level selected"
                );
                return LevelDecision {
                    level,
                    fallback_occurred: level != target,
                    missing_requirements,
                };
            }

            if capability.capable {
                missing_requirements.push(format!(
                    "{level} data quality insufficient ({:.2} < {:.2})",
                    capability.quality_score, capability.quality_threshold
                ));
            } else {
                missing_requirements.extend(capability.missing_requirements);
            }
            candidate = level.next_lower();
        }

        // Level 1 accepts any equipment snapshot, so the loop above always
        // returns before exhausting the cascade; this arm only covers a
        // config with an impossible Level 1 threshold.
        LevelDecision {
            level: CalculationLevel::Level1,
            fallback_occurred: target != CalculationLevel::Level1,
            missing_requirements,
        }
    }

    /// Per-level capability report plus the auto-selected recommendation.
    pub fn calculation_summary(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        now: DateTime<Utc>,
    ) -> CalculationSummary {
        let levels = CalculationLevel::descending()
            .into_iter()
            .map(|level| self.assess(level, equipment, extracted, now))
            .collect();
        let recommended = self
            .determine_calculation_level(equipment, extracted, None, now)
            .level;

        CalculationSummary {
            equipment_id: equipment.equipment_id.clone(),
            levels,
            recommended_level: recommended,
        }
    }

    fn missing_requirements(
        &self,
        level: CalculationLevel,
        requirements: &LevelRequirements,
        extracted: &ExtractedRBIData,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut missing = Vec::new();

        // Level 1 needs only the equipment snapshot, whose mandatory fields
        // are guaranteed by EquipmentData construction.
        if level == CalculationLevel::Level1 {
            return missing;
        }

        for field in &requirements.mandatory_fields {
            match field.as_str() {
                "equipment_id" | "equipment_type" | "service_type" => {}
                "last_inspection_date" => {
                    if extracted.last_inspection_date.is_none() {
                        missing.push("last_inspection_date".to_string());
                    }
                }
                "corrosion_rate" => {
                    if extracted.corrosion_rate.is_none() {
                        missing.push("corrosion_rate".to_string());
                    }
                }
                "thickness_measurements" => {
                    if extracted.thickness_count() < requirements.min_thickness_points {
                        missing.push(format!(
                            "thickness_measurements (have {}, need {})",
                            extracted.thickness_count(),
                            requirements.min_thickness_points
                        ));
                    }
                }
                "thickness_or_corrosion_rate" => {
                    if extracted.thickness_count() < requirements.min_thickness_points
                        && extracted.corrosion_rate.is_none()
                    {
                        missing.push("thickness_or_corrosion_rate".to_string());
                    }
                }
                other => missing.push(other.to_string()),
            }
        }

        if let Some(max_age) = requirements.max_inspection_age_days {
            match extracted.days_since_inspection(now) {
                Some(days) if days > max_age => missing.push(format!(
                    "inspection too old ({days} days, max {max_age})"
                )),
                Some(_) => {}
                None => {
                    // Already reported as last_inspection_date above.
                }
            }
        }

        missing
    }

    /// Data-quality score in [0,1]: weighted blend of parameter validity,
    /// damage-mechanism presence, categorical inspection quality and recency.
    fn quality_score(
        &self,
        level: CalculationLevel,
        _equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        now: DateTime<Utc>,
    ) -> f64 {
        let requirements = self.config.level_requirements.for_level(level);

        let rate_validity = match extracted.corrosion_rate {
            Some(rate) if rate <= 2.0 => 1.0,
            Some(_) => 0.5, // implausibly fast, suspect extraction
            None => 0.3,
        };
        let thickness_validity = {
            let needed = requirements.min_thickness_points.max(1) as f64;
            (extracted.thickness_count() as f64 / needed).min(1.0)
        };
        let validity = (rate_validity + thickness_validity) / 2.0;

        let mechanisms = if extracted.damage_mechanisms.is_empty() {
            0.4
        } else {
            1.0
        };

        let quality = extracted.inspection_quality.score();

        let recency = match extracted.days_since_inspection(now) {
            Some(days) => recency_decay(level, days),
            None => 0.0,
        };

        0.3 * validity + 0.15 * mechanisms + 0.25 * quality + 0.3 * recency
    }
}

/// Recency buckets; Level 3 uses tighter bands because quantitative
/// degradation modelling goes stale faster.
fn recency_decay(level: CalculationLevel, days: i64) -> f64 {
    match level {
        CalculationLevel::Level3 => match days {
            d if d <= 90 => 1.0,
            d if d <= 180 => 0.9,
            d if d <= 365 => 0.7,
            d if d <= 730 => 0.5,
            _ => 0.2,
        },
        _ => match days {
            d if d <= 180 => 1.0,
            d if d <= 365 => 0.8,
            d if d <= 730 => 0.6,
            _ => 0.3,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
