//! Level 2 — semi-quantitative weighted scoring
//!
//! PoF is a weighted average of five banded parameter scores; CoF is a
//! categorical table lookup per dimension. Risk comes from the configured
//! 3×3 matrix over score buckets. Missing parameters score neutral and are
//! recorded, never silently invented.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::RBIConfig;
use crate::types::{
    CalculationLevel, CoatingCondition, EquipmentData, ExtractedRBIData, RBICalculationResult,
};

use super::{clamp_interval, CalculationError, Calculator};

/// Interval band for Level 2 results (months).
const INTERVAL_MIN: u32 = 6;
const INTERVAL_MAX: u32 = 120;

/// Neutral score for a missing parameter.
const NEUTRAL_SCORE: f64 = 3.0;

pub struct Level2Calculator;

impl Calculator for Level2Calculator {
    fn level(&self) -> CalculationLevel {
        CalculationLevel::Level2
    }

    fn calculate(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
    ) -> Result<RBICalculationResult, CalculationError> {
        let mut missing_data = Vec::new();
        let mut estimated_parameters = Vec::new();
        let mut input_parameters = HashMap::new();

        let pof_tables = &config.scoring_tables.pof;
        let age = equipment.age_years(now);

        // --- PoF parameter scores (1–5 each) ---
        let corrosion_score = match extracted.corrosion_rate {
            Some(rate) => {
                input_parameters.insert("corrosion_rate_mm_yr".to_string(), rate);
                pof_tables.corrosion_rate.score(rate)
            }
            None => {
                missing_data.push("corrosion_rate".to_string());
                estimated_parameters.push("corrosion_rate".to_string());
                NEUTRAL_SCORE
            }
        };

        let age_score = pof_tables.equipment_age.score(age);
        let mechanism_score = pof_tables
            .damage_mechanism_count
            .score(extracted.damage_mechanisms.len() as f64);

        let coating_score = match extracted.coating_condition {
            Some(condition) => pof_tables.coating_quality.score(coating_key(condition)),
            None => {
                estimated_parameters.push("coating_quality".to_string());
                pof_tables.coating_quality.default_score
            }
        };

        let coverage_score = pof_tables
            .inspection_coverage
            .score(extracted.thickness_count() as f64);

        let parameter_scores = [
            ("corrosion_rate", corrosion_score),
            ("equipment_age", age_score),
            ("damage_mechanism_count", mechanism_score),
            ("coating_quality", coating_score),
            ("inspection_coverage", coverage_score),
        ];

        let weights = &config.weighting_factors.pof_weights;
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (name, score) in parameter_scores {
            let weight = weights.get(name).copied().unwrap_or(0.0);
            weighted_sum += weight * score;
            weight_sum += weight;
            input_parameters.insert(format!("pof_{name}_score"), score);
        }
        if weight_sum <= 0.0 {
            return Err(CalculationError::Internal(
                "PoF weights sum to zero".to_string(),
            ));
        }
        let pof_score = (weighted_sum / weight_sum).clamp(1.0, 5.0);

        // --- CoF per dimension (1–5 each) ---
        let cof_tables = &config.scoring_tables.cof;
        let safety = ((cof_tables.safety_pressure.score(equipment.design_pressure)
            + cof_tables.safety_fluid_hazard.score(&equipment.service_type)
            + cof_tables.safety_location.score(&equipment.location))
            / 3.0)
            .clamp(1.0, 5.0);
        let environmental = ((cof_tables.environmental_fluid.score(&equipment.service_type)
            + cof_tables
                .environmental_containment
                .score(equipment.inventory_size))
            / 2.0)
            .clamp(1.0, 5.0);
        let economic = ((cof_tables.economic_downtime.score(&equipment.equipment_type)
            + cof_tables
                .economic_production
                .score(equipment.criticality_level.as_key())
            + cof_tables
                .economic_repair_cost
                .score(equipment.design_pressure))
            / 3.0)
            .clamp(1.0, 5.0);

        let mut cof_scores = HashMap::new();
        cof_scores.insert("safety".to_string(), safety);
        cof_scores.insert("environmental".to_string(), environmental);
        cof_scores.insert("economic".to_string(), economic);

        let cof_weights = &config.weighting_factors.cof_weights;
        let mut cof_weighted = 0.0;
        let mut cof_weight_sum = 0.0;
        for (dimension, score) in &cof_scores {
            let weight = cof_weights.get(dimension).copied().unwrap_or(0.0);
            cof_weighted += weight * score;
            cof_weight_sum += weight;
        }
        let weighted_cof = if cof_weight_sum > 0.0 {
            cof_weighted / cof_weight_sum
        } else {
            cof_scores.values().sum::<f64>() / cof_scores.len() as f64
        };

        // --- Risk and interval ---
        let matrix = &config.risk_matrix;
        let risk_level = matrix.lookup(
            crate::config::RiskMatrixConfig::bucket(pof_score),
            crate::config::RiskMatrixConfig::bucket(weighted_cof),
        );
        let interval = clamp_interval(
            matrix.interval_for(risk_level) as f64,
            INTERVAL_MIN,
            INTERVAL_MAX,
        );

        // --- Confidence: completeness, recency, thickness sufficiency ---
        let present = [
            extracted.corrosion_rate.is_some(),
            !extracted.thickness_measurements.is_empty(),
            extracted.coating_condition.is_some(),
            !extracted.damage_mechanisms.is_empty(),
            extracted.last_inspection_date.is_some(),
        ];
        let completeness =
            present.iter().filter(|p| **p).count() as f64 / present.len() as f64;
        let recency = match extracted.days_since_inspection(now) {
            Some(d) if d <= 180 => 1.0,
            Some(d) if d <= 365 => 0.8,
            Some(d) if d <= 730 => 0.6,
            Some(_) => 0.3,
            None => 0.0,
        };
        let thickness_sufficiency = (extracted.thickness_count() as f64 / 3.0).min(1.0);

        let confidence_score = (0.45
            + 0.20 * completeness
            + 0.15 * recency
            + 0.10 * thickness_sufficiency)
            .clamp(0.6, 0.85);
        let data_quality_score = (0.6 * completeness + 0.4 * recency).clamp(0.0, 1.0);

        input_parameters.insert("pof_score".to_string(), pof_score);
        input_parameters.insert("weighted_cof".to_string(), weighted_cof);
        input_parameters.insert("equipment_age_years".to_string(), age);

        debug!(
            equipment_id = %equipment.equipment_id,
            pof = pof_score,
            cof = weighted_cof,
            risk = %risk_level,
            interval,
            "Level 2 semi-quantitative calculation complete"
        );

        Ok(RBICalculationResult {
            equipment_id: equipment.equipment_id.clone(),
            calculation_level: CalculationLevel::Level2,
            requested_level: CalculationLevel::Level2,
            fallback_occurred: false,
            risk_level,
            pof_score,
            cof_scores,
            confidence_score,
            data_quality_score,
            calculation_date: now,
            next_inspection_date: RBICalculationResult::next_date(now, interval),
            inspection_interval_months: interval,
            missing_data,
            estimated_parameters,
            input_parameters,
            remaining_life_years: None,
        })
    }
}

fn coating_key(condition: CoatingCondition) -> &'static str {
    match condition {
        CoatingCondition::Excellent => "excellent",
        CoatingCondition::Moderate => "moderate",
        CoatingCondition::None => "none",
    }
}

// ============================================================================
// Tests
// ============================================================================
