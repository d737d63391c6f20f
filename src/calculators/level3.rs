//! Level 3 — quantitative degradation modelling
//!
//! PoF is an annualized failure probability: a generic base rate scaled by
//! degradation state, a Weibull-shaped age factor, inspection effectiveness
//! and damage-mechanism acceleration. Remaining life comes from the governing
//! thickness location under a linear corrosion model.
//!
//! Eligibility is validated up front; violations are reported as missing
//! requirements for the level manager to act on, never silently degraded.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::{RBIConfig, RiskMatrixConfig};
use crate::types::{
    CalculationLevel, EquipmentData, ExtractedRBIData, InspectionQuality, RBICalculationResult,
};

use super::{clamp_interval, CalculationError, Calculator};

/// Interval band for Level 3 results (months).
const INTERVAL_MIN: u32 = 3;
const INTERVAL_MAX: u32 = 60;

/// Eligibility limits.
const MIN_THICKNESS_POINTS: usize = 3;
const MAX_INSPECTION_AGE_DAYS: i64 = 730;

/// Weibull shape/scale for the age factor. β > 1 gives the increasing
/// hazard expected of ageing static equipment; η is the characteristic life.
const WEIBULL_BETA: f64 = 2.5;
const WEIBULL_ETA_YEARS: f64 = 30.0;

/// Remaining-life cap (years) for near-zero corrosion rates.
const REMAINING_LIFE_CAP: f64 = 100.0;

pub struct Level3Calculator;

impl Calculator for Level3Calculator {
    fn level(&self) -> CalculationLevel {
        CalculationLevel::Level3
    }

    fn calculate(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
    ) -> Result<RBICalculationResult, CalculationError> {
        let missing = Self::eligibility_gaps(extracted, now);
        if !missing.is_empty() {
            return Err(CalculationError::Ineligible { missing });
        }

        // Eligibility guarantees these are present.
        let corrosion_rate = extracted
            .corrosion_rate
            .ok_or_else(|| CalculationError::Internal("corrosion_rate vanished".to_string()))?;
        let governing = extracted.governing_measurement().ok_or_else(|| {
            CalculationError::Internal("no governing measurement".to_string())
        })?;

        let age = equipment.age_years(now);
        let thickness_ratio = governing.thickness_ratio();

        // --- Probability of failure ---
        let base_rate = config
            .scoring_tables
            .pof
            .base_failure_rates
            .score(&equipment.equipment_type);
        let degradation = degradation_factor(thickness_ratio, corrosion_rate);
        let age_factor = (age.max(0.1) / WEIBULL_ETA_YEARS).powf(WEIBULL_BETA - 1.0);
        let effectiveness = match extracted.inspection_quality {
            InspectionQuality::Good => 0.8,
            InspectionQuality::Average => 1.0,
            InspectionQuality::Poor => 1.3,
        };
        let acceleration = damage_acceleration(extracted);

        let probability =
            (base_rate * degradation * age_factor * effectiveness * acceleration)
                .clamp(1.0e-6, 0.5);

        // --- Consequence, four dimensions with continuous refinement ---
        let cof = &config.scoring_tables.cof;
        let temperature_term = (equipment.design_temperature / 400.0).clamp(0.0, 1.0) * 0.5;
        let safety = ((cof.safety_pressure.score(equipment.design_pressure)
            + cof.safety_fluid_hazard.score(&equipment.service_type)
            + cof.safety_location.score(&equipment.location))
            / 3.0
            + temperature_term)
            .clamp(1.0, 5.0);

        let inventory_term = (equipment.inventory_size / 200.0).clamp(0.0, 1.0) * 0.5;
        let environmental = ((cof.environmental_fluid.score(&equipment.service_type)
            + cof.environmental_containment.score(equipment.inventory_size))
            / 2.0
            + inventory_term)
            .clamp(1.0, 5.0);

        let economic = ((cof.economic_downtime.score(&equipment.equipment_type)
            + cof.economic_production.score(equipment.criticality_level.as_key())
            + cof.economic_repair_cost.score(equipment.design_pressure))
            / 3.0)
            .clamp(1.0, 5.0);

        let business = (cof
            .business_interruption
            .score(equipment.criticality_level.as_key())
            + inventory_term)
            .clamp(1.0, 5.0);

        let mut cof_scores = HashMap::new();
        cof_scores.insert("safety".to_string(), safety);
        cof_scores.insert("environmental".to_string(), environmental);
        cof_scores.insert("economic".to_string(), economic);
        cof_scores.insert("business".to_string(), business);

        let cof_weights = &config.weighting_factors.cof_weights;
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for (dimension, score) in &cof_scores {
            let weight = cof_weights.get(dimension).copied().unwrap_or(0.0);
            weighted += weight * score;
            weight_sum += weight;
        }
        let weighted_cof = if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            cof_scores.values().sum::<f64>() / cof_scores.len() as f64
        };

        // --- Risk from probability banding through the shared matrix ---
        let pof_equivalent = probability_to_score(probability);
        let risk_level = config.risk_matrix.lookup(
            RiskMatrixConfig::bucket(pof_equivalent),
            RiskMatrixConfig::bucket(weighted_cof),
        );

        // --- Remaining life at the governing location ---
        let margin_mm = governing.thickness - governing.minimum_required;
        let remaining_life = if corrosion_rate > 1.0e-6 {
            (margin_mm / corrosion_rate).clamp(0.0, REMAINING_LIFE_CAP)
        } else {
            REMAINING_LIFE_CAP
        };

        // --- Interval: probability band, risk cap, remaining-life cap ---
        let probability_interval: f64 = if probability <= 1.0e-4 {
            60.0
        } else if probability <= 1.0e-3 {
            48.0
        } else if probability <= 1.0e-2 {
            36.0
        } else if probability <= 1.0e-1 {
            24.0
        } else {
            12.0
        };
        let risk_interval = config.risk_matrix.interval_for(risk_level) as f64;
        // Half-life rule: never schedule past half the remaining life.
        let life_cap_months = (remaining_life * 12.0 * 0.5).max(INTERVAL_MIN as f64);
        let interval = clamp_interval(
            probability_interval.min(risk_interval).min(life_cap_months),
            INTERVAL_MIN,
            INTERVAL_MAX,
        );

        // --- Confidence ---
        let recency = match extracted.days_since_inspection(now) {
            Some(d) if d <= 90 => 1.0,
            Some(d) if d <= 365 => 0.9,
            Some(_) => 0.8,
            None => 0.8,
        };
        let coverage = (extracted.thickness_count() as f64 / 6.0).clamp(0.5, 1.0);
        let confidence_score =
            (0.70 + 0.15 * recency + 0.10 * coverage).clamp(0.75, 0.95);
        let data_quality_score =
            (0.5 * recency + 0.3 * coverage + 0.2 * extracted.inspection_quality.score())
                .clamp(0.0, 1.0);

        let mut input_parameters = HashMap::new();
        input_parameters.insert("base_failure_rate".to_string(), base_rate);
        input_parameters.insert("degradation_factor".to_string(), degradation);
        input_parameters.insert("age_factor".to_string(), age_factor);
        input_parameters.insert("inspection_effectiveness".to_string(), effectiveness);
        input_parameters.insert("damage_acceleration".to_string(), acceleration);
        input_parameters.insert("thickness_ratio".to_string(), thickness_ratio);
        input_parameters.insert("corrosion_rate_mm_yr".to_string(), corrosion_rate);
        input_parameters.insert("weighted_cof".to_string(), weighted_cof);
        input_parameters.insert("failure_probability".to_string(), probability);

        debug!(
            equipment_id = %equipment.equipment_id,
            probability,
            risk = %risk_level,
            interval,
            remaining_life,
            "Level 3 quantitative calculation complete"
        );

        Ok(RBICalculationResult {
            equipment_id: equipment.equipment_id.clone(),
            calculation_level: CalculationLevel::Level3,
            requested_level: CalculationLevel::Level3,
            fallback_occurred: false,
            risk_level,
            pof_score: probability,
            cof_scores,
            confidence_score,
            data_quality_score,
            calculation_date: now,
            next_inspection_date: RBICalculationResult::next_date(now, interval),
            inspection_interval_months: interval,
            missing_data: Vec::new(),
            estimated_parameters: Vec::new(),
            input_parameters,
            remaining_life_years: Some(remaining_life),
        })
    }
}

impl Level3Calculator {
    /// Missing eligibility requirements, empty when the level can run.
    pub fn eligibility_gaps(extracted: &ExtractedRBIData, now: DateTime<Utc>) -> Vec<String> {
        let mut missing = Vec::new();
        if extracted.thickness_count() < MIN_THICKNESS_POINTS {
            missing.push(format!(
                "thickness_measurements (have {}, need {MIN_THICKNESS_POINTS})",
                extracted.thickness_count()
            ));
        }
        if extracted.corrosion_rate.is_none() {
            missing.push("corrosion_rate".to_string());
        }
        match extracted.days_since_inspection(now) {
            None => missing.push("last_inspection_date".to_string()),
            Some(days) if days > MAX_INSPECTION_AGE_DAYS => missing.push(format!(
                "inspection too old ({days} days, max {MAX_INSPECTION_AGE_DAYS})"
            )),
            Some(_) => {}
        }
        missing
    }
}

/// Degradation state multiplier from wall loss and corrosion speed. Thinner
/// walls and faster corrosion both push it up; a healthy thick wall with
/// slow corrosion sits near 1.0.
fn degradation_factor(thickness_ratio: f64, corrosion_rate: f64) -> f64 {
    let thinning = (1.5 - thickness_ratio).max(0.0);
    let rate_severity = (corrosion_rate / 0.1).min(10.0);
    (1.0 + 2.0 * thinning + 0.5 * rate_severity).clamp(1.0, 20.0)
}

/// Acceleration from the worst active damage mechanism. Environmental
/// cracking dominates general wall loss.
fn damage_acceleration(extracted: &ExtractedRBIData) -> f64 {
    let mut factor: f64 = 1.0;
    for mechanism in &extracted.damage_mechanisms {
        let m = match mechanism.as_str() {
            "scc" | "stress_corrosion_cracking" | "sulfide_stress_cracking" => 3.0,
            "fatigue" | "hydrogen_damage" | "hic" => 2.5,
            "erosion" | "erosion_corrosion" => 1.8,
            "pitting" | "localized_corrosion" => 1.5,
            "general_corrosion" | "uniform_corrosion" => 1.2,
            _ => 1.1,
        };
        factor = factor.max(m);
    }
    factor
}

/// Log-decade mapping from annual failure probability onto the 1–5 PoF
/// scale the shared risk matrix buckets.
fn probability_to_score(probability: f64) -> f64 {
    if probability <= 1.0e-4 {
        1.0
    } else if probability <= 1.0e-3 {
        2.0
    } else if probability <= 1.0e-2 {
        3.0
    } else if probability <= 1.0e-1 {
        4.0
    } else {
        5.0
    }
}

// ============================================================================
// Tests
// ============================================================================
