//! Level 1 — static table-driven calculation
//!
//! Works from the equipment master data alone: base interval per equipment
//! type, modified by service and criticality, with compounded safety divisors
//! for known data-quality issues. The risk level comes from an additive
//! score over the same static factors. Confidence is deliberately low; this
//! tier exists so the engine always has an answer.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::RBIConfig;
use crate::types::{
    CalculationLevel, CriticalityLevel, EquipmentData, ExtractedRBIData, RBICalculationResult,
    RiskLevel,
};

use super::{clamp_interval, CalculationError, Calculator};

/// Interval band for Level 1 results (months).
const INTERVAL_MIN: u32 = 6;
const INTERVAL_MAX: u32 = 120;

/// Completeness below which the emergency variant takes over.
const EMERGENCY_COMPLETENESS: f64 = 0.3;

pub struct Level1Calculator;

impl Calculator for Level1Calculator {
    fn level(&self) -> CalculationLevel {
        CalculationLevel::Level1
    }

    fn calculate(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
    ) -> Result<RBICalculationResult, CalculationError> {
        Ok(Self::calculate_static(equipment, extracted, config, now, None))
    }
}

impl Level1Calculator {
    /// Static calculation with explicit data-completeness protection.
    ///
    /// Completeness below 0.3 switches to the emergency variant: interval
    /// halved and floored at the configured emergency floor, risk forced to
    /// High, confidence capped at 0.2.
    pub fn calculate_with_fallback_protection(
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
        data_completeness: f64,
    ) -> RBICalculationResult {
        if data_completeness < EMERGENCY_COMPLETENESS {
            return Self::emergency(equipment, extracted, config, now, data_completeness);
        }
        Self::calculate_static(equipment, extracted, config, now, Some(data_completeness))
    }

    fn calculate_static(
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
        data_completeness: Option<f64>,
    ) -> RBICalculationResult {
        let settings = &config.level1_settings;

        let base = settings
            .base_intervals_months
            .get(&equipment.equipment_type)
            .copied()
            .unwrap_or(settings.default_base_interval_months);
        let service_modifier = settings
            .service_modifiers
            .get(&equipment.service_type)
            .copied()
            .unwrap_or(1.0);
        let criticality_modifier = settings
            .criticality_modifiers
            .get(equipment.criticality_level.as_key())
            .copied()
            .unwrap_or(1.0);

        let mut interval = base * service_modifier * criticality_modifier;

        let issues = Self::data_quality_issues(equipment, extracted);
        if settings.apply_safety_factors && !issues.is_empty() {
            let mut compound = 1.0;
            for issue in &issues {
                compound *= settings.safety_factors.get(issue).copied().unwrap_or(1.0);
            }
            compound = compound.min(settings.max_compound_safety_factor);
            interval /= compound;
        }

        let interval = clamp_interval(interval, INTERVAL_MIN, INTERVAL_MAX);

        let age = equipment.age_years(now);
        let score = Self::risk_score(equipment, config, age);
        let risk_level = match score {
            i32::MIN..=2 => RiskLevel::Low,
            3..=4 => RiskLevel::Medium,
            5..=6 => RiskLevel::High,
            _ => RiskLevel::VeryHigh,
        };

        let pof_score = (1.0 + score.max(0) as f64 * 0.6).clamp(1.0, 5.0);
        let cof = &config.scoring_tables.cof;
        let mut cof_scores = HashMap::new();
        cof_scores.insert(
            "safety".to_string(),
            ((cof.safety_pressure.score(equipment.design_pressure)
                + cof.safety_fluid_hazard.score(&equipment.service_type))
                / 2.0)
                .clamp(1.0, 5.0),
        );
        cof_scores.insert(
            "environmental".to_string(),
            cof.environmental_fluid.score(&equipment.service_type),
        );
        cof_scores.insert(
            "economic".to_string(),
            cof.economic_downtime.score(&equipment.equipment_type),
        );

        let completeness = data_completeness.unwrap_or(1.0);
        let confidence_score = (0.5 * completeness).clamp(0.1, 0.5);
        let data_quality_score = (0.4 * completeness).clamp(0.1, 0.4);

        let mut input_parameters = HashMap::new();
        input_parameters.insert("base_interval_months".to_string(), base);
        input_parameters.insert("service_modifier".to_string(), service_modifier);
        input_parameters.insert("criticality_modifier".to_string(), criticality_modifier);
        input_parameters.insert("age_years".to_string(), age);
        input_parameters.insert("risk_score".to_string(), score as f64);

        debug!(
            equipment_id = %equipment.equipment_id,
            interval,
            risk = %risk_level,
            "Level 1 static calculation complete"
        );

        RBICalculationResult {
            equipment_id: equipment.equipment_id.clone(),
            calculation_level: CalculationLevel::Level1,
            requested_level: CalculationLevel::Level1,
            fallback_occurred: false,
            risk_level,
            pof_score,
            cof_scores,
            confidence_score,
            data_quality_score,
            calculation_date: now,
            next_inspection_date: RBICalculationResult::next_date(now, interval),
            inspection_interval_months: interval,
            missing_data: issues,
            estimated_parameters: vec!["pof_score".to_string(), "cof_scores".to_string()],
            input_parameters,
            remaining_life_years: None,
        }
    }

    /// Emergency variant for near-absent data.
    fn emergency(
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
        data_completeness: f64,
    ) -> RBICalculationResult {
        let mut result = Self::calculate_static(equipment, extracted, config, now, None);

        let floor = config.level1_settings.emergency_interval_months.max(3);
        let halved = (result.inspection_interval_months / 2).max(floor);
        result.inspection_interval_months = halved;
        result.next_inspection_date = RBICalculationResult::next_date(now, halved);
        result.risk_level = RiskLevel::High;
        result.confidence_score = (0.2 * data_completeness / EMERGENCY_COMPLETENESS).min(0.2);
        result.data_quality_score = result.data_quality_score.min(0.2);
        result.missing_data = vec!["most_required_data".to_string()];

        debug!(
            equipment_id = %equipment.equipment_id,
            interval = halved,
            completeness = data_completeness,
            "Level 1 emergency fallback applied"
        );
        result
    }

    /// Additive risk score over static factors.
    fn risk_score(equipment: &EquipmentData, config: &RBIConfig, age: f64) -> i32 {
        let settings = &config.level1_settings;
        let mut score = 2;

        if settings
            .aggressive_services
            .contains(&equipment.service_type)
        {
            score += 1;
        }
        if settings
            .high_risk_equipment_types
            .contains(&equipment.equipment_type)
        {
            score += 1;
        }
        score += match equipment.criticality_level {
            CriticalityLevel::Critical => 2,
            CriticalityLevel::High => 1,
            CriticalityLevel::Medium => 0,
            CriticalityLevel::Low => -1,
        };
        if age > 25.0 {
            score += 2;
        } else if age > 15.0 {
            score += 1;
        } else if age < 5.0 {
            score -= 1;
        }

        score
    }

    /// Known data-quality issues, keyed the way the safety-factor table is.
    fn data_quality_issues(
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
    ) -> Vec<String> {
        let mut issues = Vec::new();
        if extracted.last_inspection_date.is_none() {
            issues.push("no_inspection_history".to_string());
        }
        if extracted.thickness_measurements.is_empty() {
            issues.push("no_thickness_data".to_string());
        }
        if equipment.material.is_empty() || equipment.material == "unknown" {
            issues.push("unknown_material".to_string());
        }
        if extracted.inspection_quality == crate::types::InspectionQuality::Poor
            && extracted.last_inspection_date.is_some()
        {
            issues.push("poor_inspection_quality".to_string());
        }
        issues
    }
}

// ============================================================================
// Tests
// ============================================================================
