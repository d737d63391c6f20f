//! Config validation: per-category checks with human-readable messages.
//!
//! Each category validates independently and returns a list of messages;
//! `validate_complete_configuration` collects them per category so a config
//! update can be rejected with every problem named at once rather than one
//! failure per round trip.

use std::collections::BTreeMap;

use super::{
    BandTable, FallbackSettings, LearningSettings, Level1Settings, LevelRequirementsConfig,
    RBIConfig, RiskMatrixConfig, ScoringTablesConfig, WeightingFactors,
};

/// Tolerance for weight sums around 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

fn check_band_scores(errors: &mut Vec<String>, name: &str, table: &BandTable) {
    // Without bands every input scores `above`, so an empty table is never
    // a usable calibration.
    if table.bands.is_empty() {
        errors.push(format!("{name}: bands must not be empty"));
    }
    for band in &table.bands {
        if !(1.0..=5.0).contains(&band.score) {
            errors.push(format!(
                "{name}: band score {} is outside 1-5",
                band.score
            ));
        }
    }
    if !(1.0..=5.0).contains(&table.above) {
        errors.push(format!(
            "{name}: above-band score {} is outside 1-5",
            table.above
        ));
    }
    let mut prev = f64::NEG_INFINITY;
    for band in &table.bands {
        if band.upper <= prev {
            errors.push(format!(
                "{name}: band upper bounds must be strictly increasing"
            ));
            break;
        }
        prev = band.upper;
    }
}

/// Scoring tables: every banded and categorical score must sit in 1–5 and
/// band bounds must ascend. Base failure rates must be positive
/// probabilities.
pub fn validate_scoring_tables(tables: &ScoringTablesConfig) -> Vec<String> {
    let mut errors = Vec::new();

    check_band_scores(&mut errors, "pof.corrosion_rate", &tables.pof.corrosion_rate);
    check_band_scores(&mut errors, "pof.equipment_age", &tables.pof.equipment_age);
    check_band_scores(
        &mut errors,
        "pof.damage_mechanism_count",
        &tables.pof.damage_mechanism_count,
    );
    check_band_scores(
        &mut errors,
        "pof.inspection_coverage",
        &tables.pof.inspection_coverage,
    );
    check_band_scores(&mut errors, "cof.safety_pressure", &tables.cof.safety_pressure);
    check_band_scores(
        &mut errors,
        "cof.environmental_containment",
        &tables.cof.environmental_containment,
    );
    check_band_scores(
        &mut errors,
        "cof.economic_repair_cost",
        &tables.cof.economic_repair_cost,
    );

    for (table_name, table) in [
        ("pof.coating_quality", &tables.pof.coating_quality),
        ("cof.safety_fluid_hazard", &tables.cof.safety_fluid_hazard),
        ("cof.safety_location", &tables.cof.safety_location),
        ("cof.environmental_fluid", &tables.cof.environmental_fluid),
        ("cof.economic_downtime", &tables.cof.economic_downtime),
        ("cof.economic_production", &tables.cof.economic_production),
        ("cof.business_interruption", &tables.cof.business_interruption),
    ] {
        for (key, score) in &table.scores {
            if !(1.0..=5.0).contains(score) {
                errors.push(format!("{table_name}.{key}: score {score} is outside 1-5"));
            }
        }
    }

    for (key, rate) in &tables.pof.base_failure_rates.scores {
        if *rate <= 0.0 || *rate >= 1.0 {
            errors.push(format!(
                "pof.base_failure_rates.{key}: annual rate {rate} must be in (0,1)"
            ));
        }
    }

    errors
}

/// Risk matrix: must cover all 3×3 cells and give every risk level an
/// interval; fallback safety factors must be ≥ 1.0.
pub fn validate_risk_matrix(matrix: &RiskMatrixConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if matrix.matrix.len() != 3 {
        errors.push(format!(
            "matrix must have 3 PoF rows, found {}",
            matrix.matrix.len()
        ));
    }
    for (i, row) in matrix.matrix.iter().enumerate() {
        if row.len() != 3 {
            errors.push(format!("matrix row {i} must have 3 CoF cells, found {}", row.len()));
        }
    }

    for key in ["low", "medium", "high", "very_high"] {
        match matrix.intervals_months.get(key) {
            None => errors.push(format!("intervals_months missing entry for '{key}'")),
            Some(0) => errors.push(format!("intervals_months['{key}'] must be positive")),
            Some(_) => {}
        }
    }

    for (name, factor) in &matrix.fallback_safety_factors {
        if *factor < 1.0 {
            errors.push(format!(
                "fallback_safety_factors['{name}'] = {factor} must be >= 1.0"
            ));
        }
    }

    errors
}

/// Weighting factors: each weight set should sum to 1.0 within tolerance and
/// contain no negative weights.
pub fn validate_weighting_factors(weights: &WeightingFactors) -> Vec<String> {
    let mut errors = Vec::new();

    for (name, set) in [
        ("pof_weights", &weights.pof_weights),
        ("cof_weights", &weights.cof_weights),
    ] {
        if set.is_empty() {
            errors.push(format!("{name} must not be empty"));
            continue;
        }
        for (key, weight) in set {
            if *weight < 0.0 {
                errors.push(format!("{name}['{key}'] = {weight} must be non-negative"));
            }
        }
        let sum: f64 = set.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!(
                "{name} should sum to 1.0 (within ±{WEIGHT_SUM_TOLERANCE}), got {sum:.3}"
            ));
        }
    }

    errors
}

/// Fallback settings: penalties are divisors ≥ 1.0, confidence reductions
/// stay under 1.0, the emergency interval is positive.
pub fn validate_fallback_settings(settings: &FallbackSettings) -> Vec<String> {
    let mut errors = Vec::new();

    for (name, value) in [
        ("missing_field_penalty", settings.missing_field_penalty),
        ("stale_data_penalty", settings.stale_data_penalty),
        ("max_total_penalty", settings.max_total_penalty),
    ] {
        if value < 1.0 {
            errors.push(format!("{name} = {value} must be >= 1.0"));
        }
    }
    for (name, value) in [
        (
            "confidence_reduction_per_field",
            settings.confidence_reduction_per_field,
        ),
        ("max_confidence_reduction", settings.max_confidence_reduction),
    ] {
        if !(0.0..1.0).contains(&value) {
            errors.push(format!("{name} = {value} must be in [0,1)"));
        }
    }
    if settings.emergency_interval_months == 0 {
        errors.push("emergency_interval_months must be positive".to_string());
    }

    errors
}

/// Learning settings: bias machinery needs a sane sample floor, positive
/// intensities and well-ordered parameter bounds.
pub fn validate_learning_settings(settings: &LearningSettings) -> Vec<String> {
    let mut errors = Vec::new();

    if settings.min_predictions_for_bias < 2 {
        errors.push("min_predictions_for_bias must be at least 2".to_string());
    }
    if settings.bias_threshold <= 0.0 {
        errors.push(format!(
            "bias_threshold = {} must be positive",
            settings.bias_threshold
        ));
    }
    for (name, value) in [
        ("conservative_intensity", settings.conservative_intensity),
        ("balanced_intensity", settings.balanced_intensity),
        ("aggressive_intensity", settings.aggressive_intensity),
        ("base_adjustment_step", settings.base_adjustment_step),
    ] {
        if value <= 0.0 {
            errors.push(format!("{name} = {value} must be positive"));
        }
    }
    if !(0.0..=1.0).contains(&settings.confidence_blend_rate)
        || settings.confidence_blend_rate == 0.0
    {
        errors.push(format!(
            "confidence_blend_rate = {} must be in (0,1]",
            settings.confidence_blend_rate
        ));
    }
    for (param, bounds) in &settings.parameter_bounds {
        if bounds.min >= bounds.max {
            errors.push(format!(
                "parameter_bounds['{param}']: min {} must be below max {}",
                bounds.min, bounds.max
            ));
        }
        if bounds.min <= 0.0 {
            errors.push(format!(
                "parameter_bounds['{param}']: min {} must be positive",
                bounds.min
            ));
        }
    }

    errors
}

/// Level 1 settings: positive intervals and modifiers, safety divisors ≥ 1.0.
pub fn validate_level1_settings(settings: &Level1Settings) -> Vec<String> {
    let mut errors = Vec::new();

    if settings.default_base_interval_months <= 0.0 {
        errors.push("default_base_interval_months must be positive".to_string());
    }
    for (key, months) in &settings.base_intervals_months {
        if *months <= 0.0 {
            errors.push(format!("base_intervals_months['{key}'] must be positive"));
        }
    }
    for (name, set) in [
        ("service_modifiers", &settings.service_modifiers),
        ("criticality_modifiers", &settings.criticality_modifiers),
    ] {
        for (key, modifier) in set {
            if *modifier <= 0.0 {
                errors.push(format!("{name}['{key}'] = {modifier} must be positive"));
            }
        }
    }
    for (issue, factor) in &settings.safety_factors {
        if *factor < 1.0 {
            errors.push(format!(
                "safety_factors['{issue}'] = {factor} must be >= 1.0"
            ));
        }
    }
    if settings.max_compound_safety_factor < 1.0 {
        errors.push("max_compound_safety_factor must be >= 1.0".to_string());
    }
    if settings.emergency_interval_months == 0 {
        errors.push("emergency_interval_months must be positive".to_string());
    }

    errors
}

/// Level requirements: thresholds within [0,1], Level 3 stricter than Level 2.
pub fn validate_level_requirements(requirements: &LevelRequirementsConfig) -> Vec<String> {
    let mut errors = Vec::new();

    for (name, level) in [
        ("level_1", &requirements.level_1),
        ("level_2", &requirements.level_2),
        ("level_3", &requirements.level_3),
    ] {
        if level.mandatory_fields.is_empty() {
            errors.push(format!("{name}: mandatory_fields must not be empty"));
        }
        if !(0.0..=1.0).contains(&level.min_completeness) {
            errors.push(format!(
                "{name}: min_completeness {} must be in [0,1]",
                level.min_completeness
            ));
        }
        if !(0.0..=1.0).contains(&level.confidence_threshold) {
            errors.push(format!(
                "{name}: confidence_threshold {} must be in [0,1]",
                level.confidence_threshold
            ));
        }
        if let Some(age) = level.max_inspection_age_days {
            if age <= 0 {
                errors.push(format!("{name}: max_inspection_age_days must be positive"));
            }
        }
    }

    if requirements.level_3.confidence_threshold < requirements.level_2.confidence_threshold {
        errors.push(
            "level_3 confidence_threshold must not be below level_2's".to_string(),
        );
    }
    if requirements.level_3.min_thickness_points < requirements.level_2.min_thickness_points {
        errors.push("level_3 min_thickness_points must not be below level_2's".to_string());
    }

    errors
}

/// Validate every category and return the per-category error lists. All
/// categories are always present in the report; an empty list means the
/// category passed.
pub fn validate_complete_configuration(config: &RBIConfig) -> BTreeMap<&'static str, Vec<String>> {
    let mut report = BTreeMap::new();
    report.insert("scoring_tables", validate_scoring_tables(&config.scoring_tables));
    report.insert("risk_matrix", validate_risk_matrix(&config.risk_matrix));
    report.insert(
        "level_requirements",
        validate_level_requirements(&config.level_requirements),
    );
    report.insert(
        "weighting_factors",
        validate_weighting_factors(&config.weighting_factors),
    );
    report.insert(
        "fallback_settings",
        validate_fallback_settings(&config.fallback_settings),
    );
    report.insert(
        "learning_settings",
        validate_learning_settings(&config.learning_settings),
    );
    report.insert(
        "level1_settings",
        validate_level1_settings(&config.level1_settings),
    );
    report
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_every_category() {
        let report = validate_complete_configuration(&RBIConfig::default());
        for (category, errors) in report {
            assert!(errors.is_empty(), "{category}: {errors:?}");
        }
    }

    #[test]
    fn pof_weights_summing_to_0_8_rejected_with_message() {
        let mut config = RBIConfig::default();
        config.weighting_factors.pof_weights.clear();
        config
            .weighting_factors
            .pof_weights
            .insert("corrosion_rate".to_string(), 0.5);
        config
            .weighting_factors
            .pof_weights
            .insert("equipment_age".to_string(), 0.3);

        let errors = validate_weighting_factors(&config.weighting_factors);
        assert!(
            errors.iter().any(|e| e.contains("should sum to 1.0")),
            "expected sum message, got {errors:?}"
        );
    }

    #[test]
    fn incomplete_risk_matrix_rejected() {
        let mut config = RBIConfig::default();
        config.risk_matrix.matrix.pop();
        let errors = validate_risk_matrix(&config.risk_matrix);
        assert!(!errors.is_empty());
    }

    #[test]
    fn fallback_multiplier_below_one_rejected() {
        let mut config = RBIConfig::default();
        config.fallback_settings.missing_field_penalty = 0.9;
        let errors = validate_fallback_settings(&config.fallback_settings);
        assert!(errors.iter().any(|e| e.contains("missing_field_penalty")));
    }

    #[test]
    fn empty_band_table_rejected() {
        let mut config = RBIConfig::default();
        config.scoring_tables.pof.corrosion_rate.bands.clear();
        let errors = validate_scoring_tables(&config.scoring_tables);
        assert!(
            errors
                .iter()
                .any(|e| e.contains("pof.corrosion_rate") && e.contains("must not be empty")),
            "expected empty-bands message, got {errors:?}"
        );
    }

    #[test]
    fn inverted_parameter_bounds_rejected() {
        let mut config = RBIConfig::default();
        config.learning_settings.parameter_bounds.insert(
            "age_factor".to_string(),
            super::super::ParameterBounds { min: 2.0, max: 0.5 },
        );
        let errors = validate_learning_settings(&config.learning_settings);
        assert!(errors.iter().any(|e| e.contains("age_factor")));
    }
}
