//! Built-in configuration defaults
//!
//! These match the original calibration and are what a bare engine runs with
//! when no config file is found. Every table here can be overridden through
//! `rbi_config.toml` or a JSON config document.

use std::collections::HashMap;

use crate::types::RiskLevel;

use super::{
    BandTable, CategoryTable, CofScoringTables, FallbackSettings, LearningSettings,
    Level1Settings, LevelRequirements, LevelRequirementsConfig, ParameterBounds,
    PofScoringTables, RBIConfig, RiskMatrixConfig, ScoreBand, ScoringTablesConfig,
    WeightingFactors,
};

fn band(upper: f64, score: f64) -> ScoreBand {
    ScoreBand { upper, score }
}

fn categories(pairs: &[(&str, f64)], default_score: f64) -> CategoryTable {
    CategoryTable {
        scores: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        default_score,
    }
}

fn pof_tables() -> PofScoringTables {
    PofScoringTables {
        // mm/yr
        corrosion_rate: BandTable {
            bands: vec![band(0.05, 1.0), band(0.1, 2.0), band(0.25, 3.0), band(0.5, 4.0)],
            above: 5.0,
        },
        // years
        equipment_age: BandTable {
            bands: vec![band(5.0, 1.0), band(10.0, 2.0), band(15.0, 3.0), band(25.0, 4.0)],
            above: 5.0,
        },
        // active mechanisms
        damage_mechanism_count: BandTable {
            bands: vec![band(0.0, 1.0), band(1.0, 2.0), band(2.0, 3.0), band(3.0, 4.0)],
            above: 5.0,
        },
        coating_quality: categories(
            &[("excellent", 1.0), ("moderate", 3.0), ("none", 5.0)],
            3.0,
        ),
        // thickness point count — sparse coverage scores worse
        inspection_coverage: BandTable {
            bands: vec![band(0.0, 5.0), band(2.0, 4.0), band(5.0, 3.0), band(9.0, 2.0)],
            above: 1.0,
        },
        // generic annual failure frequencies
        base_failure_rates: categories(
            &[
                ("pressure_vessel", 1.0e-4),
                ("piping", 3.0e-4),
                ("storage_tank", 2.0e-4),
                ("heat_exchanger", 4.0e-4),
                ("pump", 8.0e-4),
                ("compressor", 6.0e-4),
            ],
            3.0e-4,
        ),
    }
}

fn cof_tables() -> CofScoringTables {
    CofScoringTables {
        // bar
        safety_pressure: BandTable {
            bands: vec![band(5.0, 1.0), band(15.0, 2.0), band(30.0, 3.0), band(60.0, 4.0)],
            above: 5.0,
        },
        safety_fluid_hazard: categories(
            &[
                ("sour_gas", 5.0),
                ("sweet_gas", 4.0),
                ("crude_oil", 4.0),
                ("diesel", 3.0),
                ("steam", 3.0),
                ("cooling_water", 1.0),
                ("water", 1.0),
            ],
            3.0,
        ),
        safety_location: categories(
            &[
                ("process_area", 4.0),
                ("control_room_adjacent", 5.0),
                ("offsite", 2.0),
                ("remote", 1.0),
            ],
            3.0,
        ),
        environmental_fluid: categories(
            &[
                ("sour_gas", 4.0),
                ("sweet_gas", 3.0),
                ("crude_oil", 5.0),
                ("diesel", 4.0),
                ("steam", 1.0),
                ("cooling_water", 1.0),
                ("water", 1.0),
            ],
            3.0,
        ),
        // inventory m³
        environmental_containment: BandTable {
            bands: vec![band(1.0, 1.0), band(10.0, 2.0), band(50.0, 3.0), band(200.0, 4.0)],
            above: 5.0,
        },
        economic_downtime: categories(
            &[
                ("pressure_vessel", 4.0),
                ("piping", 2.0),
                ("storage_tank", 3.0),
                ("heat_exchanger", 3.0),
                ("pump", 2.0),
                ("compressor", 5.0),
            ],
            3.0,
        ),
        economic_production: categories(
            &[
                ("low", 1.0),
                ("medium", 2.0),
                ("high", 4.0),
                ("critical", 5.0),
            ],
            3.0,
        ),
        // repair cost proxy by design pressure (bar)
        economic_repair_cost: BandTable {
            bands: vec![band(10.0, 1.0), band(25.0, 2.0), band(50.0, 3.0), band(100.0, 4.0)],
            above: 5.0,
        },
        business_interruption: categories(
            &[
                ("low", 1.0),
                ("medium", 2.0),
                ("high", 4.0),
                ("critical", 5.0),
            ],
            3.0,
        ),
    }
}

fn risk_matrix() -> RiskMatrixConfig {
    use RiskLevel::{High, Low, Medium, VeryHigh};
    let mut intervals = HashMap::new();
    intervals.insert("low".to_string(), 60);
    intervals.insert("medium".to_string(), 36);
    intervals.insert("high".to_string(), 24);
    intervals.insert("very_high".to_string(), 12);

    let mut factors = HashMap::new();
    factors.insert("missing_thickness_data".to_string(), 1.25);
    factors.insert("missing_corrosion_rate".to_string(), 1.5);
    factors.insert("stale_inspection".to_string(), 1.25);

    RiskMatrixConfig {
        // rows: PoF bucket (low→high), columns: CoF bucket (low→high)
        matrix: vec![
            vec![Low, Low, Medium],
            vec![Low, Medium, High],
            vec![Medium, High, VeryHigh],
        ],
        intervals_months: intervals,
        fallback_safety_factors: factors,
    }
}

fn weighting_factors() -> WeightingFactors {
    let mut pof = HashMap::new();
    pof.insert("corrosion_rate".to_string(), 0.25);
    pof.insert("equipment_age".to_string(), 0.20);
    pof.insert("damage_mechanism_count".to_string(), 0.20);
    pof.insert("coating_quality".to_string(), 0.15);
    pof.insert("inspection_coverage".to_string(), 0.20);

    let mut cof = HashMap::new();
    cof.insert("safety".to_string(), 0.5);
    cof.insert("environmental".to_string(), 0.3);
    cof.insert("economic".to_string(), 0.2);

    WeightingFactors {
        pof_weights: pof,
        cof_weights: cof,
    }
}

fn fallback_settings() -> FallbackSettings {
    FallbackSettings {
        missing_field_penalty: 1.2,
        stale_data_penalty: 1.25,
        max_total_penalty: 2.0,
        confidence_reduction_per_field: 0.05,
        max_confidence_reduction: 0.25,
        emergency_interval_months: 6,
    }
}

fn learning_settings() -> LearningSettings {
    let mut bounds = HashMap::new();
    bounds.insert(
        "corrosion_rate_factor".to_string(),
        ParameterBounds { min: 0.5, max: 2.0 },
    );
    bounds.insert(
        "age_factor".to_string(),
        ParameterBounds { min: 0.5, max: 2.0 },
    );
    bounds.insert(
        "damage_severity_factor".to_string(),
        ParameterBounds { min: 0.5, max: 3.0 },
    );
    bounds.insert(
        "interval_scaling".to_string(),
        ParameterBounds { min: 0.25, max: 1.5 },
    );
    bounds.insert(
        "confidence_weight".to_string(),
        ParameterBounds { min: 0.1, max: 1.0 },
    );

    LearningSettings {
        min_predictions_for_bias: 3,
        bias_threshold: 0.3,
        conservative_intensity: 0.5,
        balanced_intensity: 1.0,
        aggressive_intensity: 1.5,
        base_adjustment_step: 0.1,
        parameter_bounds: bounds,
        confidence_blend_rate: 0.3,
    }
}

fn level1_settings() -> Level1Settings {
    let mut base = HashMap::new();
    base.insert("pressure_vessel".to_string(), 36.0);
    base.insert("piping".to_string(), 48.0);
    base.insert("storage_tank".to_string(), 60.0);
    base.insert("heat_exchanger".to_string(), 36.0);
    base.insert("pump".to_string(), 24.0);
    base.insert("compressor".to_string(), 24.0);

    let mut service = HashMap::new();
    service.insert("sour_gas".to_string(), 0.6);
    service.insert("sweet_gas".to_string(), 0.8);
    service.insert("crude_oil".to_string(), 0.8);
    service.insert("diesel".to_string(), 0.9);
    service.insert("steam".to_string(), 0.9);
    service.insert("cooling_water".to_string(), 1.2);
    service.insert("water".to_string(), 1.2);

    let mut criticality = HashMap::new();
    criticality.insert("low".to_string(), 1.2);
    criticality.insert("medium".to_string(), 1.0);
    criticality.insert("high".to_string(), 0.7);
    criticality.insert("critical".to_string(), 0.5);

    let mut safety = HashMap::new();
    safety.insert("no_inspection_history".to_string(), 1.4);
    safety.insert("no_thickness_data".to_string(), 1.3);
    safety.insert("unknown_material".to_string(), 1.2);
    safety.insert("poor_inspection_quality".to_string(), 1.2);

    Level1Settings {
        base_intervals_months: base,
        default_base_interval_months: 24.0,
        service_modifiers: service,
        criticality_modifiers: criticality,
        aggressive_services: vec![
            "sour_gas".to_string(),
            "crude_oil".to_string(),
            "sweet_gas".to_string(),
        ],
        high_risk_equipment_types: vec![
            "pressure_vessel".to_string(),
            "compressor".to_string(),
        ],
        apply_safety_factors: true,
        safety_factors: safety,
        max_compound_safety_factor: 2.0,
        emergency_interval_months: 3,
    }
}

fn level_requirements() -> LevelRequirementsConfig {
    LevelRequirementsConfig {
        level_1: LevelRequirements {
            mandatory_fields: vec![
                "equipment_id".to_string(),
                "equipment_type".to_string(),
                "service_type".to_string(),
            ],
            optional_fields: vec!["last_inspection_date".to_string()],
            min_completeness: 0.0,
            confidence_threshold: 0.0,
            max_inspection_age_days: None,
            min_thickness_points: 0,
        },
        level_2: LevelRequirements {
            mandatory_fields: vec![
                "equipment_id".to_string(),
                "equipment_type".to_string(),
                "service_type".to_string(),
                "last_inspection_date".to_string(),
                "thickness_or_corrosion_rate".to_string(),
            ],
            optional_fields: vec![
                "coating_condition".to_string(),
                "damage_mechanisms".to_string(),
            ],
            min_completeness: 0.6,
            confidence_threshold: 0.5,
            max_inspection_age_days: Some(1825),
            min_thickness_points: 1,
        },
        level_3: LevelRequirements {
            mandatory_fields: vec![
                "equipment_id".to_string(),
                "equipment_type".to_string(),
                "service_type".to_string(),
                "last_inspection_date".to_string(),
                "thickness_measurements".to_string(),
                "corrosion_rate".to_string(),
            ],
            optional_fields: vec![
                "coating_condition".to_string(),
                "damage_mechanisms".to_string(),
            ],
            min_completeness: 0.8,
            confidence_threshold: 0.7,
            max_inspection_age_days: Some(730),
            min_thickness_points: 3,
        },
    }
}

/// Complete built-in default configuration.
pub fn default_config() -> RBIConfig {
    RBIConfig {
        version: 1,
        scoring_tables: ScoringTablesConfig {
            pof: pof_tables(),
            cof: cof_tables(),
        },
        risk_matrix: risk_matrix(),
        level_requirements: level_requirements(),
        weighting_factors: weighting_factors(),
        fallback_settings: fallback_settings(),
        learning_settings: learning_settings(),
        level1_settings: level1_settings(),
    }
}
