//! Learning loop integration tests
//!
//! Drives the full loop through the public engine surface: calculate,
//! attach observed outcomes, detect bias, adjust parameters, roll back,
//! and grow the pattern catalogs from fleet history.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use rbi_engine::config::{ConfigManager, RBIConfig};
use rbi_engine::learning::{
    ActualOutcome, AdaptiveParameterAdjuster, AdjustmentStrategy, BiasDirection,
    EquipmentHistory, PatternRecognitionEngine,
};
use rbi_engine::{
    CriticalityLevel, EngineContext, EquipmentData, ExtractedRBIData,
    InMemoryEquipmentRegistry, InspectionQuality, RBICalculationEngine, RiskLevel,
    StaticReportExtractor, ThicknessMeasurement,
};

fn vessel(id: &str) -> EquipmentData {
    EquipmentData::new(
        id,
        "pressure_vessel",
        "sour_gas",
        Utc::now() - Duration::days(20 * 365),
        25.0,
        150.0,
        "carbon_steel",
        CriticalityLevel::High,
        "process_area",
        12.0,
    )
    .unwrap()
}

fn extraction(id: &str) -> ExtractedRBIData {
    let inspected = Utc::now() - Duration::days(60);
    let mut data = ExtractedRBIData::empty(id).with_corrosion_rate(0.1).unwrap();
    data.thickness_measurements = (0..3)
        .map(|i| {
            ThicknessMeasurement::new(
                &format!("cml-{i}"),
                12.0 - i as f64 * 0.2,
                inspected,
                8.0,
                "UT",
                "insp-1",
            )
            .unwrap()
        })
        .collect();
    data.last_inspection_date = Some(inspected);
    data.inspection_quality = InspectionQuality::Good;
    data.damage_mechanisms.insert("general_corrosion".to_string());
    data
}

fn build_engine(id: &str) -> RBICalculationEngine {
    let mut registry = InMemoryEquipmentRegistry::new();
    registry.insert(vessel(id));
    let mut extractor = StaticReportExtractor::new();
    extractor.insert(extraction(id));
    RBICalculationEngine::new(EngineContext::new(
        Arc::new(ConfigManager::new(RBIConfig::default())),
        Arc::new(registry),
        Arc::new(extractor),
    ))
}

// ============================================================================
// Prediction → outcome → bias → adjustment
// ============================================================================

#[tokio::test]
async fn under_prediction_bias_is_detected_and_corrected() {
    let engine = build_engine("V-1");
    let settings = RBIConfig::default().learning_settings;

    // Three calculations, each observed to be worse than predicted.
    for _ in 0..3 {
        engine
            .calculate_next_inspection_date("V-1", None, true)
            .await;
    }
    for record in engine.context().predictions.history("V-1") {
        assert!(engine.record_inspection_outcome(
            "V-1",
            record.prediction_id,
            ActualOutcome {
                actual_risk_level: RiskLevel::VeryHigh,
                observed_date: Utc::now(),
                notes: Some("field inspection found severe localized attack".to_string()),
            },
        ));
    }

    let adjuster = AdaptiveParameterAdjuster::new(engine.context().predictions.clone());
    let bias = adjuster.analyze_prediction_bias("V-1", &settings);
    assert_eq!(bias.direction, BiasDirection::UnderPrediction);
    assert_eq!(bias.sample_count, 3);
    assert!(bias.mean_delta >= 1.0);

    let mut parameters = HashMap::new();
    parameters.insert("corrosion_rate_factor".to_string(), 1.0);
    parameters.insert("damage_severity_factor".to_string(), 1.2);

    let run = adjuster.adjust_parameters(
        "V-1",
        &parameters,
        AdjustmentStrategy::Balanced,
        &settings,
    );
    assert!(!run.adjustments.is_empty());
    for adjustment in &run.adjustments {
        assert!(adjustment.adjusted_value > adjustment.original_value);
        let bounds = &settings.parameter_bounds[&adjustment.parameter];
        assert!(adjustment.adjusted_value <= bounds.max);
    }

    // Rollback restores exactly the pre-adjustment values.
    let mut adjusted = parameters.clone();
    for adjustment in &run.adjustments {
        adjusted.insert(adjustment.parameter.clone(), adjustment.adjusted_value);
    }
    let rolled = adjuster.rollback_to_baseline("V-1");
    let restored = AdaptiveParameterAdjuster::revert_values(&adjusted, &rolled);
    for (parameter, value) in &parameters {
        assert!((restored[parameter] - value).abs() < 1e-12);
    }
}

#[tokio::test]
async fn outcome_can_only_close_a_prediction_once() {
    let engine = build_engine("V-1");
    engine
        .calculate_next_inspection_date("V-1", None, false)
        .await;
    let id = engine.context().predictions.history("V-1")[0].prediction_id;
    let outcome = ActualOutcome {
        actual_risk_level: RiskLevel::Medium,
        observed_date: Utc::now(),
        notes: None,
    };
    assert!(engine.record_inspection_outcome("V-1", id, outcome.clone()));
    assert!(!engine.record_inspection_outcome("V-1", id, outcome.clone()));
    assert!(!engine.record_inspection_outcome("V-1", 9999, outcome));
}

#[tokio::test]
async fn balanced_predictions_produce_no_adjustment() {
    let engine = build_engine("V-1");
    let settings = RBIConfig::default().learning_settings;

    for _ in 0..4 {
        engine
            .calculate_next_inspection_date("V-1", None, true)
            .await;
    }
    // Observed exactly as predicted.
    for record in engine.context().predictions.history("V-1") {
        engine.record_inspection_outcome(
            "V-1",
            record.prediction_id,
            ActualOutcome {
                actual_risk_level: record.predicted_risk_level,
                observed_date: Utc::now(),
                notes: None,
            },
        );
    }

    let adjuster = AdaptiveParameterAdjuster::new(engine.context().predictions.clone());
    let bias = adjuster.analyze_prediction_bias("V-1", &settings);
    assert_eq!(bias.direction, BiasDirection::Balanced);

    let mut parameters = HashMap::new();
    parameters.insert("corrosion_rate_factor".to_string(), 1.0);
    let run = adjuster.adjust_parameters(
        "V-1",
        &parameters,
        AdjustmentStrategy::Aggressive,
        &settings,
    );
    assert!(run.adjustments.is_empty());
}

// ============================================================================
// Pattern catalogs from fleet history
// ============================================================================

#[tokio::test]
async fn fleet_history_grows_catalogs_the_engine_can_query() {
    let engine = build_engine("V-1");

    // Seed the shared pattern engine with a small fleet of similar vessels.
    let histories: Vec<EquipmentHistory> = (0..5)
        .map(|i| {
            let id = format!("F-{i}");
            EquipmentHistory {
                equipment: vessel(&id),
                calculations: Vec::new(),
                inspections: vec![extraction(&id)],
            }
        })
        .collect();

    {
        let mut patterns = engine.context().patterns.lock().unwrap();
        let outcome = patterns.learn_from_historical_data(&histories);
        assert_eq!(outcome.new_families, 1);
        assert_eq!(outcome.refined_families, 4);
        assert_eq!(outcome.new_patterns, 1);
    }

    let patterns = engine.context().patterns.lock().unwrap();
    let analysis =
        patterns.analyze_equipment_patterns(&vessel("V-1"), &[], &[extraction("V-1")]);
    assert_eq!(analysis.identified_families.len(), 1);
    assert_eq!(analysis.degradation_patterns.len(), 1);
    assert!(analysis
        .parameter_recommendations
        .contains_key("expected_corrosion_rate"));
}

#[test]
fn exported_catalog_survives_a_fresh_process() {
    let mut source = PatternRecognitionEngine::new();
    source.learn_from_historical_data(&[EquipmentHistory {
        equipment: vessel("V-1"),
        calculations: Vec::new(),
        inspections: vec![extraction("V-1")],
    }]);
    let document = source.export_catalog().unwrap();

    let mut fresh = PatternRecognitionEngine::new();
    fresh.import_catalog(&document).unwrap();
    assert_eq!(fresh.family_count(), 1);
    assert_eq!(fresh.pattern_count(), 1);

    let analysis =
        fresh.analyze_equipment_patterns(&vessel("V-2"), &[], &[extraction("V-2")]);
    assert_eq!(analysis.identified_families.len(), 1);
}
