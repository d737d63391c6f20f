//! Configuration validation integration tests
//!
//! Exercises the full validation report, the atomic update path and the
//! JSON round trip against the built-in defaults.

use rbi_engine::config::validation::validate_complete_configuration;
use rbi_engine::config::{ConfigManager, RBIConfig};
use rbi_engine::types::RiskLevel;

// ============================================================================
// Complete validation report
// ============================================================================

#[test]
fn default_config_passes_every_category() {
    let report = validate_complete_configuration(&RBIConfig::default());
    // Every category is always present, with an empty error list when clean.
    assert_eq!(report.len(), 7);
    for (category, errors) in &report {
        assert!(errors.is_empty(), "{category} unexpectedly failed: {errors:?}");
    }
}

#[test]
fn pof_weights_summing_below_one_are_rejected_with_sum_message() {
    let mut config = RBIConfig::default();
    for weight in config.weighting_factors.pof_weights.values_mut() {
        *weight *= 0.8;
    }
    let report = validate_complete_configuration(&config);
    let errors = &report["weighting_factors"];
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.contains("sum to 1.0")));
    assert!(config.ensure_valid().is_err());
}

#[test]
fn malformed_risk_matrix_is_rejected() {
    let mut config = RBIConfig::default();
    config.risk_matrix.matrix = vec![vec![RiskLevel::Low; 3]; 2]; // one row short
    let report = validate_complete_configuration(&config);
    assert!(!report["risk_matrix"].is_empty());
}

#[test]
fn empty_scoring_band_table_is_rejected() {
    let mut config = RBIConfig::default();
    config.scoring_tables.pof.corrosion_rate.bands.clear();
    let report = validate_complete_configuration(&config);
    assert!(!report["scoring_tables"].is_empty());
}

// ============================================================================
// Atomic update semantics
// ============================================================================

#[test]
fn invalid_update_is_rejected_whole_and_snapshot_untouched() {
    let manager = ConfigManager::new(RBIConfig::default());
    let before = manager.snapshot();

    let mut broken = RBIConfig::default();
    broken.weighting_factors.cof_weights.clear();
    assert!(manager.update(broken).is_err());

    let after = manager.snapshot();
    assert_eq!(before.version, after.version);
    assert_eq!(
        before.weighting_factors.cof_weights.len(),
        after.weighting_factors.cof_weights.len()
    );
}

#[test]
fn accepted_update_bumps_version() {
    let manager = ConfigManager::new(RBIConfig::default());
    let initial = manager.snapshot().version;

    let mut updated = RBIConfig::default();
    updated
        .risk_matrix
        .intervals_months
        .insert("low".to_string(), 48);
    let version = manager.update(updated).unwrap();
    assert_eq!(version, initial + 1);
    assert_eq!(manager.snapshot().risk_matrix.intervals_months["low"], 48);
}

// ============================================================================
// Serialization round trip
// ============================================================================

#[test]
fn json_round_trip_preserves_calibration() {
    let original = RBIConfig::default();
    let json = original.to_json().unwrap();
    let restored = RBIConfig::from_json(&json).unwrap();

    assert_eq!(original.version, restored.version);
    assert_eq!(
        original.risk_matrix.intervals_months,
        restored.risk_matrix.intervals_months
    );
    assert_eq!(
        original.weighting_factors.pof_weights.len(),
        restored.weighting_factors.pof_weights.len()
    );
    assert_eq!(
        original.learning_settings.min_predictions_for_bias,
        restored.learning_settings.min_predictions_for_bias
    );
}

#[test]
fn invalid_json_document_is_rejected() {
    assert!(RBIConfig::from_json("{\"version\": 1}").is_err());
}

#[test]
fn toml_file_round_trip_loads_and_validates() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rbi_config.toml");
    std::fs::write(&path, toml::to_string(&RBIConfig::default())?)?;

    let loaded = RBIConfig::from_toml_file(&path)?;
    assert!(loaded.ensure_valid().is_ok());
    assert_eq!(loaded.risk_matrix.intervals_months["very_high"], 12);
    Ok(())
}

#[test]
fn corrupt_toml_file_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rbi_config.toml");
    std::fs::write(&path, "version = \"not a number\"")?;
    assert!(RBIConfig::from_toml_file(&path).is_err());
    Ok(())
}
