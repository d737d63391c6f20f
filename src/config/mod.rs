//! RBI Configuration Module
//!
//! Holds every tunable the calculators, level manager and learning loop read:
//! scoring tables, the risk matrix, level requirements, weighting factors,
//! fallback conservatism and learning constants.
//!
//! ## Loading Order
//!
//! 1. `RBI_CONFIG` environment variable (path to TOML file)
//! 2. `rbi_config.toml` in the current working directory
//! 3. Built-in defaults (matching the original calibration)
//!
//! ## Update semantics
//!
//! The live config is an [`arc_swap::ArcSwap`] snapshot owned by
//! [`ConfigManager`]. Updates are validated in full first and swapped in
//! atomically only when every category passes; in-flight calculations keep
//! reading the prior snapshot.

pub mod defaults;
pub mod validation;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{CalculationLevel, RiskLevel};

/// Configuration errors, surfaced only at load/update time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration rejected: {0}")]
    Rejected(String),

    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Scoring primitives
// ============================================================================

/// One band of a numeric scoring table: `value <= upper` scores `score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBand {
    pub upper: f64,
    pub score: f64,
}

/// Banded numeric scoring table. Bands are checked in order; values above
/// every band score `above`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandTable {
    pub bands: Vec<ScoreBand>,
    pub above: f64,
}

impl BandTable {
    pub fn score(&self, value: f64) -> f64 {
        for band in &self.bands {
            if value <= band.upper {
                return band.score;
            }
        }
        self.above
    }
}

/// Categorical scoring table with a default for unknown keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTable {
    pub scores: HashMap<String, f64>,
    pub default_score: f64,
}

impl CategoryTable {
    pub fn score(&self, key: &str) -> f64 {
        self.scores.get(key).copied().unwrap_or(self.default_score)
    }
}

// ============================================================================
// Config sections
// ============================================================================

/// PoF parameter scoring tables (Level 2) and base failure rates (Level 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PofScoringTables {
    /// Corrosion rate bands (mm/yr) → score 1–5
    pub corrosion_rate: BandTable,
    /// Equipment age bands (years) → score 1–5
    pub equipment_age: BandTable,
    /// Active damage-mechanism count bands → score 1–5
    pub damage_mechanism_count: BandTable,
    /// Coating condition → score 1–5
    pub coating_quality: CategoryTable,
    /// Thickness point count bands → score 1–5 (fewer points scores worse)
    pub inspection_coverage: BandTable,
    /// Generic annual failure frequency per equipment type (Level 3 base rate)
    pub base_failure_rates: CategoryTable,
}

/// CoF dimension scoring tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CofScoringTables {
    /// Safety: design pressure bands (bar) → score
    pub safety_pressure: BandTable,
    /// Safety: fluid hazard class per service type → score
    pub safety_fluid_hazard: CategoryTable,
    /// Safety: location exposure → score
    pub safety_location: CategoryTable,
    /// Environmental: fluid per service type → score
    pub environmental_fluid: CategoryTable,
    /// Environmental: inventory size bands (m³) → score
    pub environmental_containment: BandTable,
    /// Economic: downtime class per equipment type → score
    pub economic_downtime: CategoryTable,
    /// Economic: production impact per criticality → score
    pub economic_production: CategoryTable,
    /// Economic: repair cost bands by design pressure (bar) → score
    pub economic_repair_cost: BandTable,
    /// Business (Level 3 only): interruption class per criticality → score
    pub business_interruption: CategoryTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringTablesConfig {
    pub pof: PofScoringTables,
    pub cof: CofScoringTables,
}

/// 3×3 PoF×CoF risk matrix, interval map and fallback safety factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMatrixConfig {
    /// `matrix[pof_bucket][cof_bucket]`, buckets 0..3
    pub matrix: Vec<Vec<RiskLevel>>,
    /// Inspection interval (months) per risk level key
    pub intervals_months: HashMap<String, u32>,
    /// Named safety factors applied when data gaps force conservatism, ≥ 1.0
    pub fallback_safety_factors: HashMap<String, f64>,
}

impl RiskMatrixConfig {
    /// Score bucket: ≤2.0 → 0, ≤3.5 → 1, else 2.
    pub fn bucket(score: f64) -> usize {
        if score <= 2.0 {
            0
        } else if score <= 3.5 {
            1
        } else {
            2
        }
    }

    /// Matrix lookup with clamped indices; a malformed matrix resolves to the
    /// conservative High rather than panicking mid-pipeline.
    pub fn lookup(&self, pof_bucket: usize, cof_bucket: usize) -> RiskLevel {
        self.matrix
            .get(pof_bucket.min(2))
            .and_then(|row| row.get(cof_bucket.min(2)))
            .copied()
            .unwrap_or(RiskLevel::High)
    }

    /// Interval for a risk level; missing entries resolve to 6 months.
    pub fn interval_for(&self, risk: RiskLevel) -> u32 {
        self.intervals_months
            .get(risk.as_key())
            .copied()
            .unwrap_or(6)
    }
}

/// PoF and CoF aggregation weights. Each set must sum to 1.0 ± 0.01.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightingFactors {
    pub pof_weights: HashMap<String, f64>,
    pub cof_weights: HashMap<String, f64>,
}

/// Conservatism applied when a calculation cascaded below its target level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// Interval divisor contribution per missing mandatory field, ≥ 1.0
    pub missing_field_penalty: f64,
    /// Extra divisor when the inspection data is older than the level allows, ≥ 1.0
    pub stale_data_penalty: f64,
    /// Cap on the compounded divisor, ≥ 1.0
    pub max_total_penalty: f64,
    /// Confidence subtracted per missing mandatory field, [0,1)
    pub confidence_reduction_per_field: f64,
    /// Cap on total confidence reduction, [0,1)
    pub max_confidence_reduction: f64,
    /// Interval used when every calculation tier is exhausted
    pub emergency_interval_months: u32,
}

/// Per-parameter bounds for adaptive adjustment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub min: f64,
    pub max: f64,
}

/// Adaptive-learning constants. The original embedded these as magic numbers;
/// here they are configuration so operators can retune without a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSettings {
    /// Completed predictions required before bias analysis runs
    pub min_predictions_for_bias: usize,
    /// Mean ordinal delta beyond which bias is declared (± band)
    pub bias_threshold: f64,
    /// Strategy intensity multipliers
    pub conservative_intensity: f64,
    pub balanced_intensity: f64,
    pub aggressive_intensity: f64,
    /// Fractional nudge per unit of bias at intensity 1.0
    pub base_adjustment_step: f64,
    /// Clamp rules per tunable parameter name
    pub parameter_bounds: HashMap<String, ParameterBounds>,
    /// Blend rate for folding new evidence into stored pattern confidence, (0,1]
    pub confidence_blend_rate: f64,
}

impl LearningSettings {
    pub fn intensity_for(&self, conservative: bool, aggressive: bool) -> f64 {
        if conservative {
            self.conservative_intensity
        } else if aggressive {
            self.aggressive_intensity
        } else {
            self.balanced_intensity
        }
    }
}

/// Level 1 static-calculation tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level1Settings {
    /// Base interval (months) per equipment type
    pub base_intervals_months: HashMap<String, f64>,
    /// Base interval when the equipment type is unknown
    pub default_base_interval_months: f64,
    /// Interval multiplier per service type
    pub service_modifiers: HashMap<String, f64>,
    /// Interval multiplier per criticality key
    pub criticality_modifiers: HashMap<String, f64>,
    /// Services that add risk score (+1)
    pub aggressive_services: Vec<String>,
    /// Equipment types that add risk score (+1)
    pub high_risk_equipment_types: Vec<String>,
    /// Whether data-quality safety factors divide the interval
    pub apply_safety_factors: bool,
    /// Divisor per named data-quality issue, each ≥ 1.0
    pub safety_factors: HashMap<String, f64>,
    /// Cap on the compounded safety divisor
    pub max_compound_safety_factor: f64,
    /// Floor interval for the emergency variant
    pub emergency_interval_months: u32,
}

/// Data requirements for one calculation level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRequirements {
    pub mandatory_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    /// Fraction of mandatory+optional fields that must be present, [0,1]
    pub min_completeness: f64,
    /// Data-quality score the level needs, [0,1]
    pub confidence_threshold: f64,
    /// Maximum inspection age the level tolerates; None = no limit
    pub max_inspection_age_days: Option<i64>,
    /// Minimum thickness points the level needs
    pub min_thickness_points: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRequirementsConfig {
    pub level_1: LevelRequirements,
    pub level_2: LevelRequirements,
    pub level_3: LevelRequirements,
}

impl LevelRequirementsConfig {
    pub fn for_level(&self, level: CalculationLevel) -> &LevelRequirements {
        match level {
            CalculationLevel::Level1 => &self.level_1,
            CalculationLevel::Level2 => &self.level_2,
            CalculationLevel::Level3 => &self.level_3,
        }
    }
}

// ============================================================================
// Top-level config
// ============================================================================

/// Versioned, process-wide RBI configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RBIConfig {
    /// Monotonic version, bumped on every accepted update
    pub version: u32,
    pub scoring_tables: ScoringTablesConfig,
    pub risk_matrix: RiskMatrixConfig,
    pub level_requirements: LevelRequirementsConfig,
    pub weighting_factors: WeightingFactors,
    pub fallback_settings: FallbackSettings,
    pub learning_settings: LearningSettings,
    pub level1_settings: Level1Settings,
}

impl Default for RBIConfig {
    fn default() -> Self {
        defaults::default_config()
    }
}

impl RBIConfig {
    /// Load following the documented order: env var path, conventional file,
    /// then built-in defaults. A file that fails to parse or validate falls
    /// through to the next source with a warning, never a crash.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("RBI_CONFIG") {
            match Self::from_toml_file(Path::new(&path)) {
                Ok(config) => {
                    info!(path = %path, "Loaded RBI config from RBI_CONFIG");
                    return config;
                }
                Err(e) => warn!(path = %path, error = %e, "RBI_CONFIG file rejected, trying next source"),
            }
        }

        let conventional = Path::new("rbi_config.toml");
        if conventional.exists() {
            match Self::from_toml_file(conventional) {
                Ok(config) => {
                    info!("Loaded RBI config from rbi_config.toml");
                    return config;
                }
                Err(e) => warn!(error = %e, "rbi_config.toml rejected, using defaults"),
            }
        }

        info!("Using built-in RBI config defaults");
        Self::default()
    }

    /// Parse and validate a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Export the full configuration as a JSON document.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Run the complete validation and flatten failures into a `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let report = validation::validate_complete_configuration(self);
        let mut failures: Vec<String> = Vec::new();
        for (category, errors) in &report {
            for error in errors {
                failures.push(format!("{category}: {error}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Rejected(failures.join("; ")))
        }
    }
}

// ============================================================================
// Config manager — validated atomic swap
// ============================================================================

/// Owns the live config snapshot. Readers take an `Arc` snapshot and are
/// never exposed to a partially-updated config.
pub struct ConfigManager {
    current: ArcSwap<RBIConfig>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(RBIConfig::default())
    }
}

impl ConfigManager {
    pub fn new(config: RBIConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// Current config snapshot. Cheap; hold it for the duration of one
    /// calculation so the whole pipeline sees one consistent version.
    pub fn snapshot(&self) -> Arc<RBIConfig> {
        self.current.load_full()
    }

    /// Validate and atomically swap in a new configuration.
    ///
    /// The version is bumped past the live snapshot's on acceptance. An
    /// invalid config is rejected whole; the live snapshot is untouched.
    pub fn update(&self, mut config: RBIConfig) -> Result<u32, ConfigError> {
        config.ensure_valid()?;
        let previous = self.current.load();
        config.version = previous.version + 1;
        let version = config.version;
        self.current.store(Arc::new(config));
        info!(version, "RBI configuration updated");
        Ok(version)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RBIConfig::default().ensure_valid().is_ok());
    }

    #[test]
    fn band_table_scores_in_order() {
        let table = BandTable {
            bands: vec![
                ScoreBand { upper: 0.05, score: 1.0 },
                ScoreBand { upper: 0.1, score: 2.0 },
                ScoreBand { upper: 0.5, score: 4.0 },
            ],
            above: 5.0,
        };
        assert_eq!(table.score(0.01), 1.0);
        assert_eq!(table.score(0.08), 2.0);
        assert_eq!(table.score(0.3), 4.0);
        assert_eq!(table.score(1.0), 5.0);
    }

    #[test]
    fn json_round_trip() {
        let config = RBIConfig::default();
        let json = config.to_json().unwrap();
        let restored = RBIConfig::from_json(&json).unwrap();
        assert_eq!(restored.version, config.version);
        assert_eq!(
            restored.risk_matrix.interval_for(RiskLevel::Low),
            config.risk_matrix.interval_for(RiskLevel::Low)
        );
    }

    #[test]
    fn manager_rejects_invalid_update_and_keeps_snapshot() {
        let manager = ConfigManager::default();
        let before = manager.snapshot().version;

        let mut bad = RBIConfig::default();
        bad.weighting_factors
            .pof_weights
            .insert("corrosion_rate".to_string(), 0.0);
        assert!(manager.update(bad).is_err());
        assert_eq!(manager.snapshot().version, before);
    }

    #[test]
    fn manager_bumps_version_on_accept() {
        let manager = ConfigManager::default();
        let v = manager.update(RBIConfig::default()).unwrap();
        assert_eq!(manager.snapshot().version, v);
        assert!(v > 0);
    }
}
