//! Pattern recognition over equipment families and degradation mechanisms
//!
//! Maintains two catalogs: `EquipmentFamily` (keyed by the
//! "equipment_type:service_type" composite) and `DegradationPattern` (keyed
//! by damage mechanism). Analysis matches an equipment item against both and
//! produces risk adjustment multipliers and parameter recommendations.
//! Learning folds new evidence into stored confidence rather than
//! overwriting it; catalog entries are never deleted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::types::{EquipmentData, ExtractedRBIData, RBICalculationResult, RiskLevel};

/// Default evidence blend rate when none is configured.
const DEFAULT_BLEND_RATE: f64 = 0.3;

/// Similarity below which a family/pattern match is not reported.
const MIN_MATCH_SIMILARITY: f64 = 0.5;

/// Catalog schema version for import/export compatibility.
const CATALOG_VERSION: u32 = 1;

/// Confidence tier for a match or an overall assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            ConfidenceTier::High
        } else if score >= 0.5 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// A cluster of similar equipment with shared recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentFamily {
    /// "equipment_type:service_type" composite key
    pub family_id: String,
    pub equipment_type: String,
    pub service_type: String,
    pub member_count: usize,
    pub typical_risk_level: RiskLevel,
    /// Mean observed corrosion rate across members (mm/yr)
    pub typical_corrosion_rate: f64,
    pub recommended_parameters: HashMap<String, f64>,
    pub confidence: f64,
    pub risk_factors: Vec<String>,
    pub mitigation_strategies: Vec<String>,
}

/// A data-derived degradation profile for one damage mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationPattern {
    /// Damage mechanism key, also the pattern id
    pub pattern_id: String,
    pub damage_mechanism: String,
    /// Equipment types this mechanism has been observed on
    pub matching_attributes: Vec<String>,
    pub typical_corrosion_rate: f64,
    pub recommended_parameters: HashMap<String, f64>,
    pub confidence: f64,
    pub observation_count: usize,
    pub mitigation_strategies: Vec<String>,
}

/// One family match in an analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMatch {
    pub family_id: String,
    pub similarity: f64,
    pub confidence_tier: ConfidenceTier,
}

/// One degradation-pattern match in an analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub similarity: f64,
    pub confidence_tier: ConfidenceTier,
}

/// Multiplicative risk adjustment suggested by a matched pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustment {
    pub reason: String,
    pub multiplier: f64,
}

/// Full analysis output for one equipment item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub equipment_id: String,
    pub identified_families: Vec<FamilyMatch>,
    pub degradation_patterns: Vec<PatternMatch>,
    pub operational_patterns: Vec<String>,
    pub anomalies: Vec<String>,
    pub confidence_assessment: ConfidenceTier,
    pub parameter_recommendations: HashMap<String, f64>,
    pub risk_adjustments: Vec<RiskAdjustment>,
}

/// One equipment's history used for batch learning.
pub struct EquipmentHistory {
    pub equipment: EquipmentData,
    pub calculations: Vec<RBICalculationResult>,
    pub inspections: Vec<ExtractedRBIData>,
}

/// Counts from one learning pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub new_families: usize,
    pub refined_families: usize,
    pub new_patterns: usize,
    pub refined_patterns: usize,
}

/// Serializable catalog document for import/export.
#[derive(Debug, Serialize, Deserialize)]
struct PatternCatalog {
    version: u32,
    families: HashMap<String, EquipmentFamily>,
    patterns: HashMap<String, DegradationPattern>,
}

fn family_key(equipment_type: &str, service_type: &str) -> String {
    format!("{equipment_type}:{service_type}")
}

/// Clusters equipment into families and matches degradation patterns.
pub struct PatternRecognitionEngine {
    families: HashMap<String, EquipmentFamily>,
    patterns: HashMap<String, DegradationPattern>,
    blend_rate: f64,
}

impl Default for PatternRecognitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRecognitionEngine {
    pub fn new() -> Self {
        Self {
            families: HashMap::new(),
            patterns: HashMap::new(),
            blend_rate: DEFAULT_BLEND_RATE,
        }
    }

    /// Override the evidence blend rate (from `LearningSettings`).
    pub fn with_blend_rate(mut self, blend_rate: f64) -> Self {
        self.blend_rate = blend_rate.clamp(0.01, 1.0);
        self
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Match one equipment item against the catalogs.
    pub fn analyze_equipment_patterns(
        &self,
        equipment: &EquipmentData,
        historical_calculations: &[RBICalculationResult],
        inspection_history: &[ExtractedRBIData],
    ) -> PatternAnalysis {
        let mut identified_families = Vec::new();
        let mut parameter_recommendations: HashMap<String, f64> = HashMap::new();
        let mut weight_sums: HashMap<String, f64> = HashMap::new();

        // Family similarity: weighted attribute overlap.
        for family in self.families.values() {
            let mut similarity = 0.0;
            if family.equipment_type == equipment.equipment_type {
                similarity += 0.6;
            }
            if family.service_type == equipment.service_type {
                similarity += 0.4;
            }
            if similarity >= MIN_MATCH_SIMILARITY {
                let weight = similarity * family.confidence;
                for (parameter, value) in &family.recommended_parameters {
                    *parameter_recommendations.entry(parameter.clone()).or_insert(0.0) +=
                        weight * value;
                    *weight_sums.entry(parameter.clone()).or_insert(0.0) += weight;
                }
                identified_families.push(FamilyMatch {
                    family_id: family.family_id.clone(),
                    similarity,
                    confidence_tier: ConfidenceTier::from_score(
                        similarity * family.confidence,
                    ),
                });
            }
        }

        // Pattern matches from the mechanisms seen in inspection history.
        let mut degradation_patterns = Vec::new();
        let mut risk_adjustments = Vec::new();
        let mut seen_mechanisms: Vec<&str> = Vec::new();
        for inspection in inspection_history {
            for mechanism in &inspection.damage_mechanisms {
                if seen_mechanisms.contains(&mechanism.as_str()) {
                    continue;
                }
                seen_mechanisms.push(mechanism);
                let Some(pattern) = self.patterns.get(mechanism) else {
                    continue;
                };
                let attribute_overlap = if pattern
                    .matching_attributes
                    .contains(&equipment.equipment_type)
                {
                    1.0
                } else {
                    0.0
                };
                let similarity = 0.6 + 0.4 * attribute_overlap;
                let weight = similarity * pattern.confidence;
                for (parameter, value) in &pattern.recommended_parameters {
                    *parameter_recommendations.entry(parameter.clone()).or_insert(0.0) +=
                        weight * value;
                    *weight_sums.entry(parameter.clone()).or_insert(0.0) += weight;
                }
                risk_adjustments.push(RiskAdjustment {
                    reason: format!("active degradation pattern '{}'", pattern.pattern_id),
                    multiplier: 1.0 + 0.25 * pattern.confidence,
                });
                degradation_patterns.push(PatternMatch {
                    pattern_id: pattern.pattern_id.clone(),
                    similarity,
                    confidence_tier: ConfidenceTier::from_score(weight),
                });
            }
        }

        for (parameter, total) in &mut parameter_recommendations {
            if let Some(weight) = weight_sums.get(parameter) {
                if *weight > 0.0 {
                    *total /= weight;
                }
            }
        }

        let operational_patterns =
            Self::operational_patterns(historical_calculations);
        let anomalies = self.detect_anomalies(equipment, inspection_history);

        let best_match = identified_families
            .iter()
            .map(|m| m.similarity)
            .chain(degradation_patterns.iter().map(|m| m.similarity))
            .fold(0.0, f64::max);
        let confidence_assessment = ConfidenceTier::from_score(best_match);

        debug!(
            equipment_id = %equipment.equipment_id,
            families = identified_families.len(),
            patterns = degradation_patterns.len(),
            anomalies = anomalies.len(),
            "Pattern analysis complete"
        );

        PatternAnalysis {
            equipment_id: equipment.equipment_id.clone(),
            identified_families,
            degradation_patterns,
            operational_patterns,
            anomalies,
            confidence_assessment,
            parameter_recommendations,
            risk_adjustments,
        }
    }

    /// Aggregate many equipment histories into new or refined catalog
    /// entries. Existing entries blend the new evidence into their stored
    /// confidence; nothing is overwritten or deleted.
    pub fn learn_from_historical_data(
        &mut self,
        histories: &[EquipmentHistory],
    ) -> LearningOutcome {
        let mut outcome = LearningOutcome::default();

        for history in histories {
            let equipment = &history.equipment;
            let observed_rate = history
                .inspections
                .iter()
                .filter_map(|i| i.corrosion_rate)
                .fold((0.0, 0usize), |(sum, n), r| (sum + r, n + 1));
            let mean_rate = if observed_rate.1 > 0 {
                observed_rate.0 / observed_rate.1 as f64
            } else {
                0.0
            };
            let dominant_risk = Self::dominant_risk(&history.calculations);

            let key = family_key(&equipment.equipment_type, &equipment.service_type);
            match self.families.get_mut(&key) {
                Some(family) => {
                    family.member_count += 1;
                    family.typical_corrosion_rate = blend(
                        family.typical_corrosion_rate,
                        mean_rate,
                        self.blend_rate,
                    );
                    family.confidence = blend(family.confidence, 0.9, self.blend_rate);
                    family.typical_risk_level = dominant_risk;
                    family
                        .recommended_parameters
                        .insert("expected_corrosion_rate".to_string(), family.typical_corrosion_rate);
                    outcome.refined_families += 1;
                }
                None => {
                    let mut recommended = HashMap::new();
                    recommended.insert("expected_corrosion_rate".to_string(), mean_rate);
                    recommended.insert("interval_scaling".to_string(), 1.0);
                    self.families.insert(
                        key.clone(),
                        EquipmentFamily {
                            family_id: key,
                            equipment_type: equipment.equipment_type.clone(),
                            service_type: equipment.service_type.clone(),
                            member_count: 1,
                            typical_risk_level: dominant_risk,
                            typical_corrosion_rate: mean_rate,
                            recommended_parameters: recommended,
                            confidence: 0.4,
                            risk_factors: vec![equipment.service_type.clone()],
                            mitigation_strategies: Vec::new(),
                        },
                    );
                    outcome.new_families += 1;
                }
            }

            for inspection in &history.inspections {
                for mechanism in &inspection.damage_mechanisms {
                    match self.patterns.get_mut(mechanism) {
                        Some(pattern) => {
                            pattern.observation_count += 1;
                            pattern.typical_corrosion_rate = blend(
                                pattern.typical_corrosion_rate,
                                mean_rate,
                                self.blend_rate,
                            );
                            pattern.confidence =
                                blend(pattern.confidence, 0.9, self.blend_rate);
                            if !pattern
                                .matching_attributes
                                .contains(&equipment.equipment_type)
                            {
                                pattern
                                    .matching_attributes
                                    .push(equipment.equipment_type.clone());
                            }
                            outcome.refined_patterns += 1;
                        }
                        None => {
                            let mut recommended = HashMap::new();
                            recommended
                                .insert("damage_severity_factor".to_string(), 1.2);
                            self.patterns.insert(
                                mechanism.clone(),
                                DegradationPattern {
                                    pattern_id: mechanism.clone(),
                                    damage_mechanism: mechanism.clone(),
                                    matching_attributes: vec![
                                        equipment.equipment_type.clone()
                                    ],
                                    typical_corrosion_rate: mean_rate,
                                    recommended_parameters: recommended,
                                    confidence: 0.3,
                                    observation_count: 1,
                                    mitigation_strategies: Vec::new(),
                                },
                            );
                            outcome.new_patterns += 1;
                        }
                    }
                }
            }
        }

        info!(
            new_families = outcome.new_families,
            refined_families = outcome.refined_families,
            new_patterns = outcome.new_patterns,
            refined_patterns = outcome.refined_patterns,
            "Historical learning pass complete"
        );
        outcome
    }

    /// Nudge one pattern's recommended parameters toward operator feedback
    /// observed on `equipment_id`, weighted by the reported accuracy.
    /// Returns false for an unknown pattern id.
    pub fn update_pattern_from_feedback(
        &mut self,
        equipment_id: &str,
        pattern_id: &str,
        feedback_parameters: &HashMap<String, f64>,
        accuracy_score: f64,
    ) -> bool {
        let Some(pattern) = self.patterns.get_mut(pattern_id) else {
            return false;
        };
        let rate = self.blend_rate * accuracy_score.clamp(0.0, 1.0);
        for (parameter, target) in feedback_parameters {
            let entry = pattern
                .recommended_parameters
                .entry(parameter.clone())
                .or_insert(*target);
            *entry = blend(*entry, *target, rate);
        }
        pattern.confidence = blend(pattern.confidence, accuracy_score.clamp(0.0, 1.0), self.blend_rate);
        info!(
            equipment_id,
            pattern_id,
            accuracy = accuracy_score,
            "Pattern refined from inspection feedback"
        );
        true
    }

    /// Export the full catalog as a JSON document.
    pub fn export_catalog(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&PatternCatalog {
            version: CATALOG_VERSION,
            families: self.families.clone(),
            patterns: self.patterns.clone(),
        })
    }

    /// Replace the catalogs from a previously exported document.
    pub fn import_catalog(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let catalog: PatternCatalog = serde_json::from_str(json)?;
        info!(
            version = catalog.version,
            families = catalog.families.len(),
            patterns = catalog.patterns.len(),
            "Pattern catalog imported"
        );
        self.families = catalog.families;
        self.patterns = catalog.patterns;
        Ok(())
    }

    fn dominant_risk(calculations: &[RBICalculationResult]) -> RiskLevel {
        if calculations.is_empty() {
            return RiskLevel::Medium;
        }
        let mean = calculations
            .iter()
            .map(|c| c.risk_level.ordinal() as f64)
            .sum::<f64>()
            / calculations.len() as f64;
        RiskLevel::from_ordinal(mean.round() as i64)
    }

    fn operational_patterns(calculations: &[RBICalculationResult]) -> Vec<String> {
        let mut patterns = Vec::new();
        if calculations.len() >= 3 {
            let ordinals: Vec<i32> = calculations
                .iter()
                .map(|c| c.risk_level.ordinal() as i32)
                .collect();
            if ordinals.windows(2).all(|w| w[1] >= w[0])
                && ordinals.last() > ordinals.first()
            {
                patterns.push("risk trending upward across calculations".to_string());
            }
            let fallback_count =
                calculations.iter().filter(|c| c.fallback_occurred).count();
            if fallback_count * 2 > calculations.len() {
                patterns.push("chronic data gaps forcing fallback".to_string());
            }
        }
        patterns
    }

    fn detect_anomalies(
        &self,
        equipment: &EquipmentData,
        inspection_history: &[ExtractedRBIData],
    ) -> Vec<String> {
        let mut anomalies = Vec::new();
        let key = family_key(&equipment.equipment_type, &equipment.service_type);
        if let Some(family) = self.families.get(&key) {
            if family.typical_corrosion_rate > 0.0 {
                for inspection in inspection_history {
                    if let Some(rate) = inspection.corrosion_rate {
                        if rate > 2.0 * family.typical_corrosion_rate {
                            anomalies.push(format!(
                                "corrosion rate {rate:.3} mm/yr exceeds twice the family \
                                 typical {:.3} mm/yr",
                                family.typical_corrosion_rate
                            ));
                            break;
                        }
                    }
                }
            }
        }
        anomalies
    }
}

/// Exponential blend toward new evidence.
fn blend(current: f64, evidence: f64, rate: f64) -> f64 {
    current + rate * (evidence - current)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CriticalityLevel, InspectionQuality};
    use chrono::{Duration, Utc};

    fn equipment(id: &str) -> EquipmentData {
        EquipmentData::new(
            id,
            "pressure_vessel",
            "sour_gas",
            Utc::now() - Duration::days(15 * 365),
            25.0,
            150.0,
            "carbon_steel",
            CriticalityLevel::High,
            "process_area",
            12.0,
        )
        .unwrap()
    }

    fn inspection(id: &str, rate: f64, mechanism: &str) -> ExtractedRBIData {
        let mut data = ExtractedRBIData::empty(id).with_corrosion_rate(rate).unwrap();
        data.damage_mechanisms.insert(mechanism.to_string());
        data.inspection_quality = InspectionQuality::Good;
        data
    }

    fn history(id: &str, rate: f64, mechanism: &str) -> EquipmentHistory {
        EquipmentHistory {
            equipment: equipment(id),
            calculations: Vec::new(),
            inspections: vec![inspection(id, rate, mechanism)],
        }
    }

    #[test]
    fn learning_creates_then_refines_families() {
        let mut engine = PatternRecognitionEngine::new();
        let first = engine.learn_from_historical_data(&[history("V-1", 0.1, "scc")]);
        assert_eq!(first.new_families, 1);
        assert_eq!(first.new_patterns, 1);

        let second = engine.learn_from_historical_data(&[history("V-2", 0.2, "scc")]);
        assert_eq!(second.new_families, 0);
        assert_eq!(second.refined_families, 1);
        assert_eq!(second.refined_patterns, 1);
        assert_eq!(engine.family_count(), 1);
    }

    #[test]
    fn refinement_blends_confidence_upward() {
        let mut engine = PatternRecognitionEngine::new();
        engine.learn_from_historical_data(&[history("V-1", 0.1, "scc")]);
        let before = engine.patterns["scc"].confidence;
        engine.learn_from_historical_data(&[history("V-2", 0.1, "scc")]);
        let after = engine.patterns["scc"].confidence;
        assert!(after > before);
        assert!(after < 0.9);
    }

    #[test]
    fn analysis_matches_family_and_pattern() {
        let mut engine = PatternRecognitionEngine::new();
        for i in 0..5 {
            engine.learn_from_historical_data(&[history(&format!("V-{i}"), 0.12, "scc")]);
        }

        let analysis = engine.analyze_equipment_patterns(
            &equipment("V-99"),
            &[],
            &[inspection("V-99", 0.1, "scc")],
        );
        assert_eq!(analysis.identified_families.len(), 1);
        assert!((analysis.identified_families[0].similarity - 1.0).abs() < 1e-9);
        assert_eq!(analysis.degradation_patterns.len(), 1);
        assert!(!analysis.risk_adjustments.is_empty());
        assert!(analysis.risk_adjustments[0].multiplier > 1.0);
        assert!(analysis
            .parameter_recommendations
            .contains_key("expected_corrosion_rate"));
    }

    #[test]
    fn outlier_corrosion_rate_is_flagged_as_anomaly() {
        let mut engine = PatternRecognitionEngine::new();
        for i in 0..4 {
            engine.learn_from_historical_data(&[history(&format!("V-{i}"), 0.1, "scc")]);
        }
        let analysis = engine.analyze_equipment_patterns(
            &equipment("V-99"),
            &[],
            &[inspection("V-99", 0.9, "scc")],
        );
        assert!(!analysis.anomalies.is_empty());
    }

    #[test]
    fn feedback_nudges_recommended_parameters() {
        let mut engine = PatternRecognitionEngine::new();
        engine.learn_from_historical_data(&[history("V-1", 0.1, "scc")]);
        let before = engine.patterns["scc"].recommended_parameters["damage_severity_factor"];

        let mut feedback = HashMap::new();
        feedback.insert("damage_severity_factor".to_string(), 2.0);
        assert!(engine.update_pattern_from_feedback("V-1", "scc", &feedback, 0.8));

        let after = engine.patterns["scc"].recommended_parameters["damage_severity_factor"];
        assert!(after > before);
        assert!(after < 2.0);

        assert!(!engine.update_pattern_from_feedback("V-1", "unknown", &feedback, 0.8));
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let mut engine = PatternRecognitionEngine::new();
        engine.learn_from_historical_data(&[history("V-1", 0.1, "scc")]);
        let exported = engine.export_catalog().unwrap();

        let mut restored = PatternRecognitionEngine::new();
        restored.import_catalog(&exported).unwrap();
        assert_eq!(restored.family_count(), engine.family_count());
        assert_eq!(restored.pattern_count(), engine.pattern_count());
    }
}
