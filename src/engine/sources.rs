//! External collaborator seams
//!
//! The engine consumes three external services: the equipment registry, the
//! inspection-report extractor and the data-quality assessor. Each is an
//! async trait so deployments can wire real backends while tests use the
//! in-memory implementations below. The engine wraps every call in a timeout
//! and degrades to "field absent" on expiry; a slow collaborator never aborts
//! a calculation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{EquipmentData, ExtractedRBIData};

/// Quality report for one equipment item's gathered data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityReport {
    /// Fraction of expected fields that are present, [0,1]
    pub completeness: f64,
    pub issues: Vec<String>,
}

/// Equipment master-data registry.
#[async_trait]
pub trait EquipmentDataService: Send + Sync {
    async fn get_equipment_data(&self, equipment_id: &str) -> Option<EquipmentData>;
}

/// Inspection-report parameter extraction.
#[async_trait]
pub trait ReportDataExtractor: Send + Sync {
    async fn extract_rbi_parameters(&self, equipment_id: &str) -> ExtractedRBIData;
}

/// Gathered-data quality assessment.
#[async_trait]
pub trait DataQualityAssessor: Send + Sync {
    async fn assess_data_quality(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
    ) -> DataQualityReport;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Registry backed by a fixed map. Used by tests and replay tooling.
#[derive(Default)]
pub struct InMemoryEquipmentRegistry {
    items: HashMap<String, EquipmentData>,
}

impl InMemoryEquipmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, equipment: EquipmentData) {
        self.items.insert(equipment.equipment_id.clone(), equipment);
    }
}

#[async_trait]
impl EquipmentDataService for InMemoryEquipmentRegistry {
    async fn get_equipment_data(&self, equipment_id: &str) -> Option<EquipmentData> {
        self.items.get(equipment_id).cloned()
    }
}

/// Extractor backed by pre-extracted data; unknown equipment yields the
/// empty extraction, the same degraded shape a timeout produces.
#[derive(Default)]
pub struct StaticReportExtractor {
    data: HashMap<String, ExtractedRBIData>,
}

impl StaticReportExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, extracted: ExtractedRBIData) {
        self.data.insert(extracted.equipment_id.clone(), extracted);
    }
}

#[async_trait]
impl ReportDataExtractor for StaticReportExtractor {
    async fn extract_rbi_parameters(&self, equipment_id: &str) -> ExtractedRBIData {
        self.data
            .get(equipment_id)
            .cloned()
            .unwrap_or_else(|| ExtractedRBIData::empty(equipment_id))
    }
}

/// Default assessor: field-presence completeness plus named issues.
#[derive(Default)]
pub struct HeuristicQualityAssessor;

impl HeuristicQualityAssessor {
    /// Synchronous core, also used by the engine when the configured
    /// assessor times out.
    pub fn assess(equipment: &EquipmentData, extracted: &ExtractedRBIData) -> DataQualityReport {
        let mut issues = Vec::new();

        let checks = [
            (extracted.corrosion_rate.is_some(), "corrosion_rate missing"),
            (
                !extracted.thickness_measurements.is_empty(),
                "no thickness measurements",
            ),
            (
                extracted.last_inspection_date.is_some(),
                "no inspection history",
            ),
            (
                !extracted.damage_mechanisms.is_empty(),
                "no damage mechanisms recorded",
            ),
            (
                extracted.coating_condition.is_some(),
                "coating condition unknown",
            ),
            (!equipment.material.is_empty(), "material unknown"),
        ];

        let present = checks.iter().filter(|(ok, _)| *ok).count();
        for (ok, issue) in &checks {
            if !ok {
                issues.push((*issue).to_string());
            }
        }

        DataQualityReport {
            completeness: present as f64 / checks.len() as f64,
            issues,
        }
    }
}

#[async_trait]
impl DataQualityAssessor for HeuristicQualityAssessor {
    async fn assess_data_quality(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
    ) -> DataQualityReport {
        Self::assess(equipment, extracted)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CriticalityLevel;
    use chrono::{Duration, Utc};

    fn equipment() -> EquipmentData {
        EquipmentData::new(
            "V-1",
            "pressure_vessel",
            "water",
            Utc::now() - Duration::days(3650),
            10.0,
            80.0,
            "carbon_steel",
            CriticalityLevel::Medium,
            "offsite",
            2.0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn registry_returns_none_for_unknown_id() {
        let registry = InMemoryEquipmentRegistry::new();
        assert!(registry.get_equipment_data("nope").await.is_none());
    }

    #[tokio::test]
    async fn extractor_degrades_to_empty_extraction() {
        let extractor = StaticReportExtractor::new();
        let data = extractor.extract_rbi_parameters("V-9").await;
        assert_eq!(data.equipment_id, "V-9");
        assert_eq!(data.thickness_count(), 0);
    }

    #[test]
    fn empty_extraction_scores_low_completeness() {
        let report =
            HeuristicQualityAssessor::assess(&equipment(), &ExtractedRBIData::empty("V-1"));
        assert!(report.completeness < 0.3);
        assert!(!report.issues.is_empty());
    }
}
