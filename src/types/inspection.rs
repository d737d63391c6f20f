//! Extracted inspection data
//!
//! `ExtractedRBIData` is assembled per calculation call from inspection-report
//! extraction. It is never persisted by the core; every field except the
//! equipment id is optional and the level manager decides what the available
//! fields are good for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::equipment::ValidationError;

/// Severity of an individual inspection finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Coating condition reported by the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoatingCondition {
    Excellent,
    Moderate,
    None,
}

/// Overall quality of the inspection campaign the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionQuality {
    Good,
    Average,
    Poor,
}

impl InspectionQuality {
    /// Categorical quality score used by the level manager's blend.
    pub fn score(&self) -> f64 {
        match self {
            InspectionQuality::Good => 1.0,
            InspectionQuality::Average => 0.7,
            InspectionQuality::Poor => 0.4,
        }
    }
}

/// A single wall-thickness reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThicknessMeasurement {
    /// Measurement location (e.g., "shell_course_2")
    pub location: String,
    /// Measured wall thickness (mm), strictly positive
    pub thickness: f64,
    /// When the reading was taken
    pub measurement_date: DateTime<Utc>,
    /// Code-required minimum wall thickness (mm), strictly positive
    pub minimum_required: f64,
    /// Measurement method (e.g., "UT")
    pub method: String,
    /// Inspector identifier
    pub inspector: String,
}

impl ThicknessMeasurement {
    /// Build a validated thickness reading.
    ///
    /// A reading below 50% of the required minimum is treated as critically
    /// low and rejected outright; such equipment needs immediate engineering
    /// review, not an RBI interval.
    pub fn new(
        location: &str,
        thickness: f64,
        measurement_date: DateTime<Utc>,
        minimum_required: f64,
        method: &str,
        inspector: &str,
    ) -> Result<Self, ValidationError> {
        if thickness <= 0.0 {
            return Err(ValidationError::NonPositiveThickness(
                thickness,
                location.to_string(),
            ));
        }
        if minimum_required <= 0.0 {
            return Err(ValidationError::NonPositiveMinimum(
                minimum_required,
                location.to_string(),
            ));
        }
        if thickness < 0.5 * minimum_required {
            return Err(ValidationError::CriticalThickness {
                location: location.to_string(),
                thickness,
                minimum_required,
            });
        }

        Ok(Self {
            location: location.to_string(),
            thickness,
            measurement_date,
            minimum_required,
            method: method.to_string(),
            inspector: inspector.to_string(),
        })
    }

    /// Ratio of measured thickness to the required minimum.
    pub fn thickness_ratio(&self) -> f64 {
        self.thickness / self.minimum_required
    }
}

/// A qualitative finding from an inspection report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionFinding {
    pub description: String,
    pub severity: SeverityLevel,
}

/// RBI parameters extracted from inspection reports for one equipment item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRBIData {
    pub equipment_id: String,
    pub thickness_measurements: Vec<ThicknessMeasurement>,
    /// Linear corrosion rate (mm/yr), non-negative when present
    pub corrosion_rate: Option<f64>,
    pub coating_condition: Option<CoatingCondition>,
    /// Active damage mechanisms (e.g., "general_corrosion", "scc")
    pub damage_mechanisms: BTreeSet<String>,
    pub inspection_findings: Vec<InspectionFinding>,
    pub last_inspection_date: Option<DateTime<Utc>>,
    pub inspection_quality: InspectionQuality,
}

impl ExtractedRBIData {
    /// Empty extraction for an equipment id — the shape the engine degrades
    /// to when the extractor is unavailable or times out.
    pub fn empty(equipment_id: impl Into<String>) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            thickness_measurements: Vec::new(),
            corrosion_rate: None,
            coating_condition: None,
            damage_mechanisms: BTreeSet::new(),
            inspection_findings: Vec::new(),
            last_inspection_date: None,
            inspection_quality: InspectionQuality::Poor,
        }
    }

    /// Set a validated corrosion rate.
    pub fn with_corrosion_rate(mut self, rate: f64) -> Result<Self, ValidationError> {
        if rate < 0.0 {
            return Err(ValidationError::NegativeCorrosionRate(rate));
        }
        self.corrosion_rate = Some(rate);
        Ok(self)
    }

    /// Number of thickness points available.
    pub fn thickness_count(&self) -> usize {
        self.thickness_measurements.len()
    }

    /// The reading with the lowest thickness-to-minimum ratio — the governing
    /// location for remaining-life purposes.
    pub fn governing_measurement(&self) -> Option<&ThicknessMeasurement> {
        self.thickness_measurements.iter().min_by(|a, b| {
            a.thickness_ratio()
                .partial_cmp(&b.thickness_ratio())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Minimum thickness ratio across all readings, when any exist.
    pub fn min_thickness_ratio(&self) -> Option<f64> {
        self.governing_measurement().map(|m| m.thickness_ratio())
    }

    /// Days since the last inspection, when known.
    pub fn days_since_inspection(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_inspection_date
            .map(|d| (now - d).num_days().max(0))
    }

    /// Highest finding severity, when any findings exist.
    pub fn max_finding_severity(&self) -> Option<SeverityLevel> {
        self.inspection_findings.iter().map(|f| f.severity).max()
    }
}

// ============================================================================
// Tests
// ============================================================================
