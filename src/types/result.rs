//! Calculation result types
//!
//! One `RBICalculationResult` per calculation invocation, immutable once
//! produced. Degraded outcomes are self-describing: `fallback_occurred`,
//! `missing_data`, `estimated_parameters` and the reduced confidence score
//! tell downstream consumers how much to trust the numbers without reading
//! logs.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// RBI risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Ordinal used for trend and bias arithmetic (Low=1 … VeryHigh=4).
    pub fn ordinal(&self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::VeryHigh => 4,
        }
    }

    /// Inverse of [`RiskLevel::ordinal`], clamped to the valid range.
    pub fn from_ordinal(ordinal: i64) -> Self {
        match ordinal {
            i64::MIN..=1 => RiskLevel::Low,
            2 => RiskLevel::Medium,
            3 => RiskLevel::High,
            _ => RiskLevel::VeryHigh,
        }
    }

    /// Config key used by the interval-per-risk-level map.
    pub fn as_key(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::VeryHigh => write!(f, "VERY_HIGH"),
        }
    }
}

/// Calculation tier, ordered by data appetite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationLevel {
    Level1,
    Level2,
    Level3,
}

impl CalculationLevel {
    /// The next less data-hungry tier, if any.
    pub fn next_lower(&self) -> Option<CalculationLevel> {
        match self {
            CalculationLevel::Level3 => Some(CalculationLevel::Level2),
            CalculationLevel::Level2 => Some(CalculationLevel::Level1),
            CalculationLevel::Level1 => None,
        }
    }

    /// Tiers from most to least data-hungry.
    pub fn descending() -> [CalculationLevel; 3] {
        [
            CalculationLevel::Level3,
            CalculationLevel::Level2,
            CalculationLevel::Level1,
        ]
    }
}

impl std::fmt::Display for CalculationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalculationLevel::Level1 => write!(f, "LEVEL_1"),
            CalculationLevel::Level2 => write!(f, "LEVEL_2"),
            CalculationLevel::Level3 => write!(f, "LEVEL_3"),
        }
    }
}

/// Result of one RBI calculation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RBICalculationResult {
    pub equipment_id: String,
    /// Tier that actually produced the numbers
    pub calculation_level: CalculationLevel,
    /// Tier the caller asked for (or the auto-selected target)
    pub requested_level: CalculationLevel,
    /// True when any cascade away from the requested tier occurred
    pub fallback_occurred: bool,
    pub risk_level: RiskLevel,
    /// PoF score in [0,5], or an annual failure probability in [0,1] for Level 3
    pub pof_score: f64,
    /// CoF per dimension ("safety", "environmental", "economic", "business"), each in [1,5]
    pub cof_scores: HashMap<String, f64>,
    /// Trust in the result, [0,1]
    pub confidence_score: f64,
    /// Quality of the input data, [0,1]
    pub data_quality_score: f64,
    pub calculation_date: DateTime<Utc>,
    pub next_inspection_date: DateTime<Utc>,
    /// Recommended interval, strictly positive
    pub inspection_interval_months: u32,
    /// Mandatory or expected fields that were absent
    pub missing_data: Vec<String>,
    /// Parameters that were defaulted rather than measured
    pub estimated_parameters: Vec<String>,
    /// Numeric inputs that fed the calculation, for audit
    pub input_parameters: HashMap<String, f64>,
    /// Years until the governing location reaches minimum thickness
    pub remaining_life_years: Option<f64>,
}

impl RBICalculationResult {
    /// Marker placed in `missing_data` by emergency fallback synthesis.
    pub const EMERGENCY_MISSING_DATA: &'static str = "All required data";

    /// Next inspection date for an interval starting now.
    pub fn next_date(now: DateTime<Utc>, interval_months: u32) -> DateTime<Utc> {
        now.checked_add_months(Months::new(interval_months))
            .unwrap_or(now)
    }

    /// True when the result was synthesized because nothing could be
    /// calculated, as opposed to a legitimate low-confidence calculation.
    pub fn is_emergency(&self) -> bool {
        self.missing_data
            .iter()
            .any(|m| m == Self::EMERGENCY_MISSING_DATA)
    }

    /// Weighted-average CoF across dimensions, [1,5]; 1.0 when empty.
    pub fn combined_cof(&self) -> f64 {
        if self.cof_scores.is_empty() {
            return 1.0;
        }
        let sum: f64 = self.cof_scores.values().sum();
        sum / self.cof_scores.len() as f64
    }
}

// ============================================================================
// Tests
// ============================================================================
