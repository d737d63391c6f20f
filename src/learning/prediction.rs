//! Prediction tracking
//!
//! Records every calculation's risk prediction and, later, the actually
//! observed risk, keyed per equipment in chronological order. This history
//! is the sole input to bias analysis; nothing else in the engine reads it.
//!
//! Appends are safe under concurrent batch workers: IDs come from an atomic
//! counter and each equipment's history is pushed in arrival order under one
//! lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::types::{RBICalculationResult, RiskLevel};

/// Ground truth attached to a prediction once the outcome is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualOutcome {
    pub actual_risk_level: RiskLevel,
    pub observed_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// One recorded prediction, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction_id: u64,
    pub equipment_id: String,
    pub prediction_date: DateTime<Utc>,
    pub predicted_risk_level: RiskLevel,
    pub predicted_interval_months: u32,
    pub confidence_at_prediction: f64,
    pub data_quality_at_prediction: f64,
    pub actual: Option<ActualOutcome>,
}

/// Append-only store of predictions and outcomes per equipment.
#[derive(Default)]
pub struct PredictionTracker {
    records: Mutex<HashMap<String, Vec<PredictionRecord>>>,
    next_id: AtomicU64,
}

impl PredictionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prediction from a calculation result. Returns the assigned
    /// prediction id.
    pub fn record_prediction(&self, result: &RBICalculationResult) -> u64 {
        let prediction_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = PredictionRecord {
            prediction_id,
            equipment_id: result.equipment_id.clone(),
            prediction_date: result.calculation_date,
            predicted_risk_level: result.risk_level,
            predicted_interval_months: result.inspection_interval_months,
            confidence_at_prediction: result.confidence_score,
            data_quality_at_prediction: result.data_quality_score,
            actual: None,
        };
        if let Ok(mut records) = self.records.lock() {
            records
                .entry(result.equipment_id.clone())
                .or_default()
                .push(record);
        }
        debug!(
            equipment_id = %result.equipment_id,
            prediction_id,
            risk = %result.risk_level,
            "Prediction recorded"
        );
        prediction_id
    }

    /// Attach the observed outcome to a prediction. Returns false when the
    /// prediction does not exist or already has an outcome.
    pub fn record_actual_outcome(
        &self,
        equipment_id: &str,
        prediction_id: u64,
        outcome: ActualOutcome,
    ) -> bool {
        let Ok(mut records) = self.records.lock() else {
            return false;
        };
        let Some(history) = records.get_mut(equipment_id) else {
            return false;
        };
        match history
            .iter_mut()
            .find(|r| r.prediction_id == prediction_id)
        {
            Some(record) if record.actual.is_none() => {
                record.actual = Some(outcome);
                true
            }
            _ => false,
        }
    }

    /// Full chronological history for one equipment.
    pub fn history(&self, equipment_id: &str) -> Vec<PredictionRecord> {
        self.records
            .lock()
            .map(|r| r.get(equipment_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Only the records with ground truth attached.
    pub fn completed_history(&self, equipment_id: &str) -> Vec<PredictionRecord> {
        self.history(equipment_id)
            .into_iter()
            .filter(|r| r.actual.is_some())
            .collect()
    }

    /// Total predictions across all equipment.
    pub fn total_predictions(&self) -> usize {
        self.records
            .lock()
            .map(|r| r.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
