//! Audit trail and historical trend analysis
//!
//! Every significant engine action lands here as an immutable `AuditEvent`
//! with a monotonically assigned ID. Calculation events also append to a
//! per-equipment historical series, which trend analysis reads to classify
//! the risk trajectory. The trail is append-only; `verify_integrity` checks
//! ordering and ID uniqueness after the fact rather than preventing writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::types::{RBICalculationResult, RiskLevel};

/// Minimum historical points before a trend is reported.
const MIN_TREND_POINTS: usize = 3;

/// Least-squares slope magnitude below which the trend reads as stable,
/// in risk ordinal per data point.
const STABLE_SLOPE_EPSILON: f64 = 0.05;

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Calculation,
    ConfigurationChange,
    DataUpdate,
    BatchOperation,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// One immutable entry in the trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub equipment_id: Option<String>,
    pub user_id: Option<String>,
    pub description: String,
    pub details: HashMap<String, String>,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
}

/// One calculation snapshot in an equipment's historical series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalDataPoint {
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub pof_score: f64,
    pub confidence_score: f64,
    pub inspection_interval_months: u32,
    pub fallback_occurred: bool,
}

// ============================================================================
// Trend analysis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

/// Trend over one equipment's historical risk series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub equipment_id: String,
    pub direction: TrendDirection,
    /// Least-squares slope of risk ordinal per data point
    pub slope: f64,
    pub mean_risk_ordinal: f64,
    pub risk_ordinal_std_dev: f64,
    pub mean_confidence: f64,
    pub data_points: usize,
    pub recommendations: Vec<String>,
}

/// Integrity check outcome for the whole trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_events: usize,
    pub ordering_violations: usize,
    pub duplicate_ids: usize,
    pub intact: bool,
}

// ============================================================================
// Service
// ============================================================================

/// Append-only audit trail with per-equipment historical series.
#[derive(Default)]
pub struct AuditTrailService {
    events: Mutex<Vec<AuditEvent>>,
    history: Mutex<HashMap<String, Vec<HistoricalDataPoint>>>,
    next_id: AtomicU64,
}

impl AuditTrailService {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, mut event: AuditEvent) -> u64 {
        event.event_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = event.event_id;
        if event.severity >= AuditSeverity::Warning {
            warn!(
                event_id = id,
                event_type = ?event.event_type,
                description = %event.description,
                "Audit event"
            );
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        id
    }

    /// Record a completed calculation. Severity escalates for fallback
    /// outcomes and for VeryHigh risk.
    pub fn record_calculation(&self, result: &RBICalculationResult) -> u64 {
        let severity = if result.risk_level == RiskLevel::VeryHigh {
            AuditSeverity::Critical
        } else if result.fallback_occurred {
            AuditSeverity::Warning
        } else {
            AuditSeverity::Info
        };

        let mut details = HashMap::new();
        details.insert("level".to_string(), result.calculation_level.to_string());
        details.insert("risk".to_string(), result.risk_level.to_string());
        details.insert(
            "interval_months".to_string(),
            result.inspection_interval_months.to_string(),
        );
        details.insert(
            "confidence".to_string(),
            format!("{:.2}", result.confidence_score),
        );
        details.insert(
            "fallback".to_string(),
            result.fallback_occurred.to_string(),
        );

        if let Ok(mut history) = self.history.lock() {
            history
                .entry(result.equipment_id.clone())
                .or_default()
                .push(HistoricalDataPoint {
                    timestamp: result.calculation_date,
                    risk_level: result.risk_level,
                    pof_score: result.pof_score,
                    confidence_score: result.confidence_score,
                    inspection_interval_months: result.inspection_interval_months,
                    fallback_occurred: result.fallback_occurred,
                });
        }

        self.append(AuditEvent {
            event_id: 0,
            timestamp: Utc::now(),
            event_type: AuditEventType::Calculation,
            severity,
            equipment_id: Some(result.equipment_id.clone()),
            user_id: None,
            description: format!(
                "{} calculation: {} risk, {}-month interval",
                result.calculation_level, result.risk_level,
                result.inspection_interval_months
            ),
            details,
            before_state: None,
            after_state: None,
        })
    }

    /// Record a configuration change with serialized before/after state.
    pub fn record_configuration_change(
        &self,
        user_id: Option<&str>,
        description: &str,
        before_state: String,
        after_state: String,
    ) -> u64 {
        self.append(AuditEvent {
            event_id: 0,
            timestamp: Utc::now(),
            event_type: AuditEventType::ConfigurationChange,
            severity: AuditSeverity::Warning,
            equipment_id: None,
            user_id: user_id.map(String::from),
            description: description.to_string(),
            details: HashMap::new(),
            before_state: Some(before_state),
            after_state: Some(after_state),
        })
    }

    /// Record an update to one equipment's stored data.
    pub fn record_data_update(
        &self,
        equipment_id: &str,
        user_id: Option<&str>,
        description: &str,
    ) -> u64 {
        self.append(AuditEvent {
            event_id: 0,
            timestamp: Utc::now(),
            event_type: AuditEventType::DataUpdate,
            severity: AuditSeverity::Info,
            equipment_id: Some(equipment_id.to_string()),
            user_id: user_id.map(String::from),
            description: description.to_string(),
            details: HashMap::new(),
            before_state: None,
            after_state: None,
        })
    }

    /// Record a batch run's outcome counts.
    pub fn record_batch_operation(
        &self,
        requested: usize,
        succeeded: usize,
        emergency_results: usize,
    ) -> u64 {
        let mut details = HashMap::new();
        details.insert("requested".to_string(), requested.to_string());
        details.insert("succeeded".to_string(), succeeded.to_string());
        details.insert("emergency".to_string(), emergency_results.to_string());
        self.append(AuditEvent {
            event_id: 0,
            timestamp: Utc::now(),
            event_type: AuditEventType::BatchOperation,
            severity: if emergency_results > 0 {
                AuditSeverity::Warning
            } else {
                AuditSeverity::Info
            },
            equipment_id: None,
            user_id: None,
            description: format!("batch calculation of {requested} equipment items"),
            details,
            before_state: None,
            after_state: None,
        })
    }

    /// Record an error the engine absorbed.
    pub fn record_error(&self, equipment_id: Option<&str>, description: &str) -> u64 {
        self.append(AuditEvent {
            event_id: 0,
            timestamp: Utc::now(),
            event_type: AuditEventType::Error,
            severity: AuditSeverity::Critical,
            equipment_id: equipment_id.map(String::from),
            user_id: None,
            description: description.to_string(),
            details: HashMap::new(),
            before_state: None,
            after_state: None,
        })
    }

    /// Events for one equipment, oldest first.
    pub fn events_for(&self, equipment_id: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.equipment_id.as_deref() == Some(equipment_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Events of one type, oldest first.
    pub fn events_of_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.event_type == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn total_events(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Historical calculation series for one equipment, oldest first.
    pub fn historical_series(&self, equipment_id: &str) -> Vec<HistoricalDataPoint> {
        self.history
            .lock()
            .map(|h| h.get(equipment_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Classify the risk trajectory from the historical series. None until
    /// the series holds at least three points.
    pub fn generate_trend_analysis(&self, equipment_id: &str) -> Option<TrendAnalysis> {
        let series = self.historical_series(equipment_id);
        if series.len() < MIN_TREND_POINTS {
            return None;
        }

        let ordinals: Vec<f64> = series
            .iter()
            .map(|p| p.risk_level.ordinal() as f64)
            .collect();
        let confidences: Vec<f64> =
            series.iter().map(|p| p.confidence_score).collect();

        let slope = least_squares_slope(&ordinals);
        let direction = if slope > STABLE_SLOPE_EPSILON {
            TrendDirection::Degrading
        } else if slope < -STABLE_SLOPE_EPSILON {
            TrendDirection::Improving
        } else {
            TrendDirection::Stable
        };

        let mean_risk = Statistics::mean(&ordinals);
        let std_dev = if ordinals.len() > 1 {
            Statistics::std_dev(&ordinals)
        } else {
            0.0
        };
        let mean_confidence = Statistics::mean(&confidences);

        let mut recommendations = Vec::new();
        match direction {
            TrendDirection::Degrading => {
                recommendations
                    .push("risk is rising; consider shortening the inspection interval".to_string());
                if mean_confidence < 0.6 {
                    recommendations.push(
                        "confidence is low; gather additional inspection data before acting"
                            .to_string(),
                    );
                }
            }
            TrendDirection::Improving => recommendations.push(
                "risk is falling; current inspection strategy appears effective".to_string(),
            ),
            TrendDirection::Stable => {
                if mean_risk >= RiskLevel::High.ordinal() as f64 {
                    recommendations.push(
                        "risk is stable but high; review mitigation options".to_string(),
                    );
                }
            }
        }
        let fallback_count = series.iter().filter(|p| p.fallback_occurred).count();
        if fallback_count * 2 > series.len() {
            recommendations.push(
                "most calculations fell back to a lower level; improve data collection"
                    .to_string(),
            );
        }

        info!(
            equipment_id,
            ?direction,
            slope,
            points = series.len(),
            "Trend analysis generated"
        );

        Some(TrendAnalysis {
            equipment_id: equipment_id.to_string(),
            direction,
            slope,
            mean_risk_ordinal: mean_risk,
            risk_ordinal_std_dev: std_dev,
            mean_confidence,
            data_points: series.len(),
            recommendations,
        })
    }

    /// Check the trail for timestamp ordering and duplicate event IDs.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let events = self
            .events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default();

        let ordering_violations = events
            .windows(2)
            .filter(|pair| pair[1].timestamp < pair[0].timestamp)
            .count();

        let mut seen = HashSet::new();
        let duplicate_ids = events
            .iter()
            .filter(|event| !seen.insert(event.event_id))
            .count();

        IntegrityReport {
            total_events: events.len(),
            ordering_violations,
            duplicate_ids,
            intact: ordering_violations == 0 && duplicate_ids == 0,
        }
    }
}

/// Least-squares slope over a series indexed 0..n.
fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (y - mean_y);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CalculationLevel;
    use chrono::Duration;

    fn result(
        equipment_id: &str,
        risk: RiskLevel,
        fallback: bool,
        when: DateTime<Utc>,
    ) -> RBICalculationResult {
        RBICalculationResult {
            equipment_id: equipment_id.to_string(),
            calculation_level: CalculationLevel::Level2,
            requested_level: CalculationLevel::Level2,
            fallback_occurred: fallback,
            risk_level: risk,
            pof_score: 3.0,
            cof_scores: HashMap::new(),
            confidence_score: 0.7,
            data_quality_score: 0.6,
            calculation_date: when,
            next_inspection_date: RBICalculationResult::next_date(when, 24),
            inspection_interval_months: 24,
            missing_data: Vec::new(),
            estimated_parameters: Vec::new(),
            input_parameters: HashMap::new(),
            remaining_life_years: None,
        }
    }

    #[test]
    fn calculation_severity_escalates() {
        let audit = AuditTrailService::new();
        let now = Utc::now();
        audit.record_calculation(&result("V-1", RiskLevel::Medium, false, now));
        audit.record_calculation(&result("V-1", RiskLevel::Medium, true, now));
        audit.record_calculation(&result("V-1", RiskLevel::VeryHigh, false, now));

        let events = audit.events_for("V-1");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].severity, AuditSeverity::Info);
        assert_eq!(events[1].severity, AuditSeverity::Warning);
        assert_eq!(events[2].severity, AuditSeverity::Critical);
    }

    #[test]
    fn trend_needs_three_points() {
        let audit = AuditTrailService::new();
        let now = Utc::now();
        audit.record_calculation(&result("V-1", RiskLevel::Low, false, now));
        audit.record_calculation(&result("V-1", RiskLevel::Medium, false, now));
        assert!(audit.generate_trend_analysis("V-1").is_none());
    }

    #[test]
    fn rising_risk_reads_as_degrading() {
        let audit = AuditTrailService::new();
        let start = Utc::now() - Duration::days(900);
        for (i, risk) in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High]
            .iter()
            .enumerate()
        {
            audit.record_calculation(&result(
                "V-1",
                *risk,
                false,
                start + Duration::days(300 * i as i64),
            ));
        }
        let trend = audit.generate_trend_analysis("V-1").unwrap();
        assert_eq!(trend.direction, TrendDirection::Degrading);
        assert!(trend.slope > 0.0);
        assert!(!trend.recommendations.is_empty());
    }

    #[test]
    fn flat_risk_reads_as_stable() {
        let audit = AuditTrailService::new();
        let now = Utc::now();
        for _ in 0..4 {
            audit.record_calculation(&result("V-1", RiskLevel::Medium, false, now));
        }
        let trend = audit.generate_trend_analysis("V-1").unwrap();
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!((trend.mean_risk_ordinal - 2.0).abs() < 1e-9);
    }

    #[test]
    fn trail_integrity_holds_for_normal_use() {
        let audit = AuditTrailService::new();
        let now = Utc::now();
        audit.record_calculation(&result("V-1", RiskLevel::Low, false, now));
        audit.record_data_update("V-1", Some("inspector-7"), "thickness survey uploaded");
        audit.record_configuration_change(
            Some("admin"),
            "risk matrix intervals updated",
            "{}".to_string(),
            "{}".to_string(),
        );
        audit.record_batch_operation(10, 9, 1);
        audit.record_error(Some("V-2"), "equipment not found in registry");

        let report = audit.verify_integrity();
        assert_eq!(report.total_events, 5);
        assert!(report.intact);
    }
}
