//! RBI Calculation Engine — orchestration
//!
//! The engine owns the full calculation pipeline for one equipment item:
//!
//! 1. Gather equipment data, extracted inspection parameters and a data
//!    quality report from the injected collaborators, each under a timeout.
//! 2. Ask the level manager which calculation tier the data supports.
//! 3. Run the chosen calculator, stepping down a tier on internal failure.
//! 4. Apply fallback conservatism when the result came from a lower tier
//!    than requested.
//! 5. Record the outcome in the audit trail and the prediction tracker.
//!
//! The public entry points never return an error for a normal invocation:
//! any failure degrades to a conservative emergency result that names what
//! was missing. Callers distinguish degraded results by inspecting
//! `fallback_occurred`, `missing_data` and `confidence_score`, not by
//! catching errors.

pub mod context;
pub mod sources;

pub use context::EngineContext;
pub use sources::{
    DataQualityAssessor, DataQualityReport, EquipmentDataService, HeuristicQualityAssessor,
    InMemoryEquipmentRegistry, ReportDataExtractor, StaticReportExtractor,
};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::calculators::{calculator_for, FallbackManager, Level1Calculator};
use crate::levels::{CalculationSummary, LevelDecision, RBILevelManager};
use crate::types::{
    CalculationLevel, EquipmentData, ExtractedRBIData, RBICalculationResult, RiskLevel,
};

/// Concurrent calculations inside one batch run when the caller passes 0.
const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Confidence assigned to emergency fallback results.
const EMERGENCY_CONFIDENCE: f64 = 0.1;

/// Cheap clonable handle over the shared [`EngineContext`].
#[derive(Clone)]
pub struct RBICalculationEngine {
    ctx: Arc<EngineContext>,
}

impl RBICalculationEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Calculate the next inspection date for one equipment item.
    ///
    /// Never fails: absent equipment, collaborator timeouts and calculator
    /// faults all degrade to a conservative result. Unless
    /// `force_recalculation` is set, a result already computed under the
    /// current config version for the same requested level is returned from
    /// the cache without re-running the pipeline.
    pub async fn calculate_next_inspection_date(
        &self,
        equipment_id: &str,
        requested_level: Option<CalculationLevel>,
        force_recalculation: bool,
    ) -> RBICalculationResult {
        let config = self.ctx.config.snapshot();
        let now = Utc::now();
        let target = requested_level.unwrap_or(CalculationLevel::Level3);

        if !force_recalculation {
            if let Some(cached) = self.ctx.cached_result(equipment_id, target, config.version) {
                debug!(equipment_id, "Returning cached calculation result");
                return cached;
            }
        }

        // Gather phase. A missing or unreachable registry entry is the one
        // case with nothing to calculate from.
        let equipment = match timeout(
            self.ctx.gather_timeout,
            self.ctx.equipment_service.get_equipment_data(equipment_id),
        )
        .await
        {
            Ok(Some(equipment)) => equipment,
            Ok(None) => {
                error!(equipment_id, "Equipment not found in registry");
                self.ctx
                    .audit
                    .record_error(Some(equipment_id), "equipment not found in registry");
                return self.emergency_fallback_result(equipment_id, target, &config);
            }
            Err(_) => {
                error!(equipment_id, "Equipment registry timed out");
                self.ctx
                    .audit
                    .record_error(Some(equipment_id), "equipment registry timed out");
                return self.emergency_fallback_result(equipment_id, target, &config);
            }
        };

        let extracted = match timeout(
            self.ctx.gather_timeout,
            self.ctx.extractor.extract_rbi_parameters(equipment_id),
        )
        .await
        {
            Ok(extracted) => extracted,
            Err(_) => {
                warn!(equipment_id, "Report extraction timed out, continuing without");
                ExtractedRBIData::empty(equipment_id)
            }
        };

        let quality = match timeout(
            self.ctx.gather_timeout,
            self.ctx.assessor.assess_data_quality(&equipment, &extracted),
        )
        .await
        {
            Ok(report) => report,
            Err(_) => HeuristicQualityAssessor::assess(&equipment, &extracted),
        };

        // Level selection, then calculation with step-down on internal fault.
        let manager = RBILevelManager::new(config.clone());
        let decision =
            manager.determine_calculation_level(&equipment, &extracted, requested_level, now);

        let mut level = decision.level;
        let mut cascade_reasons = decision.missing_requirements.clone();
        let mut result = loop {
            if level == CalculationLevel::Level1 {
                break Level1Calculator::calculate_with_fallback_protection(
                    &equipment,
                    &extracted,
                    &config,
                    now,
                    quality.completeness,
                );
            }
            match calculator_for(level).calculate(&equipment, &extracted, &config, now) {
                Ok(result) => break result,
                Err(fault) => {
                    warn!(equipment_id, %level, %fault, "Calculator refused, stepping down");
                    cascade_reasons.push(fault.to_string());
                    level = level.next_lower().unwrap_or(CalculationLevel::Level1);
                }
            }
        };

        result.requested_level = target;
        result.fallback_occurred = result.calculation_level != target;

        if result.fallback_occurred {
            let fallback = FallbackManager::new(config.clone());
            let adjusted_decision = LevelDecision {
                level: result.calculation_level,
                fallback_occurred: true,
                missing_requirements: cascade_reasons,
            };
            let adjustment = fallback.adjustment_for(&adjusted_decision, &extracted, now);
            fallback.apply(&mut result, &adjustment, now);
        }

        info!(
            equipment_id,
            level = %result.calculation_level,
            risk = %result.risk_level,
            interval = result.inspection_interval_months,
            fallback = result.fallback_occurred,
            "Calculation complete"
        );

        self.ctx.audit.record_calculation(&result);
        self.ctx.predictions.record_prediction(&result);
        self.ctx.store_cached_result(target, config.version, &result);
        result
    }

    /// Calculate a batch of equipment items concurrently, at most
    /// `max_parallel` at a time (0 selects the default). Results come back
    /// in input order; one item's failure or timeout never affects its
    /// siblings, it just becomes that item's emergency result.
    pub async fn calculate_batch(
        &self,
        equipment_ids: &[String],
        requested_level: Option<CalculationLevel>,
        max_parallel: usize,
    ) -> Vec<RBICalculationResult> {
        let permits = if max_parallel == 0 {
            DEFAULT_BATCH_CONCURRENCY
        } else {
            max_parallel
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut handles = Vec::with_capacity(equipment_ids.len());

        for equipment_id in equipment_ids {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            let equipment_id = equipment_id.clone();
            handles.push(tokio::spawn(async move {
                // Semaphore closes only on drop, so acquire cannot fail here.
                let _permit = semaphore.acquire_owned().await;
                timeout(
                    engine.ctx.item_timeout,
                    engine.calculate_next_inspection_date(&equipment_id, requested_level, false),
                )
                .await
            }));
        }

        let config = self.ctx.config.snapshot();
        let target = requested_level.unwrap_or(CalculationLevel::Level3);
        let joined = futures::future::join_all(handles).await;
        let mut results = Vec::with_capacity(equipment_ids.len());
        for (outcome, equipment_id) in joined.into_iter().zip(equipment_ids) {
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => {
                    error!(equipment_id = %equipment_id, "Batch item timed out");
                    self.emergency_fallback_result(equipment_id, target, &config)
                }
                Err(join_error) => {
                    error!(equipment_id = %equipment_id, %join_error, "Batch worker aborted");
                    self.emergency_fallback_result(equipment_id, target, &config)
                }
            };
            results.push(result);
        }

        let emergencies = results.iter().filter(|r| r.is_emergency()).count();
        self.ctx.audit.record_batch_operation(
            equipment_ids.len(),
            results.len() - emergencies,
            emergencies,
        );
        results
    }

    /// Per-level capability report for one equipment item. None when the
    /// equipment is not in the registry.
    pub async fn get_calculation_summary(
        &self,
        equipment_id: &str,
    ) -> Option<CalculationSummary> {
        let equipment = self
            .ctx
            .equipment_service
            .get_equipment_data(equipment_id)
            .await?;
        let extracted = self.ctx.extractor.extract_rbi_parameters(equipment_id).await;
        let config = self.ctx.config.snapshot();
        Some(RBILevelManager::new(config).calculation_summary(
            &equipment,
            &extracted,
            Utc::now(),
        ))
    }

    /// Attach an observed outcome to a recorded prediction, feeding the
    /// learning loop. Returns false for an unknown or already-closed
    /// prediction.
    pub fn record_inspection_outcome(
        &self,
        equipment_id: &str,
        prediction_id: u64,
        outcome: crate::learning::ActualOutcome,
    ) -> bool {
        let recorded = self
            .ctx
            .predictions
            .record_actual_outcome(equipment_id, prediction_id, outcome);
        if recorded {
            self.ctx.audit.record_data_update(
                equipment_id,
                None,
                "inspection outcome recorded against prediction",
            );
        }
        recorded
    }

    /// Maximally conservative result used when nothing can be calculated.
    fn emergency_fallback_result(
        &self,
        equipment_id: &str,
        requested_level: CalculationLevel,
        config: &crate::config::RBIConfig,
    ) -> RBICalculationResult {
        let now = Utc::now();
        let interval = config.fallback_settings.emergency_interval_months.max(1);
        RBICalculationResult {
            equipment_id: equipment_id.to_string(),
            calculation_level: CalculationLevel::Level1,
            requested_level,
            fallback_occurred: true,
            risk_level: RiskLevel::High,
            pof_score: 4.0,
            cof_scores: HashMap::new(),
            confidence_score: EMERGENCY_CONFIDENCE,
            data_quality_score: 0.0,
            calculation_date: now,
            next_inspection_date: RBICalculationResult::next_date(now, interval),
            inspection_interval_months: interval,
            missing_data: vec![RBICalculationResult::EMERGENCY_MISSING_DATA.to_string()],
            estimated_parameters: Vec::new(),
            input_parameters: HashMap::new(),
            remaining_life_years: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigManager, RBIConfig};
    use crate::types::{CriticalityLevel, InspectionQuality, ThicknessMeasurement};
    use chrono::Duration;

    fn equipment(id: &str) -> EquipmentData {
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

    fn rich_extraction(id: &str) -> ExtractedRBIData {
        let now = Utc::now();
        let inspected = now - Duration::days(60);
        let mut data = ExtractedRBIData::empty(id).with_corrosion_rate(0.1).unwrap();
        data.thickness_measurements = (0..4)
            .map(|i| {
                ThicknessMeasurement::new(
                    &format!("cml-{i}"),
                    12.0 - i as f64 * 0.1,
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

    fn engine_with(
        items: Vec<EquipmentData>,
        extractions: Vec<ExtractedRBIData>,
    ) -> RBICalculationEngine {
        let mut registry = InMemoryEquipmentRegistry::new();
        for item in items {
            registry.insert(item);
        }
        let mut extractor = StaticReportExtractor::new();
        for extraction in extractions {
            extractor.insert(extraction);
        }
        RBICalculationEngine::new(EngineContext::new(
            Arc::new(ConfigManager::new(RBIConfig::default())),
            Arc::new(registry),
            Arc::new(extractor),
        ))
    }

    #[tokio::test]
    async fn unknown_equipment_yields_emergency_result() {
        let engine = engine_with(vec![], vec![]);
        let result = engine
            .calculate_next_inspection_date("ghost", None, false)
            .await;

        assert!(result.fallback_occurred);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!((result.confidence_score - 0.1).abs() < 1e-9);
        assert_eq!(result.inspection_interval_months, 6);
        assert_eq!(result.missing_data, vec!["All required data".to_string()]);
    }

    #[tokio::test]
    async fn complete_data_runs_level3_without_fallback() {
        let engine = engine_with(
            vec![equipment("101-E-401A")],
            vec![rich_extraction("101-E-401A")],
        );
        let result = engine
            .calculate_next_inspection_date("101-E-401A", Some(CalculationLevel::Level3), false)
            .await;

        assert_eq!(result.calculation_level, CalculationLevel::Level3);
        assert!(!result.fallback_occurred);
        assert!(result.remaining_life_years.is_some());
        assert!(result.confidence_score >= 0.6);
    }

    #[tokio::test]
    async fn bare_equipment_cascades_and_is_conservative() {
        let engine = engine_with(vec![equipment("V-1")], vec![]);
        let result = engine
            .calculate_next_inspection_date("V-1", None, false)
            .await;

        assert_eq!(result.calculation_level, CalculationLevel::Level1);
        assert!(result.fallback_occurred);
        assert!(!result.missing_data.is_empty());
        assert!(result.confidence_score < 0.5);
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_isolates_failures() {
        let engine = engine_with(
            vec![equipment("V-1"), equipment("V-3")],
            vec![rich_extraction("V-1"), rich_extraction("V-3")],
        );
        let ids = vec!["V-1".to_string(), "V-2".to_string(), "V-3".to_string()];
        let results = engine.calculate_batch(&ids, None, 0).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].equipment_id, "V-1");
        assert_eq!(results[1].equipment_id, "V-2");
        assert_eq!(results[2].equipment_id, "V-3");
        // The unknown middle item degrades alone.
        assert!((results[1].confidence_score - 0.1).abs() < 1e-9);
        assert!(!results[0].fallback_occurred);
        assert!(!results[2].fallback_occurred);
    }

    #[tokio::test]
    async fn batch_audit_counts_synthesized_emergencies_not_low_confidence() {
        // "V-1" exists with no inspection data: a legitimate Level 1
        // fallback result however far its confidence is penalized.
        // "ghost" is truly absent and gets a synthesized emergency result.
        let engine = engine_with(vec![equipment("V-1")], vec![]);
        let ids = vec!["V-1".to_string(), "ghost".to_string()];
        let results = engine.calculate_batch(&ids, None, 0).await;

        assert!(!results[0].is_emergency());
        assert!(results[1].is_emergency());

        let batch_events = engine
            .context()
            .audit
            .events_of_type(crate::audit::AuditEventType::BatchOperation);
        assert_eq!(batch_events.len(), 1);
        assert_eq!(batch_events[0].details["emergency"], "1");
        assert_eq!(batch_events[0].details["succeeded"], "1");
    }

    #[tokio::test]
    async fn calculations_are_audited_and_tracked() {
        let engine = engine_with(
            vec![equipment("V-1")],
            vec![rich_extraction("V-1")],
        );
        engine.calculate_next_inspection_date("V-1", None, false).await;

        assert_eq!(engine.context().predictions.total_predictions(), 1);
        assert_eq!(engine.context().audit.events_for("V-1").len(), 1);
    }

    #[tokio::test]
    async fn unforced_repeat_is_served_from_cache() {
        let engine = engine_with(
            vec![equipment("V-1")],
            vec![rich_extraction("V-1")],
        );
        let first = engine.calculate_next_inspection_date("V-1", None, false).await;
        let second = engine.calculate_next_inspection_date("V-1", None, false).await;

        assert_eq!(first.calculation_date, second.calculation_date);
        // Cached replays record nothing new.
        assert_eq!(engine.context().predictions.total_predictions(), 1);
        assert_eq!(engine.context().audit.events_for("V-1").len(), 1);

        let third = engine.calculate_next_inspection_date("V-1", None, true).await;
        assert!(third.calculation_date >= first.calculation_date);
        assert_eq!(engine.context().predictions.total_predictions(), 2);
    }

    #[tokio::test]
    async fn config_update_invalidates_cached_results() {
        let engine = engine_with(
            vec![equipment("V-1")],
            vec![rich_extraction("V-1")],
        );
        engine.calculate_next_inspection_date("V-1", None, false).await;

        engine
            .context()
            .config
            .update(RBIConfig::default())
            .unwrap();
        engine.calculate_next_inspection_date("V-1", None, false).await;

        assert_eq!(engine.context().predictions.total_predictions(), 2);
    }

    #[tokio::test]
    async fn summary_available_for_known_equipment_only() {
        let engine = engine_with(
            vec![equipment("V-1")],
            vec![rich_extraction("V-1")],
        );
        let summary = engine.get_calculation_summary("V-1").await.unwrap();
        assert_eq!(summary.levels.len(), 3);
        assert!(engine.get_calculation_summary("ghost").await.is_none());
    }
}
