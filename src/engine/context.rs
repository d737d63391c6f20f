//! Engine collaborator wiring
//!
//! All engine state lives here behind `Arc`s so the engine itself stays a
//! cheap clonable handle. Collaborators are injected at construction; the
//! quality assessor defaults to the heuristic one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audit::AuditTrailService;
use crate::config::ConfigManager;
use crate::learning::{PatternRecognitionEngine, PredictionTracker};
use crate::types::{CalculationLevel, RBICalculationResult};

use super::sources::{
    DataQualityAssessor, EquipmentDataService, HeuristicQualityAssessor, ReportDataExtractor,
};

/// Default wall-clock budget for gathering one equipment's input data.
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wall-clock budget for one item inside a batch run.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

/// One memoized calculation, valid only for the exact requested level and
/// configuration version it was produced under.
struct CachedResult {
    requested_level: CalculationLevel,
    config_version: u32,
    result: RBICalculationResult,
}

/// Shared state and collaborators behind one engine instance.
pub struct EngineContext {
    pub config: Arc<ConfigManager>,
    pub equipment_service: Arc<dyn EquipmentDataService>,
    pub extractor: Arc<dyn ReportDataExtractor>,
    pub assessor: Arc<dyn DataQualityAssessor>,
    pub patterns: Mutex<PatternRecognitionEngine>,
    pub predictions: Arc<PredictionTracker>,
    pub audit: Arc<AuditTrailService>,
    pub gather_timeout: Duration,
    pub item_timeout: Duration,
    results_cache: Mutex<HashMap<String, CachedResult>>,
}

impl EngineContext {
    pub fn new(
        config: Arc<ConfigManager>,
        equipment_service: Arc<dyn EquipmentDataService>,
        extractor: Arc<dyn ReportDataExtractor>,
    ) -> Self {
        let blend_rate = config.snapshot().learning_settings.confidence_blend_rate;
        Self {
            config,
            equipment_service,
            extractor,
            assessor: Arc::new(HeuristicQualityAssessor),
            patterns: Mutex::new(
                PatternRecognitionEngine::new().with_blend_rate(blend_rate),
            ),
            predictions: Arc::new(PredictionTracker::new()),
            audit: Arc::new(AuditTrailService::new()),
            gather_timeout: DEFAULT_GATHER_TIMEOUT,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            results_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Previously computed result for this equipment, if it was produced for
    /// the same requested level under the same configuration version.
    pub fn cached_result(
        &self,
        equipment_id: &str,
        requested_level: CalculationLevel,
        config_version: u32,
    ) -> Option<RBICalculationResult> {
        let cache = self.results_cache.lock().ok()?;
        cache.get(equipment_id).and_then(|entry| {
            (entry.requested_level == requested_level && entry.config_version == config_version)
                .then(|| entry.result.clone())
        })
    }

    /// Memoize a freshly computed result for unforced repeat requests.
    pub fn store_cached_result(
        &self,
        requested_level: CalculationLevel,
        config_version: u32,
        result: &RBICalculationResult,
    ) {
        if let Ok(mut cache) = self.results_cache.lock() {
            cache.insert(
                result.equipment_id.clone(),
                CachedResult {
                    requested_level,
                    config_version,
                    result: result.clone(),
                },
            );
        }
    }

    /// Replace the default heuristic quality assessor.
    pub fn with_assessor(mut self, assessor: Arc<dyn DataQualityAssessor>) -> Self {
        self.assessor = assessor;
        self
    }

    pub fn with_timeouts(mut self, gather: Duration, item: Duration) -> Self {
        self.gather_timeout = gather;
        self.item_timeout = item;
        self
    }
}
