//! RBI Engine: Risk-Based Inspection Scheduling
//!
//! Tiered risk calculation for industrial equipment inspection planning.
//!
//! ## Architecture
//!
//! - **Engine**: Orchestrates gather → level selection → calculate → record
//! - **Level Manager**: Data-sufficiency assessment and cascade decisions
//! - **Calculators**: Level 1 static tables, Level 2 weighted scoring,
//!   Level 3 quantitative degradation modelling
//! - **Learning**: Prediction tracking, bias correction, pattern catalogs
//! - **Audit**: Append-only trail and historical trend analysis

pub mod audit;
pub mod calculators;
pub mod config;
pub mod engine;
pub mod learning;
pub mod levels;
pub mod types;

// Re-export configuration surface
pub use config::{ConfigError, ConfigManager, RBIConfig};

// Re-export commonly used types
pub use types::{
    CalculationLevel, CoatingCondition, CriticalityLevel, EquipmentData, ExtractedRBIData,
    InspectionQuality, RBICalculationResult, RiskLevel, ThicknessMeasurement, ValidationError,
};

// Re-export the engine and its collaborator seams
pub use engine::{
    DataQualityAssessor, DataQualityReport, EngineContext, EquipmentDataService,
    InMemoryEquipmentRegistry, RBICalculationEngine, ReportDataExtractor,
    StaticReportExtractor,
};

// Re-export level management
pub use levels::{CalculationSummary, LevelCapability, LevelDecision, RBILevelManager};

// Re-export calculators
pub use calculators::{
    calculator_for, CalculationError, Calculator, FallbackManager, Level1Calculator,
    Level2Calculator, Level3Calculator,
};

// Re-export learning components
pub use learning::{
    ActualOutcome, AdaptiveParameterAdjuster, AdjustmentStrategy, BiasDirection,
    PatternRecognitionEngine, PredictionTracker,
};

// Re-export audit components
pub use audit::{AuditTrailService, TrendAnalysis, TrendDirection};
