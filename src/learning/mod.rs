//! Adaptive learning: prediction tracking, bias correction, pattern catalogs
//!
//! Learning closes the loop between predicted and observed risk. The
//! `PredictionTracker` stores every calculation's prediction and later its
//! ground truth; the `AdaptiveParameterAdjuster` turns accumulated bias into
//! bounded parameter nudges; the `PatternRecognitionEngine` clusters fleet
//! history into equipment families and degradation patterns that feed
//! recommendations back into analysis.

pub mod adjuster;
pub mod patterns;
pub mod prediction;

pub use adjuster::{
    AdaptiveParameterAdjuster, AdjustmentResult, AdjustmentStrategy, BiasAnalysis,
    BiasDirection, EffectivenessReport, ParameterAdjustment,
};
pub use patterns::{
    ConfidenceTier, DegradationPattern, EquipmentFamily, EquipmentHistory, FamilyMatch,
    LearningOutcome, PatternAnalysis, PatternMatch, PatternRecognitionEngine,
    RiskAdjustment,
};
pub use prediction::{ActualOutcome, PredictionRecord, PredictionTracker};
