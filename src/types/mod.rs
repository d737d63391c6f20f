//! Shared domain types for the RBI calculation engine
//!
//! All entities validate their invariants at construction time; an invalid
//! entity never enters the calculation pipeline.

mod equipment;
mod inspection;
mod result;

pub use equipment::{CriticalityLevel, EquipmentData, ValidationError};
pub use inspection::{
    CoatingCondition, ExtractedRBIData, InspectionFinding, InspectionQuality, SeverityLevel,
    ThicknessMeasurement,
};
pub use result::{CalculationLevel, RBICalculationResult, RiskLevel};
