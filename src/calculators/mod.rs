//! Tiered RBI calculators
//!
//! Three stateless calculators behind one strategy trait, selected by
//! calculation level:
//!
//! - `Level1Calculator`: static tables, works from the equipment snapshot alone
//! - `Level2Calculator`: semi-quantitative weighted scoring
//! - `Level3Calculator`: quantitative degradation modelling
//!
//! Calculators do not cascade themselves; the engine consults the level
//! manager, runs the chosen calculator, and steps down on failure.

mod fallback;
mod level1;
mod level2;
mod level3;

pub use fallback::{FallbackAdjustment, FallbackManager};
pub use level1::Level1Calculator;
pub use level2::Level2Calculator;
pub use level3::Level3Calculator;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::RBIConfig;
use crate::types::{CalculationLevel, EquipmentData, ExtractedRBIData, RBICalculationResult};

/// Internal calculator failures, recovered by cascading one level down.
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("Level requirements not met: missing {missing:?}")]
    Ineligible { missing: Vec<String> },

    #[error("Internal calculation fault: {0}")]
    Internal(String),
}

/// Strategy interface over the three calculation tiers.
pub trait Calculator: Send + Sync {
    fn level(&self) -> CalculationLevel;

    fn calculate(
        &self,
        equipment: &EquipmentData,
        extracted: &ExtractedRBIData,
        config: &RBIConfig,
        now: DateTime<Utc>,
    ) -> Result<RBICalculationResult, CalculationError>;
}

/// Lookup table keyed by level.
pub fn calculator_for(level: CalculationLevel) -> &'static dyn Calculator {
    match level {
        CalculationLevel::Level1 => &Level1Calculator,
        CalculationLevel::Level2 => &Level2Calculator,
        CalculationLevel::Level3 => &Level3Calculator,
    }
}

/// Clamp an interval in months into a level's band.
pub(crate) fn clamp_interval(months: f64, min: u32, max: u32) -> u32 {
    let rounded = months.round();
    if !rounded.is_finite() || rounded < min as f64 {
        min
    } else if rounded > max as f64 {
        max
    } else {
        rounded as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_matching_level() {
        for level in CalculationLevel::descending() {
            assert_eq!(calculator_for(level).level(), level);
        }
    }

    #[test]
    fn clamp_interval_bounds() {
        assert_eq!(clamp_interval(2.0, 6, 120), 6);
        assert_eq!(clamp_interval(500.0, 6, 120), 120);
        assert_eq!(clamp_interval(36.4, 6, 120), 36);
        assert_eq!(clamp_interval(f64::NAN, 3, 60), 3);
    }
}
