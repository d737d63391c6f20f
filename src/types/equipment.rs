//! Equipment master data
//!
//! `EquipmentData` is an immutable snapshot taken from the equipment registry
//! at the start of each calculation. Construction enforces the registry
//! invariants (positive design pressure, non-empty identifiers) so the
//! calculators never have to re-check them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entity-construction invariant violations.
///
/// Raised eagerly when an entity is built from external data; the engine
/// itself never produces these once a pipeline has started.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Design pressure must be positive, got {0}")]
    NonPositivePressure(f64),

    #[error("Inventory size must be non-negative, got {0}")]
    NegativeInventory(f64),

    #[error("Thickness must be positive, got {0} mm at '{1}'")]
    NonPositiveThickness(f64, String),

    #[error("Minimum required thickness must be positive, got {0} mm at '{1}'")]
    NonPositiveMinimum(f64, String),

    #[error(
        "Critically low thickness at '{location}': {thickness} mm is below 50% of the \
         {minimum_required} mm minimum"
    )]
    CriticalThickness {
        location: String,
        thickness: f64,
        minimum_required: f64,
    },

    #[error("Corrosion rate must be non-negative, got {0} mm/yr")]
    NegativeCorrosionRate(f64),
}

/// Equipment criticality classification from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl CriticalityLevel {
    /// Registry key used by the Level 1 modifier tables.
    pub fn as_key(&self) -> &'static str {
        match self {
            CriticalityLevel::Low => "low",
            CriticalityLevel::Medium => "medium",
            CriticalityLevel::High => "high",
            CriticalityLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for CriticalityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key().to_uppercase())
    }
}

/// Immutable equipment master data snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentData {
    /// Unique, immutable registry identifier (e.g., "101-E-401A")
    pub equipment_id: String,

    /// Normalized equipment type key (e.g., "pressure_vessel", "piping")
    pub equipment_type: String,

    /// Normalized service type key (e.g., "sour_gas", "sweet_gas", "water")
    pub service_type: String,

    /// Date the equipment entered service
    pub installation_date: DateTime<Utc>,

    /// Design pressure (bar), strictly positive
    pub design_pressure: f64,

    /// Design temperature (°C)
    pub design_temperature: f64,

    /// Construction material (e.g., "carbon_steel")
    pub material: String,

    /// Registry criticality classification
    pub criticality_level: CriticalityLevel,

    /// Coating type, when coated
    pub coating_type: Option<String>,

    /// Plant location / unit
    pub location: String,

    /// Contained inventory size (m³)
    pub inventory_size: f64,
}

/// Lowercase, underscore-separated key form used by the config tables.
fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

impl EquipmentData {
    /// Build a validated equipment snapshot.
    ///
    /// Type and service keys are normalized to the lowercase form the scoring
    /// tables are keyed by.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        equipment_id: impl Into<String>,
        equipment_type: &str,
        service_type: &str,
        installation_date: DateTime<Utc>,
        design_pressure: f64,
        design_temperature: f64,
        material: &str,
        criticality_level: CriticalityLevel,
        location: &str,
        inventory_size: f64,
    ) -> Result<Self, ValidationError> {
        let equipment_id = equipment_id.into();
        if equipment_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("equipment_id"));
        }
        if equipment_type.trim().is_empty() {
            return Err(ValidationError::EmptyField("equipment_type"));
        }
        if service_type.trim().is_empty() {
            return Err(ValidationError::EmptyField("service_type"));
        }
        if design_pressure <= 0.0 {
            return Err(ValidationError::NonPositivePressure(design_pressure));
        }
        if inventory_size < 0.0 {
            return Err(ValidationError::NegativeInventory(inventory_size));
        }

        Ok(Self {
            equipment_id,
            equipment_type: normalize_key(equipment_type),
            service_type: normalize_key(service_type),
            installation_date,
            design_pressure,
            design_temperature,
            material: normalize_key(material),
            criticality_level,
            coating_type: None,
            location: location.to_string(),
            inventory_size,
        })
    }

    /// Attach a coating type (registry field, optional).
    pub fn with_coating(mut self, coating_type: &str) -> Self {
        self.coating_type = Some(normalize_key(coating_type));
        self
    }

    /// Equipment age in years at the given instant.
    pub fn age_years(&self, now: DateTime<Utc>) -> f64 {
        let days = (now - self.installation_date).num_days();
        (days.max(0) as f64) / 365.25
    }
}

// ============================================================================
// Tests
// ============================================================================
