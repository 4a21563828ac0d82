//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Template Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot template.
//! These structures are designed to be:
//! - Serializable (for saving/loading report layouts)
//! - Independent of any loaded result set (items are referenced by name)
//! - Immutable snapshots of user intent

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PivotError, PivotResult};

// ============================================================================
// PLACEMENT
// ============================================================================

/// Where a classification item goes in the pivot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Placement {
    /// Not shown: values differing only by this item are merged.
    #[default]
    Merge,
    Row,
    Column,
    /// Shown inside the cell, splitting it into nested sub-cells.
    Cell,
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// How multiple values landing in one cell are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Aggregation {
    /// Every value, sorted and joined with "; ".
    #[default]
    AllValues,
    Median,
    Average,
    GeometricMean,
    Minimum,
    Maximum,
    /// "min - max".
    Range,
    Sum,
    Count,
    Hide,
}

impl Aggregation {
    pub const ALL: [Aggregation; 10] = [
        Aggregation::AllValues,
        Aggregation::Median,
        Aggregation::Average,
        Aggregation::GeometricMean,
        Aggregation::Minimum,
        Aggregation::Maximum,
        Aggregation::Range,
        Aggregation::Sum,
        Aggregation::Count,
        Aggregation::Hide,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Aggregation::AllValues => "All Values",
            Aggregation::Median => "Median",
            Aggregation::Average => "Average",
            Aggregation::GeometricMean => "Geo. Mean",
            Aggregation::Minimum => "Min",
            Aggregation::Maximum => "Max",
            Aggregation::Range => "Range",
            Aggregation::Sum => "Sum",
            Aggregation::Count => "Count",
            Aggregation::Hide => "Hide",
        }
    }
}

/// Secondary spread statistic shown next to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Deviation {
    #[default]
    None,
    StandardDeviation,
    CoefficientOfVariation,
}

impl Deviation {
    pub fn label(self) -> &'static str {
        match self {
            Deviation::None => "None",
            Deviation::StandardDeviation => "Std. Dev.",
            Deviation::CoefficientOfVariation => "CV%",
        }
    }
}

/// Per-value derived transform applied before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ComputedMode {
    #[default]
    None,
    /// Difference to the previous measurement, divided by the elapsed days.
    DeltaPerDay,
    /// Difference to the day-zero measurement.
    DeltaFromDayZero,
    /// Difference to the day-zero measurement, in percent of it.
    PercentFromDayZero,
}

impl ComputedMode {
    pub fn label(self) -> &'static str {
        match self {
            ComputedMode::None => "None",
            ComputedMode::DeltaPerDay => "Inc./day",
            ComputedMode::DeltaFromDayZero => "Inc. from d0",
            ComputedMode::PercentFromDayZero => "Inc. % from d0",
        }
    }
}

// ============================================================================
// MAIN DEFINITION STRUCT
// ============================================================================

/// Placement of one item, referenced by its registry name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementEntry {
    pub item: String,
    #[serde(default)]
    pub placement: Placement,
}

/// The complete, serializable definition of a pivot template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemplateDefinition {
    #[serde(default)]
    pub name: String,

    /// Explicit placements; items not listed are merged.
    #[serde(default)]
    pub placements: Vec<PlacementEntry>,

    #[serde(default)]
    pub aggregation: Aggregation,

    #[serde(default)]
    pub deviation: Deviation,

    #[serde(default)]
    pub computed: ComputedMode,

    /// Show the number of non-empty values next to the aggregate.
    #[serde(default)]
    pub show_n: bool,
}

impl TemplateDefinition {
    pub fn new(name: &str) -> Self {
        TemplateDefinition {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> PivotResult<Self> {
        let definition: TemplateDefinition = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn to_json(&self) -> PivotResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> PivotResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> PivotResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Rejects blank item names and items listed twice.
    pub fn validate(&self) -> PivotResult<()> {
        let mut seen = rustc_hash::FxHashSet::default();
        for entry in &self.placements {
            if entry.item.trim().is_empty() {
                return Err(PivotError::InvalidTemplate(
                    "placement entry without an item name".to_string(),
                ));
            }
            if !seen.insert(entry.item.as_str()) {
                return Err(PivotError::InvalidTemplate(format!(
                    "item '{}' is placed more than once",
                    entry.item
                )));
            }
        }
        Ok(())
    }
}
