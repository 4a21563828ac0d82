//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot engine for study results.
//!
//! This crate turns a set of test results into a cross-tabulated table,
//! driven by a template that places classification items in rows, columns
//! or cells. It depends on `study-model` for the records it consumes.
//!
//! Layers:
//! - `definition`: Serializable configuration (what a template IS)
//! - `item` / `registry`: Classification items and their catalog
//! - `template`: Placements and keys (HOW values are bucketed)
//! - `presets`: Ready-made templates adjusted to the data
//! - `computed`: Per-value deltas written before aggregation
//! - `engine` / `cell`: Routing and aggregation (WHAT we display)

mod logging;

pub mod cell;
pub mod compare;
pub mod computed;
pub mod definition;
pub mod engine;
pub mod error;
pub mod item;
pub mod presets;
pub mod registry;
pub mod stats;
pub mod template;

pub use cell::{CellValue, PivotCell, SubCellKey};
pub use computed::apply_computed_values;
pub use definition::*;
pub use engine::{calculate_pivot, PivotColumn, PivotRow, PivotTable};
pub use error::{PivotError, PivotResult};
pub use item::{ItemCategory, ItemKind, PivotItem, SampleField, SampleLink, StaticItem};
pub use presets::TemplatePreset;
pub use registry::{is_discriminating, is_populated, ItemRegistry};
pub use template::Template;
