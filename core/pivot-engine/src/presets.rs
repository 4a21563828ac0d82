//! FILENAME: core/pivot-engine/src/presets.rs
//! Canned templates - ready-made layouts adjusted to the data they will show.

use serde::{Deserialize, Serialize};

use study_model::{AccessContext, AttributeType, TestResult};

use crate::definition::{Aggregation, Deviation, Placement};
use crate::item::{ItemKind, StaticItem};
use crate::logging::log_info;
use crate::registry::ItemRegistry;
use crate::template::Template;

/// Share of buckets an attribute must split before the expanded layout shows it.
const ATTRIBUTE_SPLIT_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplatePreset {
    /// One row per animal and phase, averaged.
    Compact,
    /// One row per sample, every value listed.
    Expanded,
    /// One row per group, mean and standard deviation per phase.
    PerGroup,
    /// Group medians broken out by test input.
    PerInput,
    /// Outputs side by side, everything else in rows.
    Column,
}

impl TemplatePreset {
    pub const ALL: [TemplatePreset; 5] = [
        TemplatePreset::Compact,
        TemplatePreset::Expanded,
        TemplatePreset::PerGroup,
        TemplatePreset::PerInput,
        TemplatePreset::Column,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TemplatePreset::Compact => "Compact",
            TemplatePreset::Expanded => "Expanded",
            TemplatePreset::PerGroup => "Per Group",
            TemplatePreset::PerInput => "Per Input",
            TemplatePreset::Column => "Column",
        }
    }

    /// Builds the layout and trims it to what `results` actually contain.
    pub fn build(self, results: &[TestResult], access: &AccessContext<'_>) -> Template {
        let mut template = Template::new(self.name());

        match self {
            TemplatePreset::Compact => {
                template.place(
                    &[
                        StaticItem::Group,
                        StaticItem::SubGroup,
                        StaticItem::TopSampleId,
                        StaticItem::Phase,
                    ],
                    Placement::Row,
                );
                template.place(
                    &[StaticItem::Test, StaticItem::Output, StaticItem::Input],
                    Placement::Column,
                );
                template.set_aggregation(Aggregation::Average);
                template.simplify(results);
            }
            TemplatePreset::Expanded => {
                template.place(
                    &[StaticItem::TopSampleId, StaticItem::SampleId, StaticItem::Phase],
                    Placement::Row,
                );
                template.place(
                    &[StaticItem::Test, StaticItem::Input, StaticItem::Output],
                    Placement::Column,
                );
                template.set_aggregation(Aggregation::AllValues);
                template.simplify(results);
                template.expand(results, access);
                promote_splitting_attributes(&mut template, results);
            }
            TemplatePreset::PerGroup => {
                template.place(&[StaticItem::Group], Placement::Row);
                template.place(
                    &[StaticItem::Test, StaticItem::Output, StaticItem::Phase],
                    Placement::Column,
                );
                template.set_aggregation(Aggregation::Average);
                template.set_deviation(Deviation::StandardDeviation);
                template.set_show_n(true);
                template.simplify(results);
            }
            TemplatePreset::PerInput => {
                template.place(&[StaticItem::Group, StaticItem::Phase], Placement::Row);
                template.place(
                    &[StaticItem::Test, StaticItem::Input, StaticItem::Output],
                    Placement::Column,
                );
                template.set_aggregation(Aggregation::Median);
                template.simplify(results);
            }
            TemplatePreset::Column => {
                template.place(
                    &[
                        StaticItem::TopSampleId,
                        StaticItem::SampleId,
                        StaticItem::Phase,
                        StaticItem::Test,
                        StaticItem::Input,
                    ],
                    Placement::Row,
                );
                template.place(&[StaticItem::Output], Placement::Column);
                template.set_aggregation(Aggregation::AllValues);
                template.simplify(results);
            }
        }

        template.remove_blind_items(results, access);

        log_info!(
            "TEMPLATE",
            "preset '{}' for {} results: {} rows, {} columns, {} cells",
            self.name(),
            results.len(),
            template.items(Some(Placement::Row)).len(),
            template.items(Some(Placement::Column)).len(),
            template.items(Some(Placement::Cell)).len()
        );
        template
    }
}

/// Adds as rows the non-output attributes that split enough buckets.
fn promote_splitting_attributes(template: &mut Template, results: &[TestResult]) {
    let registry = ItemRegistry::discover(results);
    for item in registry.items() {
        let is_attribute = matches!(
            item.kind(),
            ItemKind::AttributeField { attribute_type, .. } if *attribute_type != AttributeType::Output
        );
        if !is_attribute || template.placement(item) != Placement::Merge {
            continue;
        }
        if template.is_discriminating_above(item, results, ATTRIBUTE_SPLIT_FRACTION) {
            template.set_placement(item, Placement::Row);
        }
    }
}
