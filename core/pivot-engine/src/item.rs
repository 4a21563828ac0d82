//! FILENAME: core/pivot-engine/src/item.rs
//! Classification items - named extractors of a display title from a value.
//!
//! Every item is one variant of `ItemKind`, evaluated by a single `title`
//! function. Static items form a fixed, ordered catalog; the other variants
//! are manufactured by the registry from the data being pivoted.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use study_model::{AttributeType, Biosample, ValueRef};

// ============================================================================
// CATEGORIES
// ============================================================================

/// Semantic bucket of an item. Declaration order is the primary sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemCategory {
    StudyGroup,
    Phase,
    Biosample,
    Location,
    Result,
}

impl ItemCategory {
    pub fn label(self) -> &'static str {
        match self {
            ItemCategory::StudyGroup => "Study/Group",
            ItemCategory::Phase => "Phase",
            ItemCategory::Biosample => "Biosample",
            ItemCategory::Location => "Location",
            ItemCategory::Result => "Result",
        }
    }
}

// ============================================================================
// STATIC CATALOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaticItem {
    StudyId,
    Group,
    SubGroup,
    Phase,
    PhaseDays,
    TopSampleId,
    TopSampleName,
    SampleId,
    SampleName,
    Biotype,
    SampleComments,
    ContainerId,
    Location,
    Test,
    Input,
    Output,
    Comments,
    Elb,
}

impl StaticItem {
    /// Canonical order; an item's position here is its sort index.
    pub const ALL: [StaticItem; 18] = [
        StaticItem::StudyId,
        StaticItem::Group,
        StaticItem::SubGroup,
        StaticItem::Phase,
        StaticItem::PhaseDays,
        StaticItem::TopSampleId,
        StaticItem::TopSampleName,
        StaticItem::SampleId,
        StaticItem::SampleName,
        StaticItem::Biotype,
        StaticItem::SampleComments,
        StaticItem::ContainerId,
        StaticItem::Location,
        StaticItem::Test,
        StaticItem::Input,
        StaticItem::Output,
        StaticItem::Comments,
        StaticItem::Elb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StaticItem::StudyId => "Study.StudyId",
            StaticItem::Group => "Study.Group",
            StaticItem::SubGroup => "Study.SubGroup",
            StaticItem::Phase => "Phase.Name",
            StaticItem::PhaseDays => "Phase.Days",
            StaticItem::TopSampleId => "Biosample.TopId",
            StaticItem::TopSampleName => "Biosample.TopName",
            StaticItem::SampleId => "Biosample.SampleId",
            StaticItem::SampleName => "Biosample.Name",
            StaticItem::Biotype => "Biosample.Biotype",
            StaticItem::SampleComments => "Biosample.Comments",
            StaticItem::ContainerId => "Location.Container",
            StaticItem::Location => "Location.Position",
            StaticItem::Test => "Result.Test",
            StaticItem::Input => "Result.Input",
            StaticItem::Output => "Result.Output",
            StaticItem::Comments => "Result.Comments",
            StaticItem::Elb => "Result.Elb",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StaticItem::StudyId => "StudyId",
            StaticItem::Group => "Group",
            StaticItem::SubGroup => "SubGroup",
            StaticItem::Phase => "Phase",
            StaticItem::PhaseDays => "Day",
            StaticItem::TopSampleId => "TopId",
            StaticItem::TopSampleName => "TopName",
            StaticItem::SampleId => "SampleId",
            StaticItem::SampleName => "SampleName",
            StaticItem::Biotype => "Biotype",
            StaticItem::SampleComments => "SampleComments",
            StaticItem::ContainerId => "ContainerId",
            StaticItem::Location => "Location",
            StaticItem::Test => "Test",
            StaticItem::Input => "Input",
            StaticItem::Output => "Output",
            StaticItem::Comments => "Comments",
            StaticItem::Elb => "Elb",
        }
    }

    pub fn category(self) -> ItemCategory {
        match self {
            StaticItem::StudyId | StaticItem::Group | StaticItem::SubGroup => {
                ItemCategory::StudyGroup
            }
            StaticItem::Phase | StaticItem::PhaseDays => ItemCategory::Phase,
            StaticItem::TopSampleId
            | StaticItem::TopSampleName
            | StaticItem::SampleId
            | StaticItem::SampleName
            | StaticItem::Biotype
            | StaticItem::SampleComments => ItemCategory::Biosample,
            StaticItem::ContainerId | StaticItem::Location => ItemCategory::Location,
            StaticItem::Test
            | StaticItem::Input
            | StaticItem::Output
            | StaticItem::Comments
            | StaticItem::Elb => ItemCategory::Result,
        }
    }

    /// Group assignments must be hidden from blinded viewers.
    pub fn is_blind_sensitive(self) -> bool {
        matches!(self, StaticItem::Group | StaticItem::SubGroup)
    }

    /// Identifying labels that are worth showing even when constant.
    pub fn is_always_discriminating(self) -> bool {
        matches!(self, StaticItem::Group | StaticItem::Test | StaticItem::Output)
    }

    /// The catalog entry for this item.
    pub fn item(self) -> PivotItem {
        let index = StaticItem::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or(StaticItem::ALL.len());
        PivotItem::new(ItemKind::Static(self), index as u32)
    }

    fn title(self, v: &ValueRef<'_>) -> Option<String> {
        let result = v.result;
        let sample = v.biosample();
        match self {
            StaticItem::StudyId => result.study().map(|s| s.study_id.clone()),
            StaticItem::Group => result.group().map(|g| g.name.clone()),
            StaticItem::SubGroup => {
                let group = result.group()?;
                if group.sub_groups > 1 {
                    let sub_group = sample.map_or(0, |s| s.inherited_sub_group());
                    Some(format!("{}'{}", group.name, sub_group + 1))
                } else {
                    None
                }
            }
            StaticItem::Phase => v.phase().map(|p| p.name.clone()),
            StaticItem::PhaseDays => v.phase().map(|p| format!("d{}", p.days)),
            StaticItem::TopSampleId => sample.map(|s| s.top().sample_id.clone()),
            StaticItem::TopSampleName => sample.and_then(|s| s.top().name.clone()),
            StaticItem::SampleId => sample.map(|s| s.sample_id.clone()),
            StaticItem::SampleName => sample.and_then(|s| s.name.clone()),
            StaticItem::Biotype => sample.map(|s| s.biotype.name.clone()),
            StaticItem::SampleComments => sample.and_then(|s| s.comments.clone()),
            StaticItem::ContainerId => sample.and_then(|s| s.container_id.clone()),
            StaticItem::Location => sample.and_then(|s| s.location.clone()),
            StaticItem::Test => Some(result.test.name.clone()),
            StaticItem::Input => Some(result.input_values_string()),
            StaticItem::Output => Some(v.attribute.name.clone()),
            StaticItem::Comments => result.comments.clone(),
            StaticItem::Elb => result.elb.clone(),
        }
    }
}

// ============================================================================
// DYNAMIC ITEM DESCRIPTORS
// ============================================================================

/// Field read from a biosample found in the value's sample ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SampleField {
    SampleId,
    Name,
    /// Metadata field; `index` is its position in the biotype declaration.
    Metadata { index: usize, name: String },
}

impl SampleField {
    pub fn label(&self) -> &str {
        match self {
            SampleField::SampleId => "SampleId",
            SampleField::Name => "Name",
            SampleField::Metadata { name, .. } => name,
        }
    }
}

/// A field of the first sample of `biotype` in the value's sample ancestry,
/// or of the sample that sample references through its `via` metadata field.
/// Links order by biotype, then own fields before referenced ones, then by
/// field (id, name, metadata in declaration order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleLink {
    pub biotype: String,
    #[serde(default)]
    pub via: Option<String>,
    pub field: SampleField,
}

impl SampleLink {
    pub fn new(biotype: &str, field: SampleField) -> Self {
        SampleLink {
            biotype: biotype.to_string(),
            via: None,
            field,
        }
    }

    /// A field of the sample referenced by metadata `via` of a `biotype` sample.
    pub fn through(biotype: &str, via: &str, field: SampleField) -> Self {
        SampleLink {
            biotype: biotype.to_string(),
            via: Some(via.to_string()),
            field,
        }
    }

    fn path(&self) -> String {
        match &self.via {
            Some(via) => format!("{}.{}", self.biotype, via),
            None => self.biotype.clone(),
        }
    }

    fn title(&self, sample: &Biosample) -> Option<String> {
        let mut linked = sample.ancestry().find(|s| s.biotype.name == self.biotype)?;
        if let Some(via) = &self.via {
            linked = linked.metadata(via)?.linked.as_deref()?;
        }
        match &self.field {
            SampleField::SampleId => Some(linked.sample_id.clone()),
            SampleField::Name => linked.name.clone(),
            SampleField::Metadata { name, .. } => linked.metadata_value(name).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Static(StaticItem),
    LinkedField(SampleLink),
    /// The value of `attribute` in the same result, for results of `test`.
    AttributeField {
        test: String,
        attribute: String,
        attribute_type: AttributeType,
    },
    /// A metadata field of the biosample referenced by `attribute`.
    CrossLinkedMetadata {
        test: String,
        attribute: String,
        metadata: String,
    },
    /// A name the registry does not know; never yields a title.
    Unresolved,
}

impl ItemKind {
    fn name(&self) -> String {
        match self {
            ItemKind::Static(s) => s.name().to_string(),
            ItemKind::LinkedField(link) => format!("Linked.{}.{}", link.path(), link.field.label()),
            ItemKind::AttributeField { test, attribute, .. } => {
                format!("Attribute.{}.{}", test, attribute)
            }
            ItemKind::CrossLinkedMetadata { test, attribute, metadata } => {
                format!("CrossLinked.{}.{}.{}", test, attribute, metadata)
            }
            ItemKind::Unresolved => String::new(),
        }
    }

    fn label(&self) -> String {
        match self {
            ItemKind::Static(s) => s.label().to_string(),
            ItemKind::LinkedField(link) => format!("{}.{}", link.path(), link.field.label()),
            ItemKind::AttributeField { attribute, .. } => attribute.clone(),
            ItemKind::CrossLinkedMetadata { attribute, metadata, .. } => {
                format!("{}.{}", attribute, metadata)
            }
            ItemKind::Unresolved => String::new(),
        }
    }

    fn sub_classifier(&self) -> Option<String> {
        match self {
            ItemKind::LinkedField(link) => Some(link.path()),
            ItemKind::AttributeField { test, .. } => Some(test.clone()),
            ItemKind::CrossLinkedMetadata { test, attribute, .. } => {
                Some(format!("{}.{}", test, attribute))
            }
            ItemKind::Static(_) | ItemKind::Unresolved => None,
        }
    }

    fn category(&self) -> ItemCategory {
        match self {
            ItemKind::Static(s) => s.category(),
            ItemKind::LinkedField(_) | ItemKind::CrossLinkedMetadata { .. } => {
                ItemCategory::Biosample
            }
            ItemKind::AttributeField { .. } | ItemKind::Unresolved => ItemCategory::Result,
        }
    }
}

// ============================================================================
// PIVOT ITEM
// ============================================================================

/// A classification item with its stable sort index.
///
/// Two items are equal iff they have the same name. Within one registry a
/// name always carries the same sort index, so equality agrees with `Ord`.
#[derive(Debug, Clone)]
pub struct PivotItem {
    kind: ItemKind,
    name: String,
    label: String,
    sub_classifier: Option<String>,
    sort_index: u32,
}

impl PivotItem {
    pub(crate) fn new(kind: ItemKind, sort_index: u32) -> Self {
        PivotItem {
            name: kind.name(),
            label: kind.label(),
            sub_classifier: kind.sub_classifier(),
            kind,
            sort_index,
        }
    }

    /// Placeholder for an item name that could not be resolved.
    pub fn unresolved(name: &str) -> Self {
        PivotItem {
            kind: ItemKind::Unresolved,
            name: name.to_string(),
            label: name.to_string(),
            sub_classifier: None,
            sort_index: u32::MAX,
        }
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sort_index(&self) -> u32 {
        self.sort_index
    }

    pub fn category(&self) -> ItemCategory {
        self.kind.category()
    }

    /// Heading under which related dynamic items are grouped.
    pub fn sub_classifier(&self) -> Option<&str> {
        self.sub_classifier.as_deref()
    }

    pub fn is_blind_sensitive(&self) -> bool {
        matches!(self.kind, ItemKind::Static(s) if s.is_blind_sensitive())
    }

    pub fn as_static(&self) -> Option<StaticItem> {
        match self.kind {
            ItemKind::Static(s) => Some(s),
            _ => None,
        }
    }

    pub fn is(&self, item: StaticItem) -> bool {
        self.as_static() == Some(item)
    }

    /// The display title of `value` under this item; blank titles read as `None`.
    pub fn title(&self, value: &ValueRef<'_>) -> Option<String> {
        let title = match &self.kind {
            ItemKind::Static(s) => s.title(value),
            ItemKind::LinkedField(link) => value.biosample().and_then(|s| link.title(s)),
            ItemKind::AttributeField { test, attribute, .. } => {
                if value.result.test.name != *test {
                    return None;
                }
                value
                    .result
                    .value_by_name(attribute)
                    .filter(|v| !v.is_empty())
                    .map(|v| v.text().trim().to_string())
            }
            ItemKind::CrossLinkedMetadata { test, attribute, metadata } => {
                if value.result.test.name != *test {
                    return None;
                }
                value
                    .result
                    .value_by_name(attribute)
                    .and_then(|v| v.linked_biosample.as_ref())
                    .and_then(|linked| linked.metadata_value(metadata))
                    .map(str::to_string)
            }
            ItemKind::Unresolved => None,
        };
        title.filter(|t| !t.trim().is_empty())
    }
}

impl PartialEq for PivotItem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for PivotItem {}

impl Hash for PivotItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for PivotItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PivotItem {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.name == other.name {
            return Ordering::Equal;
        }
        self.category()
            .cmp(&other.category())
            .then_with(|| match (&self.kind, &other.kind) {
                (ItemKind::LinkedField(a), ItemKind::LinkedField(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
            .then_with(|| self.sort_index.cmp(&other.sort_index))
            .then_with(|| self.name.cmp(&other.name))
    }
}
