//! FILENAME: core/pivot-engine/src/template.rs
//! Pivot Template - maps classification items to placements.
//!
//! The template decides, for every value, which row, column and cell it
//! lands in: each key concatenates the titles of the items placed there.
//! The per-placement item lists are rebuilt eagerly by every mutator, so a
//! template is never observed with stale derived state.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use study_model::{AccessContext, TestResult, ValueRef};

use crate::definition::{
    Aggregation, ComputedMode, Deviation, Placement, PlacementEntry, TemplateDefinition,
};
use crate::item::{ItemCategory, ItemKind, PivotItem, SampleField, SampleLink, StaticItem};
use crate::logging::{log_debug, log_warn};
use crate::registry::{self, ItemRegistry};

/// Terminates each item's contribution to a key.
pub const KEY_SEPARATOR: char = '\n';

/// Values sampled densely before the discrimination check thins out.
const DENSE_SAMPLE_LIMIT: usize = 500;

type ItemList = SmallVec<[PivotItem; 8]>;

/// Row, column and cell keys of one bucket.
type BucketKey = (String, String, String);

/// Item lists per placement, in item order.
#[derive(Debug, Clone, Default)]
struct PlacedItems {
    all: Vec<PivotItem>,
    merged: ItemList,
    rows: ItemList,
    columns: ItemList,
    cells: ItemList,
}

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    placements: FxHashMap<String, (PivotItem, Placement)>,
    aggregation: Aggregation,
    deviation: Deviation,
    computed: ComputedMode,
    show_n: bool,
    placed: PlacedItems,
}

impl Template {
    pub fn new(name: &str) -> Self {
        Template {
            name: name.to_string(),
            placements: FxHashMap::default(),
            aggregation: Aggregation::default(),
            deviation: Deviation::default(),
            computed: ComputedMode::default(),
            show_n: false,
            placed: PlacedItems::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // PLACEMENTS
    // ========================================================================

    pub fn set_placement(&mut self, item: &PivotItem, placement: Placement) {
        self.placements
            .insert(item.name().to_string(), (item.clone(), placement));
        self.rebuild();
    }

    /// Places several static items at once.
    pub fn place(&mut self, items: &[StaticItem], placement: Placement) {
        for item in items {
            let item = item.item();
            self.placements
                .insert(item.name().to_string(), (item, placement));
        }
        self.rebuild();
    }

    /// The item's placement; unknown items are merged.
    pub fn placement(&self, item: &PivotItem) -> Placement {
        self.placements
            .get(item.name())
            .map(|(_, p)| *p)
            .unwrap_or_default()
    }

    pub fn placement_of(&self, item: StaticItem) -> Placement {
        self.placements
            .get(item.name())
            .map(|(_, p)| *p)
            .unwrap_or_default()
    }

    /// Items at `placement`, or every known item for `None`, in item order.
    pub fn items(&self, placement: Option<Placement>) -> &[PivotItem] {
        match placement {
            None => self.placed.all.as_slice(),
            Some(Placement::Merge) => self.placed.merged.as_slice(),
            Some(Placement::Row) => self.placed.rows.as_slice(),
            Some(Placement::Column) => self.placed.columns.as_slice(),
            Some(Placement::Cell) => self.placed.cells.as_slice(),
        }
    }

    /// Forgets every placement.
    pub fn clear(&mut self) {
        self.placements.clear();
        self.rebuild();
    }

    pub fn is_placed(&self, item: StaticItem, placement: Placement) -> bool {
        self.placement_of(item) == placement
    }

    /// True if any item of `category` sits at `placement`.
    pub fn has_category_at(&self, category: ItemCategory, placement: Placement) -> bool {
        self.items(Some(placement))
            .iter()
            .any(|item| item.category() == category)
    }

    fn rebuild(&mut self) {
        let mut placed = PlacedItems::default();
        let mut all: Vec<(PivotItem, Placement)> = self.placements.values().cloned().collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        for (item, placement) in all {
            match placement {
                Placement::Merge => placed.merged.push(item.clone()),
                Placement::Row => placed.rows.push(item.clone()),
                Placement::Column => placed.columns.push(item.clone()),
                Placement::Cell => placed.cells.push(item.clone()),
            }
            placed.all.push(item);
        }
        self.placed = placed;
    }

    // ========================================================================
    // MODES
    // ========================================================================

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn set_aggregation(&mut self, aggregation: Aggregation) {
        self.aggregation = aggregation;
    }

    pub fn deviation(&self) -> Deviation {
        self.deviation
    }

    pub fn set_deviation(&mut self, deviation: Deviation) {
        self.deviation = deviation;
    }

    pub fn computed(&self) -> ComputedMode {
        self.computed
    }

    pub fn set_computed(&mut self, computed: ComputedMode) {
        self.computed = computed;
    }

    /// Whether to show the non-empty count. Always off when counting.
    pub fn show_n(&self) -> bool {
        self.show_n && self.aggregation != Aggregation::Count
    }

    pub fn set_show_n(&mut self, show_n: bool) {
        self.show_n = show_n;
    }

    // ========================================================================
    // KEYS
    // ========================================================================

    pub fn row_key(&self, value: &ValueRef<'_>) -> String {
        build_key(&self.placed.rows, value, None)
    }

    /// Column key; falls back to the aggregation label when nothing is placed.
    pub fn column_key(&self, value: &ValueRef<'_>) -> String {
        let key = build_key(&self.placed.columns, value, None);
        if key.is_empty() {
            self.aggregation.label().to_string()
        } else {
            key
        }
    }

    pub fn cell_key(&self, value: &ValueRef<'_>) -> String {
        let key = build_key(&self.placed.cells, value, None);
        if key.is_empty() {
            self.aggregation.label().to_string()
        } else {
            key
        }
    }

    /// Row, column and cell keys together, leaving `skip` out.
    fn bucket_key(&self, value: &ValueRef<'_>, skip: &PivotItem) -> BucketKey {
        (
            build_key(&self.placed.rows, value, Some(skip)),
            build_key(&self.placed.columns, value, Some(skip)),
            build_key(&self.placed.cells, value, Some(skip)),
        )
    }

    // ========================================================================
    // ADJUSTMENT TO THE DATA
    // ========================================================================

    /// Merges every placed item that does not separate the results.
    pub fn simplify(&mut self, results: &[TestResult]) {
        let demoted: Vec<PivotItem> = self
            .placed
            .all
            .iter()
            .filter(|item| self.placement(item) != Placement::Merge)
            .filter(|item| !registry::is_discriminating(item, results))
            .cloned()
            .collect();
        for item in &demoted {
            self.placements
                .insert(item.name().to_string(), (item.clone(), Placement::Merge));
        }
        self.rebuild();
        log_debug!("TEMPLATE", "simplify '{}' merged {} items", self.name, demoted.len());
    }

    /// Adds to the rows every discovered item that shares a sub-classifier
    /// with an item already placed as row.
    ///
    /// A sample id placed as row (`TopSampleId`, `SampleId`) anchors the
    /// biotypes of the samples it identifies, so their fields join it; their
    /// `SampleId` link is skipped since the row already shows it.
    pub fn expand(&mut self, results: &[TestResult], access: &AccessContext<'_>) {
        let labels: FxHashSet<String> = self
            .placed
            .rows
            .iter()
            .filter_map(|item| item.sub_classifier().map(str::to_string))
            .collect();
        let anchors = self.sample_anchors(results);
        if labels.is_empty() && anchors.is_empty() {
            return;
        }

        let blind = has_blind_study(results, access);
        let registry = ItemRegistry::discover(results);
        let mut added = 0;
        for item in registry.items() {
            let Some(label) = item.sub_classifier() else {
                continue;
            };
            let related = labels.contains(label)
                || (anchors.contains(label) && !is_sample_id_link(item));
            if !related || self.placement(item) != Placement::Merge {
                continue;
            }
            if blind && item.is_blind_sensitive() {
                continue;
            }
            self.placements
                .insert(item.name().to_string(), (item.clone(), Placement::Row));
            added += 1;
        }
        self.rebuild();
        log_debug!("TEMPLATE", "expand '{}' added {} row items", self.name, added);
    }

    /// Biotypes of the samples identified by sample-id row items.
    fn sample_anchors(&self, results: &[TestResult]) -> FxHashSet<String> {
        let top = self.placement_of(StaticItem::TopSampleId) == Placement::Row;
        let own = self.placement_of(StaticItem::SampleId) == Placement::Row;
        let mut anchors = FxHashSet::default();
        if !top && !own {
            return anchors;
        }
        for sample in results.iter().filter_map(|r| r.biosample.as_deref()) {
            if top {
                anchors.insert(sample.top().biotype.name.clone());
            }
            if own {
                anchors.insert(sample.biotype.name.clone());
            }
        }
        anchors
    }

    /// Merges blind-sensitive items when any result belongs to a study
    /// the viewer is blinded to.
    pub fn remove_blind_items(&mut self, results: &[TestResult], access: &AccessContext<'_>) {
        if !has_blind_study(results, access) {
            return;
        }
        let hidden: Vec<PivotItem> = self
            .placed
            .all
            .iter()
            .filter(|item| item.is_blind_sensitive())
            .cloned()
            .collect();
        for item in hidden {
            self.placements
                .insert(item.name().to_string(), (item, Placement::Merge));
        }
        self.rebuild();
        log_debug!("TEMPLATE", "'{}' hides blind items for {}", self.name, access.viewer.name);
    }

    /// Sampled variant of `registry::is_discriminating`.
    ///
    /// Counts how often adding `item` gives an already-seen bucket (row,
    /// column and cell together) a new sub-key, and requires more than
    /// `min_fraction` of the bucket count. Past the first values the check
    /// samples on a logarithmically growing stride, so large inputs get an
    /// approximate answer.
    pub fn is_discriminating_above(
        &self,
        item: &PivotItem,
        results: &[TestResult],
        min_fraction: f64,
    ) -> bool {
        let mut buckets: FxHashMap<BucketKey, FxHashSet<Option<String>>> = FxHashMap::default();
        let mut splits = 0usize;
        let mut next = 0usize;

        let values = results.iter().flat_map(|r| r.output_values());
        for (index, value) in values.enumerate() {
            if index < next {
                continue;
            }
            next = index + sampling_stride(index);

            let base = self.bucket_key(&value, item);
            let sub_keys = buckets.entry(base).or_default();
            let seen_before = !sub_keys.is_empty();
            if sub_keys.insert(item.title(&value)) && seen_before {
                splits += 1;
            }
        }

        !buckets.is_empty() && splits as f64 > min_fraction * buckets.len() as f64
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Snapshot of the explicit placements and modes, items in item order.
    pub fn to_definition(&self) -> TemplateDefinition {
        TemplateDefinition {
            name: self.name.clone(),
            placements: self
                .placed
                .all
                .iter()
                .map(|item| PlacementEntry {
                    item: item.name().to_string(),
                    placement: self.placement(item),
                })
                .collect(),
            aggregation: self.aggregation,
            deviation: self.deviation,
            computed: self.computed,
            show_n: self.show_n,
        }
    }

    /// Builds a template; names unknown to `registry` become unresolved items.
    pub fn from_definition(definition: &TemplateDefinition, registry: &ItemRegistry) -> Self {
        let mut template = Template::new(&definition.name);
        for entry in &definition.placements {
            let item = registry.resolve(&entry.item);
            if registry.find(&entry.item).is_none() {
                log_warn!("TEMPLATE", "'{}' references unknown item '{}'", definition.name, entry.item);
            }
            template
                .placements
                .insert(item.name().to_string(), (item, entry.placement));
        }
        template.aggregation = definition.aggregation;
        template.deviation = definition.deviation;
        template.computed = definition.computed;
        template.show_n = definition.show_n;
        template.rebuild();
        template
    }
}

/// Concatenates the titles of `items`, each followed by the separator.
/// An absent title contributes only its separator.
fn build_key(items: &[PivotItem], value: &ValueRef<'_>, skip: Option<&PivotItem>) -> String {
    let mut key = String::new();
    for item in items {
        if skip == Some(item) {
            continue;
        }
        if let Some(title) = item.title(value) {
            key.push_str(&title);
        }
        key.push(KEY_SEPARATOR);
    }
    key
}

fn is_sample_id_link(item: &PivotItem) -> bool {
    matches!(
        item.kind(),
        ItemKind::LinkedField(SampleLink { via: None, field: SampleField::SampleId, .. })
    )
}

fn has_blind_study(results: &[TestResult], access: &AccessContext<'_>) -> bool {
    results
        .iter()
        .filter_map(|r| r.study())
        .any(|study| access.is_blind(study))
}

/// Distance to the next sampled value.
fn sampling_stride(processed: usize) -> usize {
    if processed < DENSE_SAMPLE_LIMIT {
        1
    } else {
        ((processed as f64).ln() as usize).max(1)
    }
}
