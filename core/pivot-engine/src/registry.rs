//! FILENAME: core/pivot-engine/src/registry.rs
//! Item Registry - the catalog of classification items available for a result set.
//!
//! The static table is built once per process and never changes. Dynamic
//! items are manufactured per discovery from the data itself, numbered after
//! the static items in name order, so re-discovering the same data always
//! yields the same items with the same indices.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use study_model::{Biotype, DataType, TestResult, ValueRef};

use crate::item::{ItemKind, PivotItem, SampleField, SampleLink, StaticItem};
use crate::logging::log_debug;

static STATIC_ITEMS: Lazy<Vec<PivotItem>> =
    Lazy::new(|| StaticItem::ALL.iter().map(|s| s.item()).collect());

/// Ordered catalog of the items a template can place.
#[derive(Debug, Clone)]
pub struct ItemRegistry {
    items: Vec<PivotItem>,
}

impl ItemRegistry {
    /// The fixed catalog, in canonical order.
    pub fn static_items() -> &'static [PivotItem] {
        &STATIC_ITEMS
    }

    /// A registry holding only the static items.
    pub fn new() -> Self {
        ItemRegistry {
            items: STATIC_ITEMS.clone(),
        }
    }

    /// Static items plus every dynamic item the results populate.
    pub fn discover(results: &[TestResult]) -> Self {
        let mut candidates: BTreeMap<String, ItemKind> = BTreeMap::new();
        let mut add = |kind: ItemKind| {
            let item = PivotItem::new(kind, 0);
            candidates
                .entry(item.name().to_string())
                .or_insert_with(|| item.kind().clone());
        };

        for result in results {
            if let Some(sample) = &result.biosample {
                // Fields of every sample up the hierarchy
                for (depth, linked) in sample.ancestry().enumerate() {
                    let biotype = &linked.biotype;
                    if depth > 0 {
                        add(ItemKind::LinkedField(SampleLink::new(
                            &biotype.name,
                            SampleField::SampleId,
                        )));
                        if linked.name.is_some() {
                            add(ItemKind::LinkedField(SampleLink::new(
                                &biotype.name,
                                SampleField::Name,
                            )));
                        }
                    }
                    for metadata in &linked.metadata {
                        if linked.metadata_value(&metadata.name).is_none() {
                            continue;
                        }
                        add(ItemKind::LinkedField(SampleLink::new(
                            &biotype.name,
                            metadata_field(biotype, &metadata.name),
                        )));

                        // Metadata -> referenced biosample -> its fields, one hop
                        let Some(target) = &metadata.linked else {
                            continue;
                        };
                        let through = |field| {
                            ItemKind::LinkedField(SampleLink::through(
                                &biotype.name,
                                &metadata.name,
                                field,
                            ))
                        };
                        add(through(SampleField::SampleId));
                        if target.name.is_some() {
                            add(through(SampleField::Name));
                        }
                        for target_metadata in &target.metadata {
                            if target.metadata_value(&target_metadata.name).is_some() {
                                add(through(metadata_field(
                                    &target.biotype,
                                    &target_metadata.name,
                                )));
                            }
                        }
                    }
                }
            }

            let test = &result.test;
            if test.attributes.len() > 1 {
                for attribute in &test.attributes {
                    add(ItemKind::AttributeField {
                        test: test.name.clone(),
                        attribute: attribute.name.clone(),
                        attribute_type: attribute.attribute_type,
                    });
                }
            }

            // Result value -> referenced biosample -> metadata
            for value in result.value_refs() {
                if value.attribute.data_type != DataType::Biosample {
                    continue;
                }
                let Some(linked) = &value.value.linked_biosample else {
                    continue;
                };
                for metadata in &linked.metadata {
                    if linked.metadata_value(&metadata.name).is_some() {
                        add(ItemKind::CrossLinkedMetadata {
                            test: test.name.clone(),
                            attribute: value.attribute.name.clone(),
                            metadata: metadata.name.clone(),
                        });
                    }
                }
            }
        }

        let offset = STATIC_ITEMS.len() as u32;
        let dynamic: Vec<PivotItem> = candidates
            .into_values()
            .map(|kind| PivotItem::new(kind, 0))
            .filter(|item| is_populated(item, results))
            .collect();

        let mut items = STATIC_ITEMS.clone();
        items.extend(
            dynamic
                .into_iter()
                .enumerate()
                .map(|(i, item)| PivotItem::new(item.kind().clone(), offset + i as u32)),
        );
        items.sort();

        log_debug!(
            "REGISTRY",
            "discovered {} dynamic items from {} results",
            items.len() - STATIC_ITEMS.len(),
            results.len()
        );

        ItemRegistry { items }
    }

    pub fn items(&self) -> &[PivotItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&PivotItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    /// The registered item, or an unresolved placeholder that never yields a title.
    pub fn resolve(&self, name: &str) -> PivotItem {
        self.find(name)
            .cloned()
            .unwrap_or_else(|| PivotItem::unresolved(name))
    }

    pub fn by_sub_classifier<'r>(&'r self, label: &'r str) -> impl Iterator<Item = &'r PivotItem> {
        self.items
            .iter()
            .filter(move |item| item.sub_classifier() == Some(label))
    }
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata field `name`, indexed by its position in the biotype declaration.
fn metadata_field(biotype: &Biotype, name: &str) -> SampleField {
    SampleField::Metadata {
        index: biotype.metadata_index(name).unwrap_or(biotype.metadata.len()),
        name: name.to_string(),
    }
}

fn output_values(results: &[TestResult]) -> impl Iterator<Item = ValueRef<'_>> {
    results.iter().flat_map(|r| r.output_values())
}

/// True if at least one output value has a title under `item`.
pub fn is_populated(item: &PivotItem, results: &[TestResult]) -> bool {
    output_values(results).any(|v| item.title(&v).is_some())
}

/// True if `item` separates the output values of `results`.
///
/// Identifying items (group, test, output) only need one title. All other
/// items need two different titles.
pub fn is_discriminating(item: &PivotItem, results: &[TestResult]) -> bool {
    if item.as_static().map_or(false, |s| s.is_always_discriminating()) {
        return is_populated(item, results);
    }

    let mut first: Option<String> = None;
    for v in output_values(results) {
        let Some(title) = item.title(&v) else {
            continue;
        };
        match &first {
            None => first = Some(title),
            Some(baseline) if *baseline != title => return true,
            Some(_) => {}
        }
    }
    false
}
