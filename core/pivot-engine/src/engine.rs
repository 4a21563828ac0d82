//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - routes every output value into a row, a column and a cell.
//!
//! This module takes a result set and a Template and produces a PivotTable:
//! ordered rows, ordered columns and the cells at their intersections.
//!
//! Algorithm:
//! 1. Run the computed-value pass for the template's mode
//! 2. Group results by test and find the skippable attributes and subjects
//! 3. Route each surviving output value by its row key and column key
//! 4. Sort rows and columns
//!
//! Nothing is cached between calls: each build starts from scratch.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;

use study_model::{
    AttributeId, BiosampleId, Group, Phase, Test, TestAttribute, TestId, TestResult, ValueRef,
};

use crate::cell::PivotCell;
use crate::compare::{cmp_option, natural_cmp};
use crate::computed::apply_computed_values;
use crate::definition::Placement;
use crate::item::{ItemCategory, StaticItem};
use crate::logging::{log_debug, log_enter, log_exit};
use crate::template::{Template, KEY_SEPARATOR};

// ============================================================================
// ROWS AND COLUMNS
// ============================================================================

/// A row of the pivot table. Group, phase and test are only set when the
/// matching items are placed as rows; they drive ordering, not identity.
#[derive(Debug, Clone)]
pub struct PivotRow<'a> {
    pub key: String,
    pub group: Option<&'a Group>,
    pub phase: Option<&'a Phase>,
    pub test: Option<&'a Test>,
}

impl<'a> PivotRow<'a> {
    /// One line per row item.
    pub fn title_lines(&self) -> Vec<&str> {
        split_key(&self.key)
    }

    fn cmp_sorted(&self, other: &Self) -> Ordering {
        cmp_option(self.group, other.group, cmp_group)
            .then_with(|| cmp_option(self.phase, other.phase, |a, b| a.cmp(b)))
            .then_with(|| cmp_option(self.test, other.test, |a, b| a.cmp(b)))
            .then_with(|| natural_cmp(&self.key, &other.key))
    }
}

/// A column of the pivot table. The phase is set when a phase item is
/// placed as column, the attribute when the output item is.
#[derive(Debug, Clone)]
pub struct PivotColumn<'a> {
    pub key: String,
    pub phase: Option<&'a Phase>,
    pub attribute: Option<(&'a Test, &'a TestAttribute)>,
}

impl<'a> PivotColumn<'a> {
    pub fn title_lines(&self) -> Vec<&str> {
        split_key(&self.key)
    }

    /// Test and attribute order first, then phase, then the title.
    fn cmp_sorted(&self, other: &Self) -> Ordering {
        cmp_option(self.attribute, other.attribute, |(ta, a), (tb, b)| {
            ta.cmp(tb).then_with(|| a.index.cmp(&b.index))
        })
        .then_with(|| cmp_option(self.phase, other.phase, |a, b| a.cmp(b)))
        .then_with(|| natural_cmp(&self.key, &other.key))
    }
}

fn cmp_group(a: &Group, b: &Group) -> Ordering {
    natural_cmp(&a.name, &b.name).then_with(|| a.id.cmp(&b.id))
}

fn split_key(key: &str) -> Vec<&str> {
    key.strip_suffix(KEY_SEPARATOR)
        .unwrap_or(key)
        .split(KEY_SEPARATOR)
        .collect()
}

// ============================================================================
// PIVOT TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct PivotTable<'a> {
    template: &'a Template,
    rows: Vec<PivotRow<'a>>,
    columns: Vec<PivotColumn<'a>>,
    cells: FxHashMap<(String, String), PivotCell<'a>>,
    value_count: usize,
}

impl<'a> PivotTable<'a> {
    pub fn template(&self) -> &'a Template {
        self.template
    }

    pub fn rows(&self) -> &[PivotRow<'a>] {
        &self.rows
    }

    pub fn columns(&self) -> &[PivotColumn<'a>] {
        &self.columns
    }

    pub fn cell(&self, row: &PivotRow<'_>, column: &PivotColumn<'_>) -> Option<&PivotCell<'a>> {
        self.cell_by_keys(&row.key, &column.key)
    }

    pub fn cell_by_keys(&self, row_key: &str, column_key: &str) -> Option<&PivotCell<'a>> {
        self.cells.get(&(row_key.to_string(), column_key.to_string()))
    }

    /// Populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&PivotRow<'a>, &PivotColumn<'a>, &PivotCell<'a>)> {
        self.rows.iter().flat_map(move |row| {
            self.columns
                .iter()
                .filter_map(move |column| self.cell(row, column).map(|cell| (row, column, cell)))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of values routed into cells.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// CALCULATION
// ============================================================================

/// Identifies the record subject: the biosample a result was measured on.
type Subject = Option<BiosampleId>;

fn subject(result: &TestResult) -> Subject {
    result.biosample.as_ref().map(|b| b.id)
}

struct PivotBuilder<'a> {
    template: &'a Template,
    group_in_rows: bool,
    phase_in_rows: bool,
    test_in_rows: bool,
    phase_in_columns: bool,
    output_in_columns: bool,
    rows: Vec<PivotRow<'a>>,
    row_index: FxHashMap<String, usize>,
    columns: Vec<PivotColumn<'a>>,
    column_index: FxHashMap<String, usize>,
    cells: FxHashMap<(String, String), PivotCell<'a>>,
    value_count: usize,
}

impl<'a> PivotBuilder<'a> {
    fn new(template: &'a Template) -> Self {
        PivotBuilder {
            template,
            group_in_rows: template.is_placed(StaticItem::Group, Placement::Row),
            phase_in_rows: template.has_category_at(ItemCategory::Phase, Placement::Row),
            test_in_rows: template.is_placed(StaticItem::Test, Placement::Row),
            phase_in_columns: template.has_category_at(ItemCategory::Phase, Placement::Column),
            output_in_columns: template.is_placed(StaticItem::Output, Placement::Column),
            rows: Vec::new(),
            row_index: FxHashMap::default(),
            columns: Vec::new(),
            column_index: FxHashMap::default(),
            cells: FxHashMap::default(),
            value_count: 0,
        }
    }

    fn route(&mut self, value: ValueRef<'a>) {
        let row_key = self.template.row_key(&value);
        let column_key = self.template.column_key(&value);

        if !self.row_index.contains_key(&row_key) {
            let result = value.result;
            self.row_index.insert(row_key.clone(), self.rows.len());
            self.rows.push(PivotRow {
                key: row_key.clone(),
                group: if self.group_in_rows { result.group().map(|g| g.as_ref()) } else { None },
                phase: if self.phase_in_rows { value.phase() } else { None },
                test: if self.test_in_rows { Some(result.test.as_ref()) } else { None },
            });
        }

        if !self.column_index.contains_key(&column_key) {
            self.column_index.insert(column_key.clone(), self.columns.len());
            self.columns.push(PivotColumn {
                key: column_key.clone(),
                phase: if self.phase_in_columns { value.phase() } else { None },
                attribute: if self.output_in_columns {
                    Some((value.result.test.as_ref(), value.attribute))
                } else {
                    None
                },
            });
        }

        let template = self.template;
        self.cells
            .entry((row_key, column_key))
            .or_insert_with(|| PivotCell::new(template))
            .add_value(value);
        self.value_count += 1;
    }

    fn finish(mut self) -> PivotTable<'a> {
        self.rows.sort_by(|a, b| a.cmp_sorted(b));
        self.columns.sort_by(|a, b| a.cmp_sorted(b));
        PivotTable {
            template: self.template,
            rows: self.rows,
            columns: self.columns,
            cells: self.cells,
            value_count: self.value_count,
        }
    }
}

/// Builds the pivot table of `results` under `template`.
///
/// The computed-value pass rewrites the `calculated` slot of every value
/// first, which is why the results are borrowed mutably. Output attributes
/// in `excluded` are left out.
///
/// Empty values are suppressed when the attribute is filled for some result
/// of the test, the subject has no filled output at all, and the same test
/// and subject already contributed a value. At least one value per test and
/// subject therefore always survives.
pub fn calculate_pivot<'a>(
    results: &'a mut [TestResult],
    excluded: &[AttributeId],
    template: &'a Template,
) -> PivotTable<'a> {
    log_enter!(
        "PIVOT",
        "calculate_pivot",
        "results={} template='{}'",
        results.len(),
        template.name()
    );

    apply_computed_values(template.computed(), results);
    let results: &'a [TestResult] = results;

    // Group by test, tests in their natural order
    let mut by_test: FxHashMap<TestId, Vec<&'a TestResult>> = FxHashMap::default();
    let mut tests: Vec<&'a Test> = Vec::new();
    for result in results {
        let members = by_test.entry(result.test.id).or_default();
        if members.is_empty() {
            tests.push(result.test.as_ref());
        }
        members.push(result);
    }
    tests.sort();

    // Attributes filled by at least one result of their test
    let mut skippable_attributes: FxHashSet<(TestId, AttributeId)> = FxHashSet::default();
    // Subjects with at least one filled output
    let mut filled_subjects: FxHashSet<Subject> = FxHashSet::default();
    for result in results {
        if result.has_any_output() {
            filled_subjects.insert(subject(result));
        }
        for value in result.output_values().filter(|v| !v.is_empty()) {
            skippable_attributes.insert((result.test.id, value.attribute.id));
        }
    }

    let mut builder = PivotBuilder::new(template);
    let mut produced: FxHashSet<(TestId, Subject)> = FxHashSet::default();
    let mut suppressed = 0usize;

    for test in &tests {
        let members = by_test.get(&test.id).map(Vec::as_slice).unwrap_or_default();
        let mut outputs: Vec<&TestAttribute> = test.outputs().collect();
        outputs.sort_by_key(|a| a.index);

        for attribute in outputs {
            if excluded.contains(&attribute.id) {
                continue;
            }
            for &result in members {
                let Some(value) = result.value_ref(attribute.id) else {
                    continue;
                };
                let pair = (test.id, subject(result));
                if value.is_empty()
                    && skippable_attributes.contains(&(test.id, attribute.id))
                    && !filled_subjects.contains(&pair.1)
                    && produced.contains(&pair)
                {
                    suppressed += 1;
                    continue;
                }
                builder.route(value);
                produced.insert(pair);
            }
        }
    }

    let table = builder.finish();

    log_debug!(
        "PIVOT",
        "'{}': {} rows x {} columns, {} cells, {} values ({} empty suppressed)",
        template.name(),
        table.rows.len(),
        table.columns.len(),
        table.cells.len(),
        table.value_count,
        suppressed
    );
    log_exit!("PIVOT", "calculate_pivot", "rows={}", table.rows.len());

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Aggregation;
    use crate::cell::CellValue;
    use std::sync::Arc;
    use study_model::{AttributeType, Biosample, Biotype, DataType};

    struct Fixture {
        weighing: Arc<Test>,
        animal_type: Arc<Biotype>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                weighing: Arc::new(
                    Test::new(1, "Weighing", "In Vivo")
                        .with_attribute(1, "Weight", AttributeType::Output, DataType::Number)
                        .with_attribute(2, "Food", AttributeType::Output, DataType::Number),
                ),
                animal_type: Arc::new(Biotype::new(1, "Animal")),
            }
        }

        fn animal(&self, id: u32) -> Arc<Biosample> {
            Arc::new(Biosample::new(id, &format!("AN-{}", id), self.animal_type.clone()))
        }

        fn weighing(&self, id: u32, animal: &Arc<Biosample>, weight: &str, food: &str) -> TestResult {
            TestResult::new(id, self.weighing.clone())
                .with_biosample(animal.clone())
                .with_value("Weight", weight)
                .with_value("Food", food)
        }
    }

    #[test]
    fn test_empty_input_gives_empty_table() {
        let template = Template::new("t");
        let mut results: Vec<TestResult> = Vec::new();
        let table = calculate_pivot(&mut results, &[], &template);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
        assert_eq!(table.cells().count(), 0);
    }

    #[test]
    fn test_nothing_placed_gives_one_bucket() {
        let f = Fixture::new();
        let (a, b) = (f.animal(1), f.animal(2));
        let mut results = vec![f.weighing(1, &a, "20", "3"), f.weighing(2, &b, "22", "4")];
        let mut template = Template::new("t");
        template.set_aggregation(Aggregation::Count);

        let table = calculate_pivot(&mut results, &[], &template);
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.columns().len(), 1);
        assert_eq!(table.columns()[0].key, "Count");
        let (_, _, cell) = table.cells().next().unwrap();
        assert_eq!(cell.aggregate(), &CellValue::Number(4.0));
    }

    #[test]
    fn test_excluded_attributes_are_left_out() {
        let f = Fixture::new();
        let a = f.animal(1);
        let mut results = vec![f.weighing(1, &a, "20", "3")];
        let mut template = Template::new("t");
        template.place(&[StaticItem::Output], Placement::Column);

        let table = calculate_pivot(&mut results, &[2], &template);
        let keys: Vec<_> = table.columns().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["Weight\n"]);
        assert_eq!(table.value_count(), 1);
    }

    #[test]
    fn test_empty_values_of_blank_subjects_are_suppressed() {
        let f = Fixture::new();
        let (a, b) = (f.animal(1), f.animal(2));
        let mut results = vec![
            f.weighing(1, &a, "20", ""),
            f.weighing(2, &b, "", ""),
            f.weighing(3, &b, "", ""),
        ];
        let mut template = Template::new("t");
        template.place(&[StaticItem::TopSampleId], Placement::Row);
        template.place(&[StaticItem::Output], Placement::Column);

        let table = calculate_pivot(&mut results, &[], &template);
        let rows: Vec<_> = table.rows().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(rows, vec!["AN-1\n", "AN-2\n"]);

        // AN-1 has data: its empty food value stays
        assert!(table.cell_by_keys("AN-1\n", "Food\n").is_some());
        // AN-2 is blank: only the first weight survives; food is never filled
        let weight = table.cell_by_keys("AN-2\n", "Weight\n").unwrap();
        assert_eq!(weight.len(), 1);
        assert_eq!(table.cell_by_keys("AN-2\n", "Food\n").unwrap().len(), 2);
    }

    #[test]
    fn test_rows_and_columns_are_sorted() {
        let f = Fixture::new();
        let animals: Vec<_> = [10, 2, 1].iter().map(|id| f.animal(*id)).collect();
        let mut results: Vec<TestResult> = animals
            .iter()
            .enumerate()
            .map(|(i, a)| f.weighing(i as u32 + 1, a, "20", "3"))
            .collect();
        let mut template = Template::new("t");
        template.place(&[StaticItem::TopSampleId], Placement::Row);
        template.place(&[StaticItem::Output], Placement::Column);

        let table = calculate_pivot(&mut results, &[], &template);
        let rows: Vec<_> = table.rows().iter().map(|r| r.title_lines()[0]).collect();
        assert_eq!(rows, vec!["AN-1", "AN-2", "AN-10"]);
        // Declaration order of the attributes, not the alphabet
        let columns: Vec<_> = table.columns().iter().map(|c| c.title_lines()[0]).collect();
        assert_eq!(columns, vec!["Weight", "Food"]);
        assert!(table.columns()[0].attribute.is_some());
    }

    #[test]
    fn test_title_lines_keep_empty_items() {
        let row = PivotRow {
            key: "A\n\nC\n".to_string(),
            group: None,
            phase: None,
            test: None,
        };
        assert_eq!(row.title_lines(), vec!["A", "", "C"]);
    }
}
