//! FILENAME: core/pivot-engine/src/cell.rs
//! Pivot Cell - the values routed to one row/column intersection.
//!
//! A cell only stores references to its values. Everything derived from
//! them (aggregate, spread, counts, worst quality) is summarised on first
//! read and kept until the next `add_value`.

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::fmt;

use study_model::{Phase, PhaseId, Quality, ValueRef};

use crate::compare::{cmp_option, natural_cmp};
use crate::definition::{Aggregation, Deviation, Placement};
use crate::item::ItemCategory;
use crate::stats::{self, format_number, NumericAccumulator};
use crate::template::Template;

/// Shown when the values of a cell cannot be summarised.
pub const AMBIGUOUS: &str = "?";

const VALUE_SEPARATOR: &str = "; ";

// ============================================================================
// CELL VALUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Everything a cell derives from its values.
#[derive(Debug, Clone, PartialEq)]
struct CellSummary {
    aggregate: CellValue,
    deviation: Option<f64>,
    computed_average: Option<f64>,
    non_null_count: usize,
    worst_quality: Option<Quality>,
}

// ============================================================================
// PIVOT CELL
// ============================================================================

/// Identifies a nested sub-cell: the phase (when phases are shown inside
/// cells) and the cell key of its values.
#[derive(Debug, Clone, PartialEq)]
pub struct SubCellKey<'a> {
    pub phase: Option<&'a Phase>,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct PivotCell<'a> {
    template: &'a Template,
    values: Vec<ValueRef<'a>>,
    summary: OnceCell<CellSummary>,
}

impl<'a> PivotCell<'a> {
    pub fn new(template: &'a Template) -> Self {
        PivotCell {
            template,
            values: Vec::new(),
            summary: OnceCell::new(),
        }
    }

    pub fn add_value(&mut self, value: ValueRef<'a>) {
        self.values.push(value);
        self.summary.take();
    }

    pub fn values(&self) -> &[ValueRef<'a>] {
        &self.values
    }

    /// Number of contributing values, empty ones included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn aggregate(&self) -> &CellValue {
        &self.summary().aggregate
    }

    /// Standard deviation or coefficient of variation, per the template.
    /// Needs at least two numeric values.
    pub fn deviation(&self) -> Option<f64> {
        self.summary().deviation
    }

    /// Mean of the computed values, whatever the aggregation.
    pub fn computed_average(&self) -> Option<f64> {
        self.summary().computed_average
    }

    /// Number of contributing values that are not empty.
    pub fn non_null_count(&self) -> usize {
        self.summary().non_null_count
    }

    /// The most severe quality flag among the owning results.
    pub fn worst_quality(&self) -> Option<Quality> {
        self.summary().worst_quality
    }

    /// The aggregate as displayed: spread and count appended per the template.
    pub fn summary_text(&self) -> String {
        let summary = self.summary();
        let mut text = summary.aggregate.to_string();
        if text.is_empty() {
            return text;
        }
        match (self.template.deviation(), summary.deviation) {
            (Deviation::StandardDeviation, Some(sd)) => {
                text.push_str(&format!(" ± {:.2}", sd));
            }
            (Deviation::CoefficientOfVariation, Some(cv)) => {
                text.push_str(&format!(" (cv {}%)", format_number(cv)));
            }
            _ => {}
        }
        if self.template.show_n() {
            text.push_str(&format!(" [{}]", summary.non_null_count));
        }
        text
    }

    /// Splits the values by the items placed inside cells.
    ///
    /// Sub-cells are ordered by phase, then by label. The phase is only part
    /// of the key when a phase item is placed inside cells.
    pub fn nested(&self) -> Vec<(SubCellKey<'a>, PivotCell<'a>)> {
        let by_phase = self
            .template
            .has_category_at(ItemCategory::Phase, Placement::Cell);

        let mut buckets: FxHashMap<(Option<PhaseId>, String), (SubCellKey<'a>, PivotCell<'a>)> =
            FxHashMap::default();
        for value in &self.values {
            let phase = if by_phase { value.phase() } else { None };
            let label = self.template.cell_key(value);
            buckets
                .entry((phase.map(|p| p.id), label.clone()))
                .or_insert_with(|| (SubCellKey { phase, label }, PivotCell::new(self.template)))
                .1
                .add_value(*value);
        }

        let mut nested: Vec<_> = buckets.into_values().collect();
        nested.sort_by(|(a, _), (b, _)| {
            cmp_option(a.phase, b.phase, |x, y| x.cmp(y))
                .then_with(|| natural_cmp(&a.label, &b.label))
        });
        nested
    }

    fn summary(&self) -> &CellSummary {
        self.summary.get_or_init(|| self.summarize())
    }

    fn summarize(&self) -> CellSummary {
        let numbers: Vec<f64> = self.values.iter().filter_map(|v| v.double_value()).collect();
        let calculated: NumericAccumulator =
            self.values.iter().filter_map(|v| v.value.calculated).collect();

        CellSummary {
            aggregate: self.aggregate_values(&numbers),
            deviation: self.spread(&numbers),
            computed_average: calculated.average(),
            non_null_count: self.values.iter().filter(|v| !v.is_empty()).count(),
            worst_quality: self.values.iter().filter_map(|v| v.result.quality).min(),
        }
    }

    fn aggregate_values(&self, numbers: &[f64]) -> CellValue {
        let aggregation = self.template.aggregation();
        match aggregation {
            Aggregation::Hide => return CellValue::Empty,
            Aggregation::Count => return CellValue::Number(self.values.len() as f64),
            Aggregation::AllValues => return self.all_values(),
            _ => {}
        }

        let filled: Vec<&ValueRef<'a>> = self.values.iter().filter(|v| !v.is_empty()).collect();
        match filled.as_slice() {
            [] => return CellValue::Empty,
            [single] => {
                return match single.double_value() {
                    Some(n) => CellValue::Number(n),
                    None => CellValue::Text(single.value.text().trim().to_string()),
                };
            }
            _ => {}
        }

        let texts: Vec<&str> = filled
            .iter()
            .filter(|v| v.double_value().is_none())
            .map(|v| v.value.text().trim())
            .collect();
        if !texts.is_empty() {
            if !numbers.is_empty() || texts.iter().any(|t| *t != texts[0]) {
                return CellValue::Text(AMBIGUOUS.to_string());
            }
            return CellValue::Text(texts[0].to_string());
        }

        let acc: NumericAccumulator = numbers.iter().copied().collect();
        let result = match aggregation {
            Aggregation::Median => stats::median(numbers),
            Aggregation::Average => acc.average(),
            Aggregation::GeometricMean => stats::geometric_mean(numbers),
            Aggregation::Minimum => acc.min,
            Aggregation::Maximum => acc.max,
            Aggregation::Sum => Some(acc.sum),
            Aggregation::Range => {
                return match (acc.min, acc.max) {
                    (Some(min), Some(max)) => CellValue::Text(format!(
                        "{} - {}",
                        format_number(min),
                        format_number(max)
                    )),
                    _ => CellValue::Empty,
                };
            }
            Aggregation::AllValues | Aggregation::Count | Aggregation::Hide => None,
        };
        result.map_or(CellValue::Empty, CellValue::Number)
    }

    /// Non-empty values, sorted, joined by "; ".
    fn all_values(&self) -> CellValue {
        let mut filled: Vec<&ValueRef<'a>> =
            self.values.iter().filter(|v| !v.is_empty()).collect();
        if filled.is_empty() {
            return CellValue::Empty;
        }
        filled.sort_by(|a, b| value_order(a, b));
        let joined = filled
            .iter()
            .map(|v| v.value.text().trim())
            .collect::<Vec<_>>()
            .join(VALUE_SEPARATOR);
        CellValue::Text(joined)
    }

    fn spread(&self, numbers: &[f64]) -> Option<f64> {
        if numbers.len() < 2 {
            return None;
        }
        let acc: NumericAccumulator = numbers.iter().copied().collect();
        match self.template.deviation() {
            Deviation::None => None,
            Deviation::StandardDeviation => acc.std_dev(),
            Deviation::CoefficientOfVariation => {
                stats::coefficient_of_variation(acc.std_dev()?, acc.average()?)
            }
        }
    }
}

/// Numbers by value and before text; text in natural order.
fn value_order(a: &ValueRef<'_>, b: &ValueRef<'_>) -> Ordering {
    match (a.double_value(), b.double_value()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => natural_cmp(a.value.text().trim(), b.value.text().trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::StaticItem;
    use std::sync::Arc;
    use study_model::{AttributeType, DataType, Test, TestResult};

    fn results(values: &[&str]) -> Vec<TestResult> {
        let test = Arc::new(
            Test::new(1, "Observation", "In Vivo")
                .with_attribute(1, "Reading", AttributeType::Output, DataType::Alpha),
        );
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TestResult::new(i as u32 + 1, test.clone()).with_value("Reading", v))
            .collect()
    }

    fn cell<'a>(template: &'a Template, results: &'a [TestResult]) -> PivotCell<'a> {
        let mut cell = PivotCell::new(template);
        for value in results.iter().flat_map(|r| r.output_values()) {
            cell.add_value(value);
        }
        cell
    }

    fn template(aggregation: Aggregation) -> Template {
        let mut template = Template::new("t");
        template.set_aggregation(aggregation);
        template
    }

    #[test]
    fn test_average_and_standard_deviation() {
        let mut t = template(Aggregation::Average);
        t.set_deviation(Deviation::StandardDeviation);
        let results = results(&["5.0", "7.0", "9.0"]);
        let cell = cell(&t, &results);
        assert_eq!(cell.aggregate(), &CellValue::Number(7.0));
        assert_eq!(cell.deviation(), Some(2.0));
        assert_eq!(cell.summary_text(), "7 ± 2.00");
    }

    #[test]
    fn test_coefficient_of_variation() {
        let mut t = template(Aggregation::Average);
        t.set_deviation(Deviation::CoefficientOfVariation);
        let results = results(&["5", "7", "9"]);
        let cell = cell(&t, &results);
        assert_eq!(cell.deviation(), Some(29.0));
        assert_eq!(cell.summary_text(), "7 (cv 29%)");
    }

    #[test]
    fn test_text_values_agree_or_are_ambiguous() {
        let t = template(Aggregation::Median);
        let same = results(&["red", "red"]);
        assert_eq!(cell(&t, &same).aggregate(), &CellValue::Text("red".to_string()));
        let differ = results(&["red", "blue"]);
        assert_eq!(cell(&t, &differ).aggregate(), &CellValue::Text(AMBIGUOUS.to_string()));
        let mixed = results(&["red", "4"]);
        assert_eq!(cell(&t, &mixed).aggregate(), &CellValue::Text(AMBIGUOUS.to_string()));
    }

    #[test]
    fn test_single_value_ignores_the_mode() {
        let results = results(&["12.5", ""]);
        for aggregation in [Aggregation::Median, Aggregation::Sum, Aggregation::Range] {
            let t = template(aggregation);
            assert_eq!(cell(&t, &results).aggregate(), &CellValue::Number(12.5));
        }
        let text = self::results(&["  pale "]);
        let t = template(Aggregation::Average);
        assert_eq!(cell(&t, &text).aggregate(), &CellValue::Text("pale".to_string()));
    }

    #[test]
    fn test_count_includes_empty_values() {
        let t = template(Aggregation::Count);
        let results = results(&["1", "", "abc"]);
        let cell = cell(&t, &results);
        assert_eq!(cell.aggregate(), &CellValue::Number(3.0));
        assert_eq!(cell.non_null_count(), 2);
    }

    #[test]
    fn test_numeric_modes() {
        let results = results(&["2", "8", "4"]);
        let expect = |aggregation, expected: CellValue| {
            let t = template(aggregation);
            assert_eq!(cell(&t, &results).aggregate(), &expected);
        };
        expect(Aggregation::Median, CellValue::Number(4.0));
        expect(Aggregation::Minimum, CellValue::Number(2.0));
        expect(Aggregation::Maximum, CellValue::Number(8.0));
        expect(Aggregation::Sum, CellValue::Number(14.0));
        expect(Aggregation::Range, CellValue::Text("2 - 8".to_string()));
        expect(Aggregation::Hide, CellValue::Empty);

        let t = template(Aggregation::GeometricMean);
        let negative = self::results(&["2", "-8"]);
        assert!(cell(&t, &negative).aggregate().as_number().unwrap().is_nan());
    }

    #[test]
    fn test_all_values_are_sorted() {
        let t = template(Aggregation::AllValues);
        let results = results(&["Grade 10", "10", "", "2", "Grade 2"]);
        assert_eq!(
            cell(&t, &results).aggregate(),
            &CellValue::Text("2; 10; Grade 2; Grade 10".to_string())
        );
        let empty = self::results(&["", " "]);
        assert_eq!(cell(&t, &empty).aggregate(), &CellValue::Empty);
    }

    #[test]
    fn test_quality_and_computed_average() {
        let t = template(Aggregation::Average);
        let mut results = results(&["1", "2", "3"]);
        results[0].quality = Some(Quality::Valid);
        results[1].quality = Some(Quality::Questionable);
        results[0].values[0].calculated = Some(1.0);
        results[2].values[0].calculated = Some(2.0);
        let cell = cell(&t, &results);
        assert_eq!(cell.worst_quality(), Some(Quality::Questionable));
        assert_eq!(cell.computed_average(), Some(1.5));

        let plain = self::results(&["1"]);
        assert_eq!(self::cell(&t, &plain).worst_quality(), None);
    }

    #[test]
    fn test_summary_is_refreshed_by_add_value() {
        let t = template(Aggregation::Sum);
        let results = results(&["1", "2", "3"]);
        let mut values = results.iter().flat_map(|r| r.output_values());
        let mut cell = PivotCell::new(&t);
        cell.add_value(values.next().unwrap());
        assert_eq!(cell.aggregate(), &CellValue::Number(1.0));
        cell.add_value(values.next().unwrap());
        assert_eq!(cell.aggregate(), &CellValue::Number(3.0));
    }

    #[test]
    fn test_show_n() {
        let mut t = template(Aggregation::Average);
        t.set_show_n(true);
        let results = results(&["2", "", "4"]);
        assert_eq!(cell(&t, &results).summary_text(), "3 [2]");
    }

    #[test]
    fn test_nested_by_cell_items() {
        let mut t = template(Aggregation::Sum);
        t.place(&[StaticItem::Comments], Placement::Cell);
        let mut results = results(&["1", "2", "3", "4"]);
        results[0].comments = Some("fasted".to_string());
        results[1].comments = Some("fed".to_string());
        results[2].comments = Some("fasted".to_string());

        let cell = cell(&t, &results);
        let nested = cell.nested();
        let labels: Vec<_> = nested.iter().map(|(k, _)| k.label.as_str()).collect();
        assert_eq!(labels, vec!["\n", "fasted\n", "fed\n"]);
        assert_eq!(nested[1].1.aggregate(), &CellValue::Number(4.0));
        assert!(nested.iter().all(|(k, _)| k.phase.is_none()));
    }
}
