//! FILENAME: core/pivot-engine/src/computed.rs
//! Computed-Value Pass - derives per-value deltas before aggregation.
//!
//! Values are compared within a series: the results sharing biosample, test
//! and input values. The derived number is written to each value's
//! `calculated` scratch slot, which this pass owns. Every slot is cleared
//! first, so a pass in mode `None` leaves no stale numbers behind.

use rustc_hash::FxHashMap;

use study_model::{AttributeId, BiosampleId, Phase, TestId, TestResult};

use crate::definition::ComputedMode;
use crate::logging::log_debug;
use crate::stats::truncate2;

/// Identifies the results whose values are comparable over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    biosample: Option<BiosampleId>,
    test: TestId,
    inputs: String,
}

impl SeriesKey {
    fn of(result: &TestResult) -> Self {
        SeriesKey {
            biosample: result.biosample.as_ref().map(|b| b.id),
            test: result.test.id,
            inputs: result.input_values_string(),
        }
    }
}

/// Rewrites the `calculated` slot of every value in `results`.
pub fn apply_computed_values(mode: ComputedMode, results: &mut [TestResult]) {
    for result in results.iter_mut() {
        for value in result.values.iter_mut() {
            value.calculated = None;
        }
    }
    if mode == ComputedMode::None {
        return;
    }

    let mut series: FxHashMap<SeriesKey, Vec<usize>> = FxHashMap::default();
    for (index, result) in results.iter().enumerate() {
        series.entry(SeriesKey::of(result)).or_default().push(index);
    }

    // Read everything first, then write
    let mut updates: Vec<(usize, AttributeId, f64)> = Vec::new();
    for members in series.values() {
        for &index in members {
            let result = &results[index];
            let Some(phase) = result.inherited_phase() else {
                continue;
            };
            for attribute in result.test.outputs().filter(|a| a.data_type.is_numeric()) {
                let Some(current) = result.value(attribute.id).and_then(|v| v.double_value()) else {
                    continue;
                };
                let computed = match mode {
                    ComputedMode::DeltaPerDay => {
                        let earlier = numeric_candidates(results, members, Some(index), attribute.id);
                        delta_per_day(phase, current, &earlier)
                    }
                    ComputedMode::DeltaFromDayZero => {
                        let series = numeric_candidates(results, members, None, attribute.id);
                        baseline(phase, &series).map(|base| current - base)
                    }
                    ComputedMode::PercentFromDayZero => {
                        let series = numeric_candidates(results, members, None, attribute.id);
                        baseline(phase, &series)
                            .filter(|base| current > 0.0 && *base > 0.0)
                            .map(|base| 100.0 * (current - base) / base)
                    }
                    ComputedMode::None => None,
                };
                if let Some(computed) = computed.filter(|c| c.is_finite()) {
                    updates.push((index, attribute.id, truncate2(computed)));
                }
            }
        }
    }

    log_debug!(
        "COMPUTED",
        "{} values computed over {} series ({})",
        updates.len(),
        series.len(),
        mode.label()
    );

    for (index, attribute_id, computed) in updates {
        if let Some(slot) = results[index]
            .values
            .iter_mut()
            .find(|v| v.attribute_id == attribute_id)
        {
            slot.calculated = Some(computed);
        }
    }
}

/// Members of the series with a phase and a number for `attribute_id`,
/// latest phase first.
fn numeric_candidates<'r>(
    results: &'r [TestResult],
    members: &[usize],
    skip: Option<usize>,
    attribute_id: AttributeId,
) -> Vec<(&'r Phase, f64)> {
    let mut candidates: Vec<(&Phase, f64)> = members
        .iter()
        .filter(|&&j| Some(j) != skip)
        .filter_map(|&j| {
            let other = &results[j];
            let phase: &Phase = other.inherited_phase()?;
            let value = other.value(attribute_id)?.double_value()?;
            Some((phase, value))
        })
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(a.0));
    candidates
}

/// Difference to the latest earlier-day value, per elapsed day.
///
/// Another value on the same day ends the search without a result: a later
/// time on the same day must not be mistaken for a predecessor, and an
/// earlier one would divide by zero days.
fn delta_per_day(phase: &Phase, current: f64, candidates: &[(&Phase, f64)]) -> Option<f64> {
    for (other, value) in candidates {
        if other.days > phase.days {
            continue;
        }
        if other.days == phase.days {
            return None;
        }
        return Some((current - value) / (phase.days - other.days) as f64);
    }
    None
}

/// The series value measured closest to day zero, within one day of it.
/// A result measured at the baseline phase itself gets nothing.
fn baseline(phase: &Phase, candidates: &[(&Phase, f64)]) -> Option<f64> {
    let (base_phase, value) = candidates
        .iter()
        .filter(|(p, _)| p.days.abs() <= 1)
        .min_by(|a, b| {
            a.0.total_minutes()
                .abs()
                .cmp(&b.0.total_minutes().abs())
                .then_with(|| a.0.cmp(b.0))
        })?;
    if *base_phase == phase {
        return None;
    }
    Some(*value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use study_model::{AttributeType, Biosample, Biotype, DataType, Test};

    struct Series {
        test: Arc<Test>,
        animal: Arc<Biosample>,
    }

    impl Series {
        fn new() -> Self {
            Series {
                test: Arc::new(
                    Test::new(1, "Weighing", "In Vivo")
                        .with_attribute(1, "Weight", AttributeType::Output, DataType::Number)
                        .with_attribute(2, "Note", AttributeType::Output, DataType::Alpha),
                ),
                animal: Arc::new(Biosample::new(1, "AN-1", Arc::new(Biotype::new(1, "Animal")))),
            }
        }

        fn at(&self, id: u32, phase: Phase, weight: &str) -> TestResult {
            TestResult::new(id, self.test.clone())
                .with_biosample(self.animal.clone())
                .with_phase(Arc::new(phase))
                .with_value("Weight", weight)
                .with_value("Note", "12")
        }
    }

    fn calculated(result: &TestResult, attribute: &str) -> Option<f64> {
        result.value_by_name(attribute).and_then(|v| v.calculated)
    }

    #[test]
    fn test_delta_from_day_zero() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "10.0"),
            s.at(2, Phase::new(2, "d2", 2, 0, 0), "14.0"),
        ];
        apply_computed_values(ComputedMode::DeltaFromDayZero, &mut results);
        assert_eq!(calculated(&results[1], "Weight"), Some(4.0));
        assert_eq!(calculated(&results[0], "Weight"), None);
        // Text outputs never participate
        assert_eq!(calculated(&results[1], "Note"), None);
    }

    #[test]
    fn test_percent_needs_positive_values() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "8"),
            s.at(2, Phase::new(2, "d7", 7, 0, 0), "10"),
            s.at(3, Phase::new(3, "d14", 14, 0, 0), "-1"),
        ];
        apply_computed_values(ComputedMode::PercentFromDayZero, &mut results);
        assert_eq!(calculated(&results[1], "Weight"), Some(25.0));
        assert_eq!(calculated(&results[2], "Weight"), None);
    }

    #[test]
    fn test_baseline_prefers_time_closest_to_zero() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d-1", -1, 0, 0), "9"),
            s.at(2, Phase::new(2, "d0 2h", 0, 2, 0), "10"),
            s.at(3, Phase::new(3, "d5", 5, 0, 0), "13"),
        ];
        apply_computed_values(ComputedMode::DeltaFromDayZero, &mut results);
        assert_eq!(calculated(&results[2], "Weight"), Some(3.0));
        assert_eq!(calculated(&results[0], "Weight"), Some(-1.0));
        assert_eq!(calculated(&results[1], "Weight"), None);
    }

    #[test]
    fn test_delta_per_day_uses_previous_day() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "10"),
            s.at(2, Phase::new(2, "d3", 3, 0, 0), "11"),
            s.at(3, Phase::new(3, "d7", 7, 0, 0), "12"),
        ];
        apply_computed_values(ComputedMode::DeltaPerDay, &mut results);
        assert_eq!(calculated(&results[0], "Weight"), None);
        // 1 / 3 truncated
        assert_eq!(calculated(&results[1], "Weight"), Some(0.33));
        assert_eq!(calculated(&results[2], "Weight"), Some(0.25));
    }

    #[test]
    fn test_delta_per_day_gives_up_on_same_day() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "10"),
            s.at(2, Phase::new(2, "d3", 3, 0, 0), "11"),
            s.at(3, Phase::new(3, "d3 4h", 3, 4, 0), "12"),
        ];
        apply_computed_values(ComputedMode::DeltaPerDay, &mut results);
        assert_eq!(calculated(&results[1], "Weight"), None);
        assert_eq!(calculated(&results[2], "Weight"), None);
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "1.000"),
            s.at(2, Phase::new(2, "d1", 1, 0, 0), "1.126"),
        ];
        apply_computed_values(ComputedMode::DeltaFromDayZero, &mut results);
        assert_eq!(calculated(&results[1], "Weight"), Some(0.12));
    }

    #[test]
    fn test_none_clears_previous_values() {
        let s = Series::new();
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "10"),
            s.at(2, Phase::new(2, "d2", 2, 0, 0), "14"),
        ];
        apply_computed_values(ComputedMode::DeltaFromDayZero, &mut results);
        assert!(calculated(&results[1], "Weight").is_some());
        apply_computed_values(ComputedMode::None, &mut results);
        assert!(results.iter().flat_map(|r| &r.values).all(|v| v.calculated.is_none()));
    }

    #[test]
    fn test_series_are_separated_by_sample() {
        let s = Series::new();
        let other = Arc::new(Biosample::new(2, "AN-2", Arc::new(Biotype::new(1, "Animal"))));
        let mut results = vec![
            s.at(1, Phase::new(1, "d0", 0, 0, 0), "10"),
            s.at(2, Phase::new(2, "d2", 2, 0, 0), "14").with_biosample(other),
        ];
        apply_computed_values(ComputedMode::DeltaFromDayZero, &mut results);
        assert_eq!(calculated(&results[1], "Weight"), None);
    }
}
