//! FILENAME: core/study-model/src/result.rs
//! PURPOSE: Test results (the records fed to the pivot engine) and their values.
//! CONTEXT: A `TestResult` holds one value slot per attribute of its test.
//! The only field the pivot engine ever writes is `ResultValue::calculated`,
//! a scratch slot owned by the computed-value pass.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::biosample::Biosample;
use crate::measurement::{AttributeId, AttributeType, Test, TestAttribute};
use crate::study::{Group, Phase, Study};

pub type ResultId = u32;

/// Quality flag of a result. Lower ids are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    Bogus = 1,
    Questionable = 2,
    Valid = 3,
    Confirmed = 4,
}

impl Quality {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Quality::Bogus => "Bogus",
            Quality::Questionable => "Questionable",
            Quality::Valid => "Valid",
            Quality::Confirmed => "Confirmed",
        }
    }
}

/// The value of one attribute inside a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultValue {
    pub attribute_id: AttributeId,
    /// Raw textual representation, as entered.
    pub value: Option<String>,
    /// Referenced biosample for `DataType::Biosample` attributes.
    #[serde(default)]
    pub linked_biosample: Option<Arc<Biosample>>,
    /// Scratch slot written by the computed-value pass.
    #[serde(skip)]
    pub calculated: Option<f64>,
}

impl ResultValue {
    pub fn new(attribute_id: AttributeId) -> Self {
        ResultValue {
            attribute_id,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.as_deref().map_or(true, |v| v.trim().is_empty())
    }

    /// The raw text, empty when unset.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Parsed numeric value; unparsable text yields `None`.
    pub fn double_value(&self) -> Option<f64> {
        self.value
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite())
    }
}

/// One measurement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: ResultId,
    pub test: Arc<Test>,
    #[serde(default)]
    pub biosample: Option<Arc<Biosample>>,
    #[serde(default)]
    pub phase: Option<Arc<Phase>>,
    pub values: Vec<ResultValue>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub elb: Option<String>,
}

impl TestResult {
    /// Creates a result with one empty value per attribute of `test`.
    pub fn new(id: ResultId, test: Arc<Test>) -> Self {
        let values = test
            .attributes
            .iter()
            .map(|a| ResultValue::new(a.id))
            .collect();
        TestResult {
            id,
            test,
            biosample: None,
            phase: None,
            values,
            comments: None,
            quality: None,
            elb: None,
        }
    }

    pub fn with_biosample(mut self, biosample: Arc<Biosample>) -> Self {
        self.biosample = Some(biosample);
        self
    }

    pub fn with_phase(mut self, phase: Arc<Phase>) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Sets the raw text of the attribute named `attribute`. Unknown names are ignored.
    pub fn with_value(mut self, attribute: &str, value: &str) -> Self {
        self.set_value(attribute, value);
        self
    }

    pub fn with_linked_sample(mut self, attribute: &str, sample: Arc<Biosample>) -> Self {
        if let Some(slot) = self.slot_mut(attribute) {
            slot.value = Some(sample.sample_id.clone());
            slot.linked_biosample = Some(sample);
        }
        self
    }

    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_elb(mut self, elb: &str) -> Self {
        self.elb = Some(elb.to_string());
        self
    }

    pub fn set_value(&mut self, attribute: &str, value: &str) {
        if let Some(slot) = self.slot_mut(attribute) {
            slot.value = Some(value.to_string());
        }
    }

    fn slot_mut(&mut self, attribute: &str) -> Option<&mut ResultValue> {
        let id = self.test.attribute_by_name(attribute)?.id;
        self.values.iter_mut().find(|v| v.attribute_id == id)
    }

    pub fn value(&self, attribute_id: AttributeId) -> Option<&ResultValue> {
        self.values.iter().find(|v| v.attribute_id == attribute_id)
    }

    pub fn value_by_name(&self, attribute: &str) -> Option<&ResultValue> {
        let id = self.test.attribute_by_name(attribute)?.id;
        self.value(id)
    }

    /// Handle on the value of `attribute_id`, if the slot exists.
    pub fn value_ref(&self, attribute_id: AttributeId) -> Option<ValueRef<'_>> {
        let attribute = self.test.attribute(attribute_id)?;
        let value = self.value(attribute_id)?;
        Some(ValueRef {
            result: self,
            value,
            attribute,
        })
    }

    /// All values whose attribute is declared by the test, in storage order.
    pub fn value_refs(&self) -> impl Iterator<Item = ValueRef<'_>> {
        self.values.iter().filter_map(move |value| {
            self.test.attribute(value.attribute_id).map(|attribute| ValueRef {
                result: self,
                value,
                attribute,
            })
        })
    }

    pub fn output_values(&self) -> impl Iterator<Item = ValueRef<'_>> {
        self.value_refs()
            .filter(|v| v.attribute.attribute_type == AttributeType::Output)
    }

    /// Non-empty input values, in attribute order, joined by a space.
    pub fn input_values_string(&self) -> String {
        let mut inputs: Vec<&TestAttribute> = self.test.inputs().collect();
        inputs.sort_by_key(|a| a.index);
        inputs
            .iter()
            .filter_map(|a| self.value(a.id))
            .filter(|v| !v.is_empty())
            .map(|v| v.text().trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The result's own phase, or the phase of its biosample.
    pub fn inherited_phase(&self) -> Option<&Arc<Phase>> {
        self.phase
            .as_ref()
            .or_else(|| self.biosample.as_ref().and_then(|b| b.inherited_phase()))
    }

    pub fn study(&self) -> Option<&Arc<Study>> {
        self.biosample.as_ref().and_then(|b| b.inherited_study())
    }

    pub fn group(&self) -> Option<&Arc<Group>> {
        self.biosample.as_ref().and_then(|b| b.inherited_group())
    }

    pub fn has_any_output(&self) -> bool {
        self.output_values().any(|v| !v.value.is_empty())
    }
}

/// A value paired with its owning result and attribute definition.
#[derive(Debug, Clone, Copy)]
pub struct ValueRef<'a> {
    pub result: &'a TestResult,
    pub value: &'a ResultValue,
    pub attribute: &'a TestAttribute,
}

impl<'a> ValueRef<'a> {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn double_value(&self) -> Option<f64> {
        self.value.double_value()
    }

    pub fn biosample(&self) -> Option<&'a Biosample> {
        self.result.biosample.as_deref()
    }

    pub fn phase(&self) -> Option<&'a Phase> {
        self.result.inherited_phase().map(|p| p.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::DataType;

    fn test_def() -> Arc<Test> {
        Arc::new(
            Test::new(1, "Hematology", "Blood")
                .with_attribute(1, "Method", AttributeType::Input, DataType::List)
                .with_attribute(2, "Dose", AttributeType::Input, DataType::Alpha)
                .with_attribute(3, "WBC", AttributeType::Output, DataType::Number)
                .with_attribute(4, "Remark", AttributeType::Info, DataType::Alpha),
        )
    }

    #[test]
    fn test_new_result_has_one_slot_per_attribute() {
        let result = TestResult::new(1, test_def());
        assert_eq!(result.values.len(), 4);
        assert!(result.values.iter().all(|v| v.is_empty()));
        assert_eq!(result.output_values().count(), 1);
        assert!(!result.has_any_output());
    }

    #[test]
    fn test_unparsable_numbers_are_not_numeric() {
        let result = TestResult::new(1, test_def()).with_value("WBC", "<0.5");
        let wbc = result.value_by_name("WBC").unwrap();
        assert_eq!(wbc.double_value(), None);
        assert!(!wbc.is_empty());

        let result = TestResult::new(2, test_def()).with_value("WBC", " 7.25 ");
        assert_eq!(result.value_by_name("WBC").unwrap().double_value(), Some(7.25));
    }

    #[test]
    fn test_input_values_string_skips_blank_inputs() {
        let result = TestResult::new(1, test_def())
            .with_value("Method", "Auto")
            .with_value("Dose", " ")
            .with_value("WBC", "5");
        assert_eq!(result.input_values_string(), "Auto");

        let result = result.with_value("Dose", "10mg");
        assert_eq!(result.input_values_string(), "Auto 10mg");
    }

    #[test]
    fn test_unknown_attribute_is_ignored() {
        let result = TestResult::new(1, test_def()).with_value("Nope", "1");
        assert!(result.values.iter().all(|v| v.is_empty()));
    }

    #[test]
    fn test_quality_ids_rank_severity() {
        assert!(Quality::Bogus < Quality::Valid);
        assert_eq!(Quality::Questionable.id(), 2);
    }
}
