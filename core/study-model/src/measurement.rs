//! FILENAME: core/study-model/src/measurement.rs
//! PURPOSE: Test definitions (the measurement types) and their attributes.
//! CONTEXT: A `Test` declares which input, output and info attributes its
//! results carry. Attribute order inside a test is significant: it drives
//! column ordering in the pivot engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Unique identifier of a test definition.
pub type TestId = u32;

/// Unique identifier of a test attribute.
pub type AttributeId = u32;

/// Logical type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Number,
    Formula,
    Alpha,
    List,
    Date,
    /// Reference to another biosample.
    Biosample,
    Large,
}

impl DataType {
    /// Only numeric types take part in computed deltas.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Number | DataType::Formula)
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Alpha
    }
}

/// Role of an attribute inside a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeType {
    Input,
    Output,
    Info,
}

/// One attribute of a test (e.g. "Weight" of a weighing test).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttribute {
    pub id: AttributeId,
    pub name: String,
    pub attribute_type: AttributeType,
    pub data_type: DataType,
    /// Declaration order inside the owning test.
    pub index: usize,
}

/// A test definition, i.e. a measurement type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: TestId,
    pub name: String,
    pub category: String,
    pub attributes: Vec<TestAttribute>,
}

impl Test {
    pub fn new(id: TestId, name: &str, category: &str) -> Self {
        Test {
            id,
            name: name.to_string(),
            category: category.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute; its index is the current attribute count.
    pub fn with_attribute(
        mut self,
        id: AttributeId,
        name: &str,
        attribute_type: AttributeType,
        data_type: DataType,
    ) -> Self {
        let index = self.attributes.len();
        self.attributes.push(TestAttribute {
            id,
            name: name.to_string(),
            attribute_type,
            data_type,
            index,
        });
        self
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&TestAttribute> {
        self.attributes.iter().find(|a| a.id == id)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&TestAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attributes_of(&self, attribute_type: AttributeType) -> impl Iterator<Item = &TestAttribute> {
        self.attributes
            .iter()
            .filter(move |a| a.attribute_type == attribute_type)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &TestAttribute> {
        self.attributes_of(AttributeType::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &TestAttribute> {
        self.attributes_of(AttributeType::Output)
    }
}

impl PartialEq for Test {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Test {}

impl PartialOrd for Test {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Test {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}
