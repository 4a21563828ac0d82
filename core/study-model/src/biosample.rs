//! FILENAME: core/study-model/src/biosample.rs
//! PURPOSE: Biosamples, their types, and the parent/child sample hierarchy.
//! CONTEXT: Study context (study, group, phase) is usually attached to the
//! top-level participant only; derived samples inherit it via `parent`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::measurement::DataType;
use crate::study::{Group, Phase, Study};

pub type BiosampleId = u32;

/// Declared metadata field of a biotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiotypeMetadata {
    pub name: String,
    pub data_type: DataType,
}

/// The type of a biosample (Animal, Blood, Organ, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biotype {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub metadata: Vec<BiotypeMetadata>,
}

impl Biotype {
    pub fn new(id: u32, name: &str) -> Self {
        Biotype {
            id,
            name: name.to_string(),
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, name: &str, data_type: DataType) -> Self {
        self.metadata.push(BiotypeMetadata {
            name: name.to_string(),
            data_type,
        });
        self
    }

    /// Position of a metadata field in the declaration order.
    pub fn metadata_index(&self, name: &str) -> Option<usize> {
        self.metadata.iter().position(|m| m.name == name)
    }
}

/// A metadata value stored on a biosample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub name: String,
    pub value: Option<String>,
    /// Set when the metadata field references another biosample.
    #[serde(default)]
    pub linked: Option<Arc<Biosample>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Biosample {
    pub id: BiosampleId,
    pub sample_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub biotype: Arc<Biotype>,
    #[serde(default)]
    pub parent: Option<Arc<Biosample>>,
    #[serde(default)]
    pub study: Option<Arc<Study>>,
    #[serde(default)]
    pub group: Option<Arc<Group>>,
    #[serde(default)]
    pub sub_group: u32,
    #[serde(default)]
    pub phase: Option<Arc<Phase>>,
    #[serde(default)]
    pub metadata: Vec<SampleMetadata>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Biosample {
    pub fn new(id: BiosampleId, sample_id: &str, biotype: Arc<Biotype>) -> Self {
        Biosample {
            id,
            sample_id: sample_id.to_string(),
            name: None,
            biotype,
            parent: None,
            study: None,
            group: None,
            sub_group: 0,
            phase: None,
            metadata: Vec::new(),
            container_id: None,
            location: None,
            comments: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_parent(mut self, parent: Arc<Biosample>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_study(mut self, study: Arc<Study>) -> Self {
        self.study = Some(study);
        self
    }

    pub fn with_group(mut self, group: Arc<Group>, sub_group: u32) -> Self {
        self.group = Some(group);
        self.sub_group = sub_group;
        self
    }

    pub fn with_phase(mut self, phase: Arc<Phase>) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_metadata(mut self, name: &str, value: &str) -> Self {
        self.metadata.push(SampleMetadata {
            name: name.to_string(),
            value: Some(value.to_string()),
            linked: None,
        });
        self
    }

    pub fn with_linked_metadata(mut self, name: &str, linked: Arc<Biosample>) -> Self {
        self.metadata.push(SampleMetadata {
            name: name.to_string(),
            value: Some(linked.sample_id.clone()),
            linked: Some(linked),
        });
        self
    }

    pub fn with_container(mut self, container_id: &str) -> Self {
        self.container_id = Some(container_id.to_string());
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }

    /// This sample followed by its parents, closest first.
    pub fn ancestry(&self) -> impl Iterator<Item = &Biosample> {
        std::iter::successors(Some(self), |s| s.parent.as_deref())
    }

    /// The root ancestor (the study participant for derived samples).
    pub fn top(&self) -> &Biosample {
        self.ancestry().last().unwrap_or(self)
    }

    pub fn inherited_study(&self) -> Option<&Arc<Study>> {
        self.ancestry().find_map(|s| s.study.as_ref())
    }

    pub fn inherited_group(&self) -> Option<&Arc<Group>> {
        self.ancestry().find_map(|s| s.group.as_ref())
    }

    /// Subgroup of the sample that carries the inherited group.
    pub fn inherited_sub_group(&self) -> u32 {
        self.ancestry()
            .find(|s| s.group.is_some())
            .map(|s| s.sub_group)
            .unwrap_or(0)
    }

    pub fn inherited_phase(&self) -> Option<&Arc<Phase>> {
        self.ancestry().find_map(|s| s.phase.as_ref())
    }

    pub fn metadata(&self, name: &str) -> Option<&SampleMetadata> {
        self.metadata.iter().find(|m| m.name == name)
    }

    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata(name)
            .and_then(|m| m.value.as_deref())
            .filter(|v| !v.trim().is_empty())
    }
}

impl PartialEq for Biosample {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
