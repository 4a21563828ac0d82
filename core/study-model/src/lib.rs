//! FILENAME: core/study-model/src/lib.rs
//! PURPOSE: Main library entry point for the study data model.
//! CONTEXT: Re-exports the shared types (tests, studies, biosamples, results)
//! that the pivot engine consumes. Loading and persisting these entities is
//! the job of the surrounding application, not of this crate.

pub mod access;
pub mod biosample;
pub mod measurement;
pub mod result;
pub mod study;

// Re-export commonly used types at the crate root
pub use access::{AccessContext, BlindPolicy, StudyBlindList, Viewer};
pub use biosample::{Biosample, BiosampleId, Biotype, BiotypeMetadata, SampleMetadata};
pub use measurement::{AttributeId, AttributeType, DataType, Test, TestAttribute, TestId};
pub use result::{Quality, ResultId, ResultValue, TestResult, ValueRef};
pub use study::{Group, GroupId, Phase, PhaseId, Study, StudyId};
