//! FILENAME: core/study-model/src/access.rs
//! PURPOSE: The access-control collaborator consulted when hiding blinded items.
//! CONTEXT: Record-level visibility is decided upstream. The only question
//! asked here is whether a viewer is blind to a study's group assignments.

use serde::{Deserialize, Serialize};

use crate::study::Study;

/// The user looking at the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub name: String,
}

impl Viewer {
    pub fn new(name: &str) -> Self {
        Viewer {
            name: name.to_string(),
        }
    }
}

/// Decides whether `viewer` must be blinded for `study`.
pub trait BlindPolicy {
    fn is_blind(&self, study: &Study, viewer: &Viewer) -> bool;
}

/// Blind iff the viewer is listed in `Study::blind_users`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudyBlindList;

impl BlindPolicy for StudyBlindList {
    fn is_blind(&self, study: &Study, viewer: &Viewer) -> bool {
        study.blind_users.iter().any(|u| u == &viewer.name)
    }
}

/// Viewer plus the policy that judges them.
#[derive(Clone, Copy)]
pub struct AccessContext<'a> {
    pub viewer: &'a Viewer,
    pub policy: &'a dyn BlindPolicy,
}

impl<'a> AccessContext<'a> {
    pub fn new(viewer: &'a Viewer, policy: &'a dyn BlindPolicy) -> Self {
        AccessContext { viewer, policy }
    }

    pub fn is_blind(&self, study: &Study) -> bool {
        self.policy.is_blind(study, self.viewer)
    }
}
