//! FILENAME: core/study-model/src/study.rs
//! PURPOSE: Study design entities: studies, treatment groups and phases.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub type StudyId = u32;
pub type GroupId = u32;
pub type PhaseId = u32;

/// A study. `blind_users` lists viewers who must not see group assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub id: StudyId,
    pub study_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub blind_users: Vec<String>,
}

impl Study {
    pub fn new(id: StudyId, study_id: &str) -> Self {
        Study {
            id,
            study_id: study_id.to_string(),
            title: String::new(),
            blind_users: Vec::new(),
        }
    }

    pub fn with_blind_user(mut self, user: &str) -> Self {
        self.blind_users.push(user.to_string());
        self
    }
}

/// A treatment group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Number of subgroups; subgroup labels only mean something above 1.
    #[serde(default = "default_sub_groups")]
    pub sub_groups: u32,
}

fn default_sub_groups() -> u32 {
    1
}

impl Group {
    pub fn new(id: GroupId, name: &str) -> Self {
        Group {
            id,
            name: name.to_string(),
            sub_groups: 1,
        }
    }

    pub fn with_sub_groups(mut self, sub_groups: u32) -> Self {
        self.sub_groups = sub_groups;
        self
    }
}

/// A sampling time point, relative to the start of the study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    pub days: i32,
    #[serde(default)]
    pub hours: i32,
    #[serde(default)]
    pub minutes: i32,
}

impl Phase {
    pub fn new(id: PhaseId, name: &str, days: i32, hours: i32, minutes: i32) -> Self {
        Phase {
            id,
            name: name.to_string(),
            days,
            hours,
            minutes,
        }
    }

    /// Offset from day zero in minutes.
    pub fn total_minutes(&self) -> i64 {
        self.days as i64 * 24 * 60 + self.hours as i64 * 60 + self.minutes as i64
    }
}

impl PartialEq for Phase {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Phase {}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Phase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.days
            .cmp(&other.days)
            .then_with(|| self.hours.cmp(&other.hours))
            .then_with(|| self.minutes.cmp(&other.minutes))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}
