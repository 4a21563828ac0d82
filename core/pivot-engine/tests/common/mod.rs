//! FILENAME: tests/common/mod.rs
//! Fixtures for pivot engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use study_model::{
    AccessContext, AttributeType, Biosample, Biotype, DataType, Group, Phase, Study,
    StudyBlindList, Test, TestResult, Viewer,
};

/// A small toxicology study: two groups of two animals, weighed at three
/// phases and bled once at the end.
pub struct StudyFixture {
    pub study: Arc<Study>,
    pub groups: Vec<Arc<Group>>,
    pub phases: Vec<Arc<Phase>>,
    pub animals: Vec<Arc<Biosample>>,
    pub weighing: Arc<Test>,
    pub hematology: Arc<Test>,
}

impl StudyFixture {
    pub fn new() -> Self {
        Self::build(Study::new(1, "TOX-001"))
    }

    /// Same data, with `user` blinded to the group assignments.
    pub fn blinded_for(user: &str) -> Self {
        Self::build(Study::new(1, "TOX-001").with_blind_user(user))
    }

    fn build(study: Study) -> Self {
        let study = Arc::new(study);
        let groups: Vec<Arc<Group>> = ["1 Control", "2 High Dose"]
            .iter()
            .enumerate()
            .map(|(i, name)| Arc::new(Group::new(i as u32 + 1, name)))
            .collect();
        let phases: Vec<Arc<Phase>> = [0, 7, 14]
            .iter()
            .enumerate()
            .map(|(i, days)| Arc::new(Phase::new(i as u32 + 1, &format!("d{}", days), *days, 0, 0)))
            .collect();

        let animal_type = Arc::new(Biotype::new(1, "Animal").with_metadata("Sex", DataType::List));
        let animals: Vec<Arc<Biosample>> = (0..4u32)
            .map(|i| {
                Arc::new(
                    Biosample::new(i + 1, &format!("AN-{}", i + 1), animal_type.clone())
                        .with_study(study.clone())
                        .with_group(groups[(i / 2) as usize].clone(), 0)
                        .with_metadata("Sex", if i % 2 == 0 { "M" } else { "F" }),
                )
            })
            .collect();

        let weighing = Arc::new(
            Test::new(1, "Weighing", "In Vivo")
                .with_attribute(1, "Weight", AttributeType::Output, DataType::Number),
        );
        let hematology = Arc::new(
            Test::new(2, "Hematology", "Blood")
                .with_attribute(10, "Method", AttributeType::Input, DataType::List)
                .with_attribute(11, "WBC", AttributeType::Output, DataType::Number)
                .with_attribute(12, "RBC", AttributeType::Output, DataType::Number),
        );

        StudyFixture {
            study,
            groups,
            phases,
            animals,
            weighing,
            hematology,
        }
    }

    /// Weight of animal `i` at day `d` is `20 + i + 2 * d / 7`.
    pub fn weighing_results(&self) -> Vec<TestResult> {
        let mut results = Vec::new();
        for (i, animal) in self.animals.iter().enumerate() {
            for phase in &self.phases {
                let weight = 20 + i as i32 + 2 * phase.days / 7;
                results.push(
                    TestResult::new(results.len() as u32 + 1, self.weighing.clone())
                        .with_biosample(animal.clone())
                        .with_phase(phase.clone())
                        .with_value("Weight", &weight.to_string()),
                );
            }
        }
        results
    }

    /// One blood count per animal at the last phase. WBC is `5 + i`, RBC is
    /// missing for the last animal.
    pub fn hematology_results(&self) -> Vec<TestResult> {
        let last = self.phases[self.phases.len() - 1].clone();
        self.animals
            .iter()
            .enumerate()
            .map(|(i, animal)| {
                let mut result = TestResult::new(100 + i as u32, self.hematology.clone())
                    .with_biosample(animal.clone())
                    .with_phase(last.clone())
                    .with_value("Method", "Auto")
                    .with_value("WBC", &(5 + i).to_string());
                if i < self.animals.len() - 1 {
                    result.set_value("RBC", "7.5");
                }
                result
            })
            .collect()
    }

    pub fn all_results(&self) -> Vec<TestResult> {
        let mut results = self.weighing_results();
        results.extend(self.hematology_results());
        results
    }
}

/// A viewer checked against the study's blind list.
pub struct ViewerFixture {
    pub viewer: Viewer,
}

impl ViewerFixture {
    pub fn new(name: &str) -> Self {
        ViewerFixture {
            viewer: Viewer::new(name),
        }
    }

    pub fn access(&self) -> AccessContext<'_> {
        AccessContext::new(&self.viewer, &StudyBlindList)
    }
}
