//! Feature encoding: turns a [`Submission`] into the fixed-width, fixed-order vector the
//! scoring model was trained on.
//!
//! Layout (positional, no schema version carried with it):
//!
//! | block          | width | content                                                 |
//! |----------------|-------|---------------------------------------------------------|
//! | scalars        | 4     | experience, salary_expectation, projects_count, ai_score |
//! | skills         | 14    | presence flag per [`SKILL_VOCABULARY`] keyword           |
//! | education      | 5     | one-hot over [`EDUCATION_LEVELS`]                        |
//! | role           | 4     | one-hot over [`JOB_ROLES`]                               |
//! | certification  | 1     | 1 unless absent or "none" (any case)                     |
//!
//! Changing any of the constants below changes the vector layout and requires a
//! retrained model artifact.

use crate::models::Submission;

pub const SKILL_VOCABULARY: [&str; 14] = [
    "c++",
    "cybersecurity",
    "deep learning",
    "ethical hacking",
    "java",
    "linux",
    "machine learning",
    "networking",
    "nlp",
    "python",
    "pytorch",
    "react",
    "sql",
    "tensorflow",
];

pub const EDUCATION_LEVELS: [&str; 5] = ["BSC", "BTECH", "MBA", "MTECH", "PHD"];

pub const JOB_ROLES: [&str; 4] = [
    "AI Researcher",
    "Cybersecurity Analyst",
    "Data Scientist",
    "Software Engineer",
];

const SCALAR_WIDTH: usize = 4;
const CERTIFICATION_WIDTH: usize = 1;

pub const FEATURE_WIDTH: usize = SCALAR_WIDTH
    + SKILL_VOCABULARY.len()
    + EDUCATION_LEVELS.len()
    + JOB_ROLES.len()
    + CERTIFICATION_WIDTH;

/// Column names in vector order, matching the names the model artifact was trained with.
pub const FEATURE_NAMES: [&str; FEATURE_WIDTH] = [
    "Experience (Years)",
    "Salary Expectation ($)",
    "Projects Count",
    "AI Score (0-100)",
    "c++",
    "cybersecurity",
    "deep learning",
    "ethical hacking",
    "java",
    "linux",
    "machine learning",
    "networking",
    "nlp",
    "python",
    "pytorch",
    "react",
    "sql",
    "tensorflow",
    "Edu_BSC",
    "Edu_BTECH",
    "Edu_MBA",
    "Edu_MTECH",
    "Edu_PHD",
    "Role_AI Researcher",
    "Role_Cybersecurity Analyst",
    "Role_Data Scientist",
    "Role_Software Engineer",
    "Has_Certification",
];

const CERTIFICATION_SENTINEL: &str = "none";

/// Encoded model input. Values and names are parallel and always [`FEATURE_WIDTH`] long.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_WIDTH],
}

impl FeatureVector {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

#[cfg(test)]
impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Value of a named column, if the name is part of the layout.
    pub fn get(&self, name: &str) -> Option<f32> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }
}

/// Encodes a submission. Pure: identical input always yields an identical vector.
pub fn encode(submission: &Submission) -> FeatureVector {
    let mut values = [0.0_f32; FEATURE_WIDTH];

    values[0] = submission.experience as f32;
    values[1] = submission.salary_expectation as f32;
    values[2] = submission.projects_count as f32;
    values[3] = submission.ai_score as f32;

    // Unrecognized skills are ignored
    let skills: Vec<String> = submission
        .skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();
    let skill_block = SCALAR_WIDTH;
    for (i, keyword) in SKILL_VOCABULARY.iter().enumerate() {
        values[skill_block + i] = flag(skills.iter().any(|s| s == keyword));
    }

    // An education outside the enumeration leaves the block all-zero
    let education = submission.education.to_uppercase();
    let education_block = skill_block + SKILL_VOCABULARY.len();
    for (i, level) in EDUCATION_LEVELS.iter().enumerate() {
        values[education_block + i] = flag(education == *level);
    }

    // Roles match exactly, case included
    let role_block = education_block + EDUCATION_LEVELS.len();
    for (i, role) in JOB_ROLES.iter().enumerate() {
        values[role_block + i] = flag(submission.job_role == *role);
    }

    values[FEATURE_WIDTH - 1] = flag(has_certification(submission.certifications.as_deref()));

    FeatureVector { values }
}

/// Only the exact sentinel counts as absent; blank or padded text is still a certification.
fn has_certification(certifications: Option<&str>) -> bool {
    certifications.is_some_and(|c| !c.eq_ignore_ascii_case(CERTIFICATION_SENTINEL))
}

fn flag(set: bool) -> f32 {
    if set {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_submission;

    fn block(vector: &FeatureVector, prefix: &str) -> Vec<f32> {
        FEATURE_NAMES
            .iter()
            .zip(vector.values())
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, v)| *v)
            .collect()
    }

    #[test]
    fn test_width_is_fixed_at_28() {
        assert_eq!(FEATURE_WIDTH, 28);
        assert_eq!(encode(&sample_submission()).len(), FEATURE_WIDTH);
    }

    #[test]
    fn test_width_is_independent_of_input() {
        let mut sparse = sample_submission();
        sparse.skills.clear();
        sparse.education = "DIPLOMA".to_string();
        sparse.job_role = "Astronaut".to_string();
        sparse.certifications = None;

        let mut dense = sample_submission();
        dense.skills = SKILL_VOCABULARY.iter().map(|s| s.to_string()).collect();

        assert_eq!(encode(&sparse).len(), encode(&dense).len());
    }

    #[test]
    fn test_scalar_block_order() {
        let vector = encode(&sample_submission());
        assert_eq!(&vector.values()[..4], &[6.0_f32, 95000.0, 12.0, 88.0]);
    }

    #[test]
    fn test_encoding_is_bit_identical_across_calls() {
        let submission = sample_submission();
        let first: Vec<u32> = encode(&submission).values().iter().map(|v| v.to_bits()).collect();
        let _ = encode(&crate::testing::reject_submission());
        let second: Vec<u32> = encode(&submission).values().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_skills_match_case_insensitively_and_ignore_unknowns() {
        let mut submission = sample_submission();
        submission.skills = vec![
            "PyTorch".to_string(),
            " SQL ".to_string(),
            "Haskell".to_string(),
        ];
        let vector = encode(&submission);
        assert_eq!(vector.get("pytorch"), Some(1.0));
        assert_eq!(vector.get("sql"), Some(1.0));
        assert_eq!(vector.get("python"), Some(0.0));
        let skill_total: f32 = vector.values()[4..18].iter().sum();
        assert_eq!(skill_total, 2.0_f32);
    }

    #[test]
    fn test_education_is_one_hot_case_insensitive() {
        let vector = encode(&sample_submission());
        assert_eq!(block(&vector, "Edu_"), vec![0.0_f32, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_education_yields_zero_block() {
        let mut submission = sample_submission();
        submission.education = "Diploma".to_string();
        let vector = encode(&submission);
        assert_eq!(block(&vector, "Edu_"), vec![0.0_f32; 5]);
    }

    #[test]
    fn test_role_match_is_case_sensitive() {
        let mut submission = sample_submission();
        assert_eq!(
            block(&encode(&submission), "Role_"),
            vec![0.0_f32, 0.0, 1.0, 0.0]
        );

        submission.job_role = "data scientist".to_string();
        assert_eq!(block(&encode(&submission), "Role_"), vec![0.0_f32; 4]);
    }

    #[test]
    fn test_certification_flag() {
        let mut submission = sample_submission();
        assert_eq!(encode(&submission).get("Has_Certification"), Some(1.0));

        for absent in [None, Some("None"), Some("NONE"), Some("none")] {
            submission.certifications = absent.map(str::to_string);
            assert_eq!(
                encode(&submission).get("Has_Certification"),
                Some(0.0),
                "certifications = {absent:?}"
            );
        }
    }

    #[test]
    fn test_blank_or_padded_certification_still_counts() {
        let mut submission = sample_submission();
        for present in ["", "  ", " none ", "nonE-certified"] {
            submission.certifications = Some(present.to_string());
            assert_eq!(
                encode(&submission).get("Has_Certification"),
                Some(1.0),
                "certifications = {present:?}"
            );
        }
    }

    #[test]
    fn test_names_parallel_values() {
        let vector = encode(&sample_submission());
        assert_eq!(vector.names().len(), vector.values().len());
        assert_eq!(vector.names()[0], "Experience (Years)");
        assert_eq!(vector.names()[FEATURE_WIDTH - 1], "Has_Certification");
    }
}
