use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// String field mapping as carried by the event log and the result store.
pub type FieldMap = BTreeMap<String, String>;

/// Written in place of an empty certifications field when a submission is appended.
pub const NO_CERTIFICATION: &str = "None";

const DEFAULT_CANDIDATE_NAME: &str = "Candidate";
const MAX_AI_SCORE: u32 = 100;

/// A single candidate's application record.
///
/// Deserialized directly from JSON on the synchronous scoring surface, or decoded
/// from an event log field map via [`Submission::from_fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub experience: u32,
    pub projects_count: u32,
    pub ai_score: u32,
    pub salary_expectation: u64,
    pub skills: Vec<String>,
    pub education: String,
    pub certifications: Option<String>,
    pub job_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a non-negative integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("ai_score {0} is outside 0..=100")]
    AiScoreOutOfRange(u32),
}

impl Submission {
    /// Decodes an event's field map. Every typed field must be present and coercible.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, MalformedEvent> {
        let submission = Submission {
            name: optional(fields, "name"),
            email: optional(fields, "email"),
            experience: integer(fields, "experience")?,
            projects_count: integer(fields, "projects_count")?,
            ai_score: integer(fields, "ai_score")?,
            salary_expectation: integer(fields, "salary_expectation")?,
            skills: split_skills(required(fields, "skills")?),
            education: required(fields, "education")?.to_string(),
            certifications: optional(fields, "certifications"),
            job_role: required(fields, "job_role")?.to_string(),
        };
        submission.validate()?;
        Ok(submission)
    }

    /// Range checks that the type system does not cover.
    pub fn validate(&self) -> Result<(), MalformedEvent> {
        if self.ai_score > MAX_AI_SCORE {
            return Err(MalformedEvent::AiScoreOutOfRange(self.ai_score));
        }
        Ok(())
    }

    /// Flattens the submission into the string form appended to the event log.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        if let Some(name) = &self.name {
            fields.insert("name".to_string(), name.clone());
        }
        if let Some(email) = &self.email {
            fields.insert("email".to_string(), email.clone());
        }
        fields.insert("experience".to_string(), self.experience.to_string());
        fields.insert("projects_count".to_string(), self.projects_count.to_string());
        fields.insert("ai_score".to_string(), self.ai_score.to_string());
        fields.insert(
            "salary_expectation".to_string(),
            self.salary_expectation.to_string(),
        );
        fields.insert("skills".to_string(), self.skills.join(", "));
        fields.insert("education".to_string(), self.education.clone());
        fields.insert(
            "certifications".to_string(),
            self.certifications
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(NO_CERTIFICATION)
                .to_string(),
        );
        fields.insert("job_role".to_string(), self.job_role.clone());
        fields
    }

    /// Notification address, if one was supplied. Blank addresses count as absent.
    pub fn recipient(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CANDIDATE_NAME)
    }
}

/// Splits the comma-separated skills text, dropping empty items.
pub fn split_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<'a>(fields: &'a FieldMap, key: &'static str) -> Result<&'a str, MalformedEvent> {
    fields
        .get(key)
        .map(String::as_str)
        .ok_or(MalformedEvent::MissingField(key))
}

fn optional(fields: &FieldMap, key: &str) -> Option<String> {
    fields.get(key).cloned()
}

fn integer<T: FromStr>(fields: &FieldMap, key: &'static str) -> Result<T, MalformedEvent> {
    let raw = required(fields, key)?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| MalformedEvent::NotAnInteger {
            field: key,
            value: raw.to_string(),
        })
}
