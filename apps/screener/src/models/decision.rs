use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventId;
use crate::models::submission::FieldMap;

/// Field name under which the decision label is stored alongside the submission fields.
pub const DECISION_FIELD: &str = "decision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Hire,
    Reject,
}

#[derive(Debug, Error)]
#[error("unknown decision label '{0}'")]
pub struct UnknownDecision(String);

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Hire => "Hire",
            Decision::Reject => "Reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = UnknownDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hire" => Ok(Decision::Hire),
            "Reject" => Ok(Decision::Reject),
            other => Err(UnknownDecision(other.to_string())),
        }
    }
}

/// Persisted outcome for one submission event: the event's own fields plus the label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub event_id: EventId,
    #[serde(flatten)]
    pub fields: FieldMap,
    pub decision: Decision,
}

impl DecisionRecord {
    /// A `decision` key supplied by the submitter never survives; the computed label wins.
    pub fn new(event_id: EventId, mut fields: FieldMap, decision: Decision) -> Self {
        fields.remove(DECISION_FIELD);
        Self {
            event_id,
            fields,
            decision,
        }
    }

    /// Rebuilds a record from its stored field map.
    pub fn from_stored(event_id: EventId, mut fields: FieldMap) -> Result<Self, UnknownDecision> {
        let label = fields.remove(DECISION_FIELD).unwrap_or_default();
        let decision = label.parse()?;
        Ok(Self {
            event_id,
            fields,
            decision,
        })
    }

    /// The stored form: every submission field plus `decision`.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = self.fields.clone();
        fields.insert(DECISION_FIELD.to_string(), self.decision.to_string());
        fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}
